#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod allocator;
mod bank;
mod consts;
mod error;
mod mixer;
mod opl;
mod player;
mod score;

#[cfg(test)]
mod testing;

pub use bank::{Bank, Patch};
pub use error::Error;
pub use opl::RegisterSink;
pub use player::{Player, State};
pub use score::{Controller, Event, EventKind, Events, Score, SystemEvent};

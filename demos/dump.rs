#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![forbid(unsafe_code)]

use colored::Colorize;
use error_iter::ErrorIter as _;
use musplay::{Bank, Error as MusError, Player};
use std::{cell::RefCell, process::ExitCode, rc::Rc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing op2-file argument\nUsage: dump <op2-file> <mus-file> [ticks]")]
    MissingBankFilename,

    #[error("Missing mus-file argument\nUsage: dump <op2-file> <mus-file> [ticks]")]
    MissingScoreFilename,

    #[error("Invalid tick count\nUsage: dump <op2-file> <mus-file> [ticks]")]
    InvalidTicks(#[from] std::num::ParseIntError),

    #[error("MUS player error")]
    Player(#[from] MusError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    match dump() {
        Err(e) => {
            eprintln!("{} {}", "error:".red(), e);

            for cause in e.sources().skip(1) {
                eprintln!("{} {}", "caused by:".bright_red(), cause);
            }

            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}

/// Print every register write, grouped by tick. With a tick count the score
/// loops until that many ticks have been played.
fn dump() -> Result<(), Error> {
    let mut args = std::env::args().skip(1);
    let op2_filename = args.next().ok_or(Error::MissingBankFilename)?;
    let mus_filename = args.next().ok_or(Error::MissingScoreFilename)?;
    let ticks = args.next().map(|ticks| ticks.parse::<u64>()).transpose()?;

    // Read the instrument bank and the score
    let op2 = std::fs::read(op2_filename)?;
    let bank = Bank::from_op2(&op2)?;
    let data = std::fs::read(mus_filename)?;

    let writes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&writes);
    let mut player = Player::new(move |register: u16, value: u8| {
        sink.borrow_mut().push((register, value));
    });
    player.load_bank(bank);
    player.start(&data, ticks.is_some())?;
    print_writes("init", &mut writes.borrow_mut());

    let mut tick = 0_u64;
    loop {
        let playing = player.update(1);
        tick += 1;
        print_writes(&tick.to_string(), &mut writes.borrow_mut());

        if !playing || ticks.is_some_and(|ticks| tick >= ticks) {
            break;
        }
    }
    player.stop();
    print_writes("stop", &mut writes.borrow_mut());

    eprintln!("{} {} ticks", "played".green(), tick);

    Ok(())
}

fn print_writes(label: &str, writes: &mut Vec<(u16, u8)>) {
    if writes.is_empty() {
        return;
    }

    let line = writes
        .drain(..)
        .map(|(register, value)| format!("{register:03x}={value:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}: {}", label.bold(), line);
}

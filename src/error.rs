/// Possible errors.
///
/// Only bank and score construction report errors to the caller. During
/// playback a decoding error ends the song instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum Error {
    #[cfg_attr(feature = "std", error("Instrument bank is shorter than 175 patches"))]
    BankLength,

    #[cfg_attr(feature = "std", error("Missing OP2 bank header"))]
    BankHeader,

    #[cfg_attr(feature = "std", error("Missing MUS header"))]
    ScoreMarker,

    #[cfg_attr(feature = "std", error("Score is shorter than its header describes"))]
    ScoreLength,

    #[cfg_attr(feature = "std", error("Score event is truncated"))]
    Truncated,

    #[cfg_attr(feature = "std", error("Unknown score event kind: {0}"))]
    UnknownEvent(u8),

    #[cfg_attr(feature = "std", error("Event delay does not fit in 32 bits"))]
    DelayOverflow,
}

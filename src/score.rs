use byteorder::{ByteOrder, LittleEndian};

use crate::consts::*;
use crate::error::Error;

/// A `Score` is a validated, borrowed MUS lump. The event data is decoded
/// lazily by [`Events`].
#[derive(Debug, Clone, Copy)]
pub struct Score<'a> {
    body: &'a [u8],
    instruments: &'a [u8],
    primary_channels: u16,
    secondary_channels: u16,
}

/// A decoded score event with the number of ticks to wait before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub channel: u8,
    pub kind: EventKind,
    pub delay: u32,
}

/// Available score events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ReleaseNote { note: u8 },
    PlayNote { note: u8, volume: Option<u8> },
    PitchBend { bend: u8 },
    System(SystemEvent),
    Controller { controller: Controller, value: u8 },
    MeasureEnd,
    ScoreEnd,
}

/// Controllers carried by controller-change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Instrument,
    Bank,
    Modulation,
    Volume,
    Pan,
    Expression,
    Reverb,
    Chorus,
    Sustain,
    SoftPedal,
    Other(u8),
}

/// Controllers carried by system events, which have no value byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    AllSoundsOff,
    AllNotesOff,
    Mono,
    Poly,
    ResetControllers,
    Other(u8),
}

impl From<u8> for Controller {
    fn from(number: u8) -> Self {
        match number {
            0 => Controller::Instrument,
            1 => Controller::Bank,
            2 => Controller::Modulation,
            3 => Controller::Volume,
            4 => Controller::Pan,
            5 => Controller::Expression,
            6 => Controller::Reverb,
            7 => Controller::Chorus,
            8 => Controller::Sustain,
            9 => Controller::SoftPedal,
            n => Controller::Other(n),
        }
    }
}

impl From<u8> for SystemEvent {
    fn from(number: u8) -> Self {
        match number {
            10 => SystemEvent::AllSoundsOff,
            11 => SystemEvent::AllNotesOff,
            12 => SystemEvent::Mono,
            13 => SystemEvent::Poly,
            14 => SystemEvent::ResetControllers,
            n => SystemEvent::Other(n),
        }
    }
}

impl<'a> Score<'a> {
    /// Validate a MUS lump.
    ///
    /// ```rust
    /// # use musplay::Score;
    /// let lump = [b'M', b'U', b'S', 0x1a, 1, 0, 16, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0x60];
    /// let score = Score::from_slice(&lump).unwrap();
    /// assert_eq!(score.events().count(), 1);
    /// ```
    pub fn from_slice(slice: &'a [u8]) -> Result<Score<'a>, Error> {
        if !slice.starts_with(MUS_MAGIC) {
            return Err(Error::ScoreMarker);
        }
        if slice.len() < MUS_HEADER_LENGTH {
            return Err(Error::ScoreLength);
        }

        let score_length = LittleEndian::read_u16(&slice[4..6]) as usize;
        let score_start = LittleEndian::read_u16(&slice[6..8]) as usize;
        let primary_channels = LittleEndian::read_u16(&slice[8..10]);
        let secondary_channels = LittleEndian::read_u16(&slice[10..12]);
        let instrument_count = LittleEndian::read_u16(&slice[12..14]) as usize;

        let instruments_end = MUS_HEADER_LENGTH + instrument_count * 2;
        if instruments_end > slice.len() || score_start < instruments_end {
            return Err(Error::ScoreLength);
        }

        // A score length past the end of the lump is cut short
        let score_end = score_start.saturating_add(score_length).min(slice.len());
        if score_start >= score_end {
            return Err(Error::ScoreLength);
        }

        Ok(Score {
            body: &slice[score_start..score_end],
            instruments: &slice[MUS_HEADER_LENGTH..instruments_end],
            primary_channels,
            secondary_channels,
        })
    }

    /// Patch numbers the score declares it will use.
    pub fn instruments(&self) -> impl Iterator<Item = u16> + 'a {
        self.instruments.chunks_exact(2).map(LittleEndian::read_u16)
    }

    pub fn primary_channels(&self) -> u16 {
        self.primary_channels
    }

    pub fn secondary_channels(&self) -> u16 {
        self.secondary_channels
    }

    /// Create an event iterator positioned at the first event.
    pub fn events(&self) -> Events<'a> {
        Events {
            body: self.body,
            position: 0,
            done: false,
        }
    }
}

/// Forward-only iterator over score events.
///
/// The iterator stops after the score end event or the first error, and
/// stays stopped until [`Events::rewind`] is called.
#[derive(Debug, Clone)]
pub struct Events<'a> {
    body: &'a [u8],
    position: usize,
    done: bool,
}

impl<'a> Events<'a> {
    /// Reset the cursor to the first event of the score.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.done = false;
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        let byte = *self.body.get(self.position).ok_or(Error::Truncated)?;
        self.position += 1;
        Ok(byte)
    }

    /// Variable-length delay: 7 bits per byte, most significant first.
    fn read_delay(&mut self) -> Result<u32, Error> {
        let mut delay = 0_u32;
        loop {
            let byte = self.read_byte()?;
            delay = delay
                .checked_mul(128)
                .and_then(|d| d.checked_add(u32::from(byte & 0x7f)))
                .ok_or(Error::DelayOverflow)?;
            if byte & 0x80 == 0 {
                return Ok(delay);
            }
        }
    }

    fn read_event(&mut self) -> Result<Event, Error> {
        let descriptor = self.read_byte()?;
        let last = descriptor & 0x80 != 0;
        let channel = descriptor & 0x0f;

        let kind = match (descriptor >> 4) & 0x07 {
            0 => EventKind::ReleaseNote {
                note: self.read_byte()? & 0x7f,
            },
            1 => {
                let note = self.read_byte()?;
                let volume = if note & 0x80 != 0 {
                    Some(self.read_byte()? & 0x7f)
                } else {
                    None
                };
                EventKind::PlayNote {
                    note: note & 0x7f,
                    volume,
                }
            }
            2 => EventKind::PitchBend {
                bend: self.read_byte()?,
            },
            3 => EventKind::System(SystemEvent::from(self.read_byte()? & 0x7f)),
            4 => {
                let controller = Controller::from(self.read_byte()? & 0x7f);
                let value = self.read_byte()?;
                EventKind::Controller { controller, value }
            }
            5 => EventKind::MeasureEnd,
            6 => EventKind::ScoreEnd,
            kind => return Err(Error::UnknownEvent(kind)),
        };

        let delay = if last { self.read_delay()? } else { 0 };

        Ok(Event {
            channel,
            kind,
            delay,
        })
    }
}

impl<'a> Iterator for Events<'a> {
    type Item = Result<Event, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        // Running out of data between events is an implicit score end
        if self.done || self.position >= self.body.len() {
            self.done = true;
            return None;
        }

        let event = self.read_event();
        match event {
            Ok(Event {
                kind: EventKind::ScoreEnd,
                ..
            })
            | Err(_) => self.done = true,
            Ok(_) => (),
        }

        Some(event)
    }
}

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::consts::*;
use crate::error::Error;

/// A `Bank` holds the 175 OP2 instrument patches: 128 melodic programs
/// followed by 47 percussion sounds for MUS notes 35 through 81.
///
/// The default bank is all zeroes, which never produces sound.
#[derive(Clone)]
pub struct Bank {
    patches: [Patch; NUM_PATCHES],
}

/// One OP2 instrument record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub(crate) fixed_pitch: bool,
    pub(crate) double_voice: bool,
    pub(crate) fine_tune: u8,
    pub(crate) fixed_note: u8,
    pub(crate) voices: [PatchVoice; 2],
}

/// The register image for one physical channel: two operators plus the
/// feedback/connection byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PatchVoice {
    pub(crate) modulator: Operator,
    pub(crate) carrier: Operator,
    pub(crate) feedback: u8,
    pub(crate) base_note: i16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Operator {
    pub(crate) character: u8, // Tremolo, vibrato, sustain, KSR, multiplier
    pub(crate) attack: u8,    // Attack and decay rates
    pub(crate) sustain: u8,   // Sustain level and release rate
    pub(crate) waveform: u8,
    pub(crate) scale: u8, // Key scale level, upper two bits
    pub(crate) level: u8, // Output level, lower six bits
}

impl PatchVoice {
    /// Operators are mixed rather than modulated, so both are audible.
    pub(crate) fn is_additive(&self) -> bool {
        self.feedback & 0x01 != 0
    }
}

impl Patch {
    /// Parse a single 36-byte patch record.
    fn from_record(record: &[u8]) -> Patch {
        let load_operator = |i: usize| -> Operator {
            Operator {
                character: record[i],
                attack: record[i + 1],
                sustain: record[i + 2],
                waveform: record[i + 3],
                scale: record[i + 4] & 0xc0,
                level: record[i + 5] & 0x3f,
            }
        };

        let load_voice = |i: usize| -> PatchVoice {
            PatchVoice {
                modulator: load_operator(i),
                feedback: record[i + 6],
                carrier: load_operator(i + 7),
                base_note: LittleEndian::read_i16(&record[i + 14..i + 16]),
            }
        };

        let flags = LittleEndian::read_u16(&record[0..2]);

        Patch {
            fixed_pitch: flags & 0x0001 != 0,
            double_voice: flags & 0x0004 != 0,
            fine_tune: record[2],
            fixed_note: record[3],
            voices: [load_voice(4), load_voice(4 + PATCH_VOICE_LENGTH)],
        }
    }

    /// The patch always sounds at its own fixed note.
    pub fn is_fixed_pitch(&self) -> bool {
        self.fixed_pitch
    }

    /// The patch layers a second, detuned voice on another physical channel.
    pub fn is_double_voice(&self) -> bool {
        self.double_voice
    }

    pub(crate) fn voice(&self, layer: usize) -> &PatchVoice {
        &self.voices[layer.min(1)]
    }
}

impl Bank {
    /// Create a new `Bank` by copying 175 36-byte patch records out of a
    /// byte slice. Trailing bytes are ignored.
    ///
    /// ```rust
    /// # use musplay::Bank;
    /// let op2 = [0; 8 + 175 * 36];
    /// let bank = Bank::from_slice(&op2[8..]).unwrap();
    /// ```
    pub fn from_slice(slice: &[u8]) -> Result<Bank, Error> {
        if slice.len() < BANK_LENGTH {
            return Err(Error::BankLength);
        }

        let mut patches = [Patch::default(); NUM_PATCHES];
        for (patch, record) in patches.iter_mut().zip(slice.chunks_exact(PATCH_LENGTH)) {
            *patch = Patch::from_record(record);
        }
        debug!("Loaded {} instrument patches", NUM_PATCHES);

        Ok(Bank { patches })
    }

    /// Create a new `Bank` from a complete `.OP2` file or `GENMIDI` lump,
    /// which starts with the `#OPL_II#` header.
    pub fn from_op2(slice: &[u8]) -> Result<Bank, Error> {
        match slice.strip_prefix(&OP2_MAGIC[..]) {
            Some(records) => Self::from_slice(records),
            None => Err(Error::BankHeader),
        }
    }

    /// Get a patch by program number. Indices past the end of the bank clamp
    /// to the last patch.
    pub fn patch(&self, index: usize) -> &Patch {
        &self.patches[index.min(NUM_PATCHES - 1)]
    }

    /// Bank index of the percussion patch for a note on the percussion
    /// channel. Notes outside 35..=81 clamp to the nearest percussion patch.
    pub(crate) fn percussion_index(note: u8) -> usize {
        let index = PERCUSSION_PATCH + note.saturating_sub(FIRST_PERCUSSION_NOTE) as usize;
        index.min(NUM_PATCHES - 1)
    }
}

impl Default for Bank {
    fn default() -> Self {
        Bank {
            patches: [Patch::default(); NUM_PATCHES],
        }
    }
}

impl core::fmt::Debug for Bank {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Bank {{ patches: {} }}", self.patches.len())
    }
}

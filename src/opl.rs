use libm::{exp2f, roundf};

use crate::bank::{Patch, PatchVoice};
use crate::consts::*;

/// The destination for OPL register writes: an emulator or a hardware port.
///
/// Any `FnMut(u16, u8)` closure is a sink.
///
/// ```rust
/// # use musplay::Player;
/// let mut writes = Vec::new();
/// let player = Player::new(|register: u16, value: u8| writes.push((register, value)));
/// ```
pub trait RegisterSink {
    fn write(&mut self, register: u16, value: u8);
}

impl<F> RegisterSink for F
where
    F: FnMut(u16, u8),
{
    fn write(&mut self, register: u16, value: u8) {
        self(register, value)
    }
}

/// Block and F-number pair for the `0xA0`/`0xB0` registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frequency {
    fnum: u16,
    block: u8,
}

impl Frequency {
    /// Convert a fractional MIDI-scale pitch (69.0 = A440) into the most
    /// precise block that can represent it.
    pub(crate) fn from_pitch(pitch: f32) -> Self {
        let hz = 440.0 * exp2f((pitch - 69.0) / 12.0);

        for block in 0..8 {
            let fnum = roundf(hz * (1_u32 << (20 - block)) as f32 / OPL_CLOCK);
            if fnum < 1024.0 {
                return Frequency {
                    fnum: fnum as u16,
                    block,
                };
            }
        }

        Frequency {
            fnum: 1023,
            block: 7,
        }
    }

    fn low(self) -> u8 {
        (self.fnum & 0xff) as u8
    }

    fn high(self) -> u8 {
        (self.block << 2) | ((self.fnum >> 8) as u8 & 0x03)
    }
}

/// Pitch of one layer of `patch` playing `note`, including pitch bend and the
/// second layer's detune.
pub(crate) fn voice_pitch(patch: &Patch, layer: usize, note: u8, percussion: bool, bend: u8) -> f32 {
    let note = if patch.fixed_pitch {
        patch.fixed_note
    } else if percussion {
        60
    } else {
        note
    };

    // Fold into the playable range by octaves
    let mut note = i32::from(note) + i32::from(patch.voice(layer).base_note);
    if note < 0 {
        note = note.rem_euclid(12);
    } else if note > 95 {
        note = 84 + (note - 84) % 12;
    }

    // Pitch bend spans two semitones either way
    let mut pitch = note as f32 + (f32::from(bend) - f32::from(CENTER_BEND)) / 64.0;
    if layer == 1 {
        pitch += (f32::from(patch.fine_tune) - 128.0) / 64.0;
    }

    pitch
}

/// Register-level driver for the nine melodic OPL2 channels.
#[derive(Debug)]
pub(crate) struct Chip<S> {
    sink: S,
}

impl<S: RegisterSink> Chip<S> {
    pub(crate) fn new(sink: S) -> Self {
        Chip { sink }
    }

    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    pub(crate) fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub(crate) fn into_sink(self) -> S {
        self.sink
    }

    fn write(&mut self, register: u16, value: u8) {
        self.sink.write(register, value);
    }

    /// Put the chip in melodic mode and silence every channel.
    pub(crate) fn reset(&mut self) {
        // Enable waveform select
        self.write(REG_TEST, 0x20);
        self.write(REG_CSM, 0x40);
        self.write(REG_RHYTHM, 0x00);

        for (channel, &slot) in OPERATOR_SLOTS.iter().enumerate() {
            let channel = channel as u16;
            for slot in [slot, slot + 3] {
                self.write(REG_LEVEL + slot, MAX_ATTENUATION);
                self.write(REG_ATTACK + slot, 0xff);
                self.write(REG_SUSTAIN + slot, 0x0f);
                self.write(REG_WAVEFORM + slot, 0x00);
                self.write(REG_CHAR + slot, 0x00);
            }
            self.write(REG_FREQ_LO + channel, 0x00);
            self.write(REG_FREQ_HI + channel, 0x00);
            self.write(REG_FEEDBACK + channel, 0x30);
        }
    }

    /// Load the operator envelopes, waveforms and feedback of a patch voice.
    /// Output levels are left to [`Chip::set_levels`].
    pub(crate) fn program(&mut self, channel: usize, voice: &PatchVoice) {
        let modulator = OPERATOR_SLOTS[channel];
        let carrier = modulator + 3;

        for (slot, op) in [(modulator, &voice.modulator), (carrier, &voice.carrier)] {
            self.write(REG_CHAR + slot, op.character);
            self.write(REG_ATTACK + slot, op.attack);
            self.write(REG_SUSTAIN + slot, op.sustain);
            self.write(REG_WAVEFORM + slot, op.waveform);
        }

        // Both outputs enabled on OPL3; ignored by OPL2
        self.write(REG_FEEDBACK + channel as u16, voice.feedback | 0x30);
    }

    /// Write operator attenuations, keeping the patch's key scale bits.
    pub(crate) fn set_levels(&mut self, channel: usize, voice: &PatchVoice, modulator: u8, carrier: u8) {
        let slot = OPERATOR_SLOTS[channel];
        self.write(REG_LEVEL + slot, voice.modulator.scale | (modulator & 0x3f));
        self.write(REG_LEVEL + slot + 3, voice.carrier.scale | (carrier & 0x3f));
    }

    /// Set the channel frequency with the key held down. Returns the value
    /// written to the `0xB0` register.
    pub(crate) fn key_on(&mut self, channel: usize, frequency: Frequency) -> u8 {
        let high = KEY_ON | frequency.high();
        self.write(REG_FREQ_LO + channel as u16, frequency.low());
        self.write(REG_FREQ_HI + channel as u16, high);
        high
    }

    /// Release the key, keeping the block and F-number of the previous
    /// `0xB0` value so the release tail stays in tune.
    pub(crate) fn key_off(&mut self, channel: usize, reg_b0: u8) -> u8 {
        let high = reg_b0 & !KEY_ON;
        self.write(REG_FREQ_HI + channel as u16, high);
        high
    }
}

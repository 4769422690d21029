pub(crate) const NUM_CHANNELS: usize = 16;
pub(crate) const NUM_VOICES: usize = 9;
pub(crate) const PERCUSSION_CHANNEL: usize = 15;

pub(crate) const NUM_PATCHES: usize = 175;
pub(crate) const PATCH_LENGTH: usize = 36;
pub(crate) const BANK_LENGTH: usize = NUM_PATCHES * PATCH_LENGTH;
pub(crate) const PATCH_VOICE_LENGTH: usize = 16;
pub(crate) const OP2_MAGIC: &[u8; 8] = b"#OPL_II#";

// Percussion notes 35..=81 map onto the last 47 patches
pub(crate) const PERCUSSION_PATCH: usize = 128;
pub(crate) const FIRST_PERCUSSION_NOTE: u8 = 35;

pub(crate) const MUS_MAGIC: &[u8; 4] = b"MUS\x1a";
pub(crate) const MUS_HEADER_LENGTH: usize = 16;

pub(crate) const DEFAULT_VOLUME: u8 = 100;
pub(crate) const DEFAULT_VELOCITY: u8 = 127;
pub(crate) const CENTER_BEND: u8 = 128;
pub(crate) const MAX_VOLUME: u8 = 127;
pub(crate) const MAX_PROGRAM: u8 = 127;
pub(crate) const MAX_ATTENUATION: u8 = 0x3f;

// OPL2 register bases
pub(crate) const REG_TEST: u16 = 0x01;
pub(crate) const REG_CSM: u16 = 0x08;
pub(crate) const REG_CHAR: u16 = 0x20;
pub(crate) const REG_LEVEL: u16 = 0x40;
pub(crate) const REG_ATTACK: u16 = 0x60;
pub(crate) const REG_SUSTAIN: u16 = 0x80;
pub(crate) const REG_FREQ_LO: u16 = 0xa0;
pub(crate) const REG_FREQ_HI: u16 = 0xb0;
pub(crate) const REG_RHYTHM: u16 = 0xbd;
pub(crate) const REG_FEEDBACK: u16 = 0xc0;
pub(crate) const REG_WAVEFORM: u16 = 0xe0;

pub(crate) const KEY_ON: u8 = 0x20;
pub(crate) const OPL_CLOCK: f32 = 49716.0;

/// Modulator operator slot for each physical channel. The carrier is 3 slots later.
pub(crate) const OPERATOR_SLOTS: [u16; NUM_VOICES] = [0, 1, 2, 8, 9, 10, 16, 17, 18];

//! Volume compositing.
//!
//! OPL output levels are attenuations in 0.75 dB steps, so volumes are mixed
//! in decibels: each MIDI-style volume contributes `40 * log10(v / full)`.
//! Velocity and channel volume are full at 127, the player volume at 100.
//! Player volumes above 100 boost the arranged level until the attenuation
//! reaches zero, which is the loudest the hardware can go.

use libm::{log10f, roundf};

use crate::consts::*;

const DB_PER_STEP: f32 = 0.75;
const NOMINAL_VOLUME: f32 = 100.0;

/// Attenuation steps for a volume ratio. Negative when boosting.
fn steps(ratio: f32) -> f32 {
    -40.0 * log10f(ratio) / DB_PER_STEP
}

/// Compose note velocity, channel volume and player volume with an operator's
/// own output level into the value for its `0x40` register (lower six bits).
pub(crate) fn attenuation(velocity: u8, channel_volume: u8, player_volume: u8, base_level: u8) -> u8 {
    if velocity == 0 || channel_volume == 0 || player_volume == 0 {
        return MAX_ATTENUATION;
    }

    let full = f32::from(MAX_VOLUME);
    let level = f32::from(base_level)
        + steps(f32::from(velocity.min(MAX_VOLUME)) / full)
        + steps(f32::from(channel_volume.min(MAX_VOLUME)) / full)
        + steps(f32::from(player_volume.min(MAX_VOLUME)) / NOMINAL_VOLUME);

    roundf(level).clamp(0.0, f32::from(MAX_ATTENUATION)) as u8
}

use arrayvec::ArrayVec;

use crate::consts::*;

/// Controller state of one of the 16 score channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Channel {
    pub(crate) program: u8,
    pub(crate) volume: u8,
    pub(crate) bend: u8,
    pub(crate) sustain: bool,
    // Used by notes that don't carry their own volume
    pub(crate) velocity: u8,
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            program: 0,
            volume: DEFAULT_VOLUME,
            bend: CENTER_BEND,
            sustain: false,
            velocity: DEFAULT_VELOCITY,
        }
    }
}

impl Channel {
    pub(crate) fn reset_controllers(&mut self) {
        self.volume = DEFAULT_VOLUME;
        self.bend = CENTER_BEND;
        self.sustain = false;
    }
}

/// The score channel and note a voice is sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Owner {
    pub(crate) channel: u8,
    pub(crate) note: u8,
}

/// One of the nine physical OPL2 channels.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Voice {
    pub(crate) owner: Option<Owner>,
    pub(crate) patch: usize,
    pub(crate) layer: usize,
    pub(crate) velocity: u8,
    // Tick of the note-on, for stealing
    pub(crate) started: u64,
    // Note-off arrived while the sustain pedal was down
    pub(crate) held: bool,
    // Patch and layer currently programmed into the chip
    pub(crate) loaded: Option<(usize, usize)>,
    pub(crate) reg_b0: u8,
}

/// How a voice was obtained for a new note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Allocation {
    Free(usize),
    /// The voice was still sounding and must be keyed off before reuse.
    Stolen(usize),
}

/// Bookkeeping for the physical voices. Register writes are left to the caller.
#[derive(Debug, Default)]
pub(crate) struct Allocator {
    voices: [Voice; NUM_VOICES],
}

impl Allocator {
    /// Forget every binding and everything loaded into the chip.
    pub(crate) fn reset(&mut self) {
        self.voices = [Voice::default(); NUM_VOICES];
    }

    /// Patch data changed underneath the loaded voices.
    pub(crate) fn invalidate_patches(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.loaded = None;
        }
    }

    pub(crate) fn voice(&self, index: usize) -> &Voice {
        &self.voices[index]
    }

    pub(crate) fn voice_mut(&mut self, index: usize) -> &mut Voice {
        &mut self.voices[index]
    }

    /// Number of voices bound to a note.
    #[cfg(test)]
    pub(crate) fn bound(&self) -> usize {
        self.voices.iter().filter(|v| v.owner.is_some()).count()
    }

    /// Indices of every bound voice.
    pub(crate) fn sounding(&self) -> ArrayVec<usize, NUM_VOICES> {
        self.select(|_| true)
    }

    /// Indices of the voices bound to a score channel.
    pub(crate) fn owned_by(&self, channel: u8) -> ArrayVec<usize, NUM_VOICES> {
        self.select(|owner| owner.channel == channel)
    }

    /// Indices of the voices sounding a note on a score channel.
    pub(crate) fn playing(&self, channel: u8, note: u8) -> ArrayVec<usize, NUM_VOICES> {
        self.select(|owner| *owner == Owner { channel, note })
    }

    fn select<F>(&self, predicate: F) -> ArrayVec<usize, NUM_VOICES>
    where
        F: Fn(&Owner) -> bool,
    {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.owner.as_ref().map_or(false, &predicate))
            .map(|(i, _)| i)
            .collect()
    }

    /// Find a voice for a new note: the lowest free voice, or, when `steal`
    /// is set and none are free, the voice with the oldest note-on. Ties go
    /// to the lowest index.
    pub(crate) fn allocate(&self, steal: bool) -> Option<Allocation> {
        let voices = self.voices.iter().enumerate();

        if let Some((i, _)) = voices.clone().find(|(_, v)| v.owner.is_none()) {
            return Some(Allocation::Free(i));
        }
        if !steal {
            return None;
        }

        voices
            .min_by_key(|&(i, v)| (v.started, i))
            .map(|(i, _)| Allocation::Stolen(i))
    }

    pub(crate) fn bind(
        &mut self,
        index: usize,
        owner: Owner,
        patch: usize,
        layer: usize,
        velocity: u8,
        now: u64,
    ) {
        let voice = &mut self.voices[index];
        voice.owner = Some(owner);
        voice.patch = patch;
        voice.layer = layer;
        voice.velocity = velocity;
        voice.started = now;
        voice.held = false;
    }

    /// Free a voice. The chip keeps whatever patch was loaded.
    pub(crate) fn release(&mut self, index: usize) {
        let voice = &mut self.voices[index];
        voice.owner = None;
        voice.held = false;
    }
}

use log::{debug, trace, warn};

use crate::allocator::{Allocation, Allocator, Channel, Owner, Voice};
use crate::bank::Bank;
use crate::consts::*;
use crate::error::Error;
use crate::mixer::attenuation;
use crate::opl::{voice_pitch, Chip, Frequency, RegisterSink};
use crate::score::{Controller, Event, EventKind, Events, Score, SystemEvent};

/// Playback state of a [`Player`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No song loaded.
    Idle,
    Playing,
    /// A non-looping song reached its end, or its data was malformed.
    Finished,
}

/// The main struct for MUS playback. A `Player` owns the register sink and
/// plays one score at a time, borrowed for the lifetime `'a`.
///
/// Time advances only when [`Player::update`] is called with the number of
/// elapsed ticks (140 Hz for most titles, 70 Hz for Raptor).
///
/// ```rust
/// # use musplay::{Bank, Player};
/// # let op2 = vec![0; 175 * 36];
/// # let lump = [b'M', b'U', b'S', 0x1a, 1, 0, 16, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0x60];
/// let mut player = Player::new(|register: u16, value: u8| {
///     // Forward to an OPL emulator
/// });
/// player.set_bank(&op2).unwrap();
/// player.start(&lump, false).unwrap();
/// while player.update(1) {}
/// ```
#[derive(Debug)]
pub struct Player<'a, S> {
    chip: Chip<S>,
    bank: Bank,
    volume: u8,
    state: State,
    song: Option<Song<'a>>,
    channels: [Channel; NUM_CHANNELS],
    allocator: Allocator,

    // Ticks since the song started
    now: u64,
}

/// Cursor state of the song being played.
#[derive(Debug)]
struct Song<'a> {
    events: Events<'a>,
    looping: bool,
    // Ticks until the next group of events
    wait: u32,
    // Ticks played in the current pass
    elapsed: u64,
}

impl<'a, S: RegisterSink> Player<'a, S> {
    /// Create an idle `Player` with a silent bank at volume 100.
    pub fn new(sink: S) -> Self {
        Player {
            chip: Chip::new(sink),
            bank: Bank::default(),
            volume: DEFAULT_VOLUME,
            state: State::Idle,
            song: None,
            channels: [Channel::default(); NUM_CHANNELS],
            allocator: Allocator::default(),
            now: 0,
        }
    }

    /// Copy a new instrument bank (175 36-byte OP2 patch records, without
    /// the `#OPL_II#` header) into the player.
    pub fn set_bank(&mut self, data: &[u8]) -> Result<(), Error> {
        self.load_bank(Bank::from_slice(data)?);

        Ok(())
    }

    /// Replace the instrument bank with one that is already parsed.
    /// Sounding voices pick up the new patches on their next note.
    ///
    /// Voices still sounding keep their registers. Volume and pitch changes
    /// stop reaching them until they are reused for a new note.
    pub fn load_bank(&mut self, bank: Bank) {
        self.bank = bank;
        self.allocator.invalidate_patches();
        debug!("Instrument bank replaced");
    }

    /// Set the player volume, 0 to 127. 100 plays the music as arranged;
    /// higher values boost it within the available headroom. Values above
    /// 127 are clamped.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
        for index in self.allocator.sounding() {
            self.write_levels(index);
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == State::Playing
    }

    pub fn sink(&self) -> &S {
        self.chip.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.chip.sink_mut()
    }

    pub fn into_sink(self) -> S {
        self.chip.into_sink()
    }

    /// Start playing a MUS lump, replacing any song already playing.
    ///
    /// This initializes the chip registers; the first note sounds on the next
    /// call to [`Player::update`]. If the lump is not a valid MUS score the
    /// previous song is still stopped and the player is left idle.
    pub fn start(&mut self, data: &'a [u8], looping: bool) -> Result<(), Error> {
        self.stop();
        let score = Score::from_slice(data)?;

        self.channels = [Channel::default(); NUM_CHANNELS];
        self.allocator.reset();
        self.chip.reset();
        self.now = 0;
        self.song = Some(Song {
            events: score.events(),
            looping,
            wait: 0,
            elapsed: 0,
        });
        self.state = State::Playing;
        debug!("Started score, looping: {}", looping);

        Ok(())
    }

    /// Key off every channel and unload the song. Safe to call at any time.
    pub fn stop(&mut self) {
        self.silence();
        self.song = None;
        if self.state != State::Idle {
            debug!("Stopped");
        }
        self.state = State::Idle;
    }

    /// Advance time by `ticks` and play every event that falls due.
    ///
    /// Returns `true` while the song is playing, `false` once it has finished
    /// or when no song is loaded. Looping songs never finish. A call with
    /// `ticks <= 0` does nothing and also returns `false`.
    pub fn update(&mut self, ticks: i32) -> bool {
        if self.state != State::Playing || ticks <= 0 {
            return false;
        }
        let mut song = match self.song.take() {
            Some(song) => song,
            None => return false,
        };

        let mut remaining = ticks as u32;
        let playing = loop {
            if song.wait > remaining {
                song.wait -= remaining;
                song.elapsed += u64::from(remaining);
                self.now += u64::from(remaining);
                break true;
            }

            remaining -= song.wait;
            song.elapsed += u64::from(song.wait);
            self.now += u64::from(song.wait);
            song.wait = 0;

            match self.play_due_events(&mut song.events) {
                Ok(Some(delay)) => song.wait = delay,
                Ok(None) if song.looping && song.elapsed > 0 => {
                    debug!("Looping after {} ticks", song.elapsed);
                    song.events.rewind();
                    song.elapsed = 0;
                    self.restart_pass();
                }
                Ok(None) => {
                    if song.looping {
                        warn!("Looping score has no duration");
                    }
                    break false;
                }
                Err(e) => {
                    warn!("Malformed score at tick {}: {:?}", self.now, e);
                    break false;
                }
            }
        };

        if playing {
            self.song = Some(song);
        } else {
            self.silence();
            self.state = State::Finished;
            debug!("Finished at tick {}", self.now);
        }

        playing
    }

    /// Every pass starts with free voices, default controllers and unloaded
    /// patches, so each repetition writes the same registers.
    fn restart_pass(&mut self) {
        for index in self.allocator.sounding() {
            self.key_off(index);
        }
        self.channels = [Channel::default(); NUM_CHANNELS];
        self.allocator.invalidate_patches();
    }

    /// Dispatch events up to and including the next one that carries a
    /// delay. Returns that delay, or `None` at the end of the score.
    fn play_due_events(&mut self, events: &mut Events<'a>) -> Result<Option<u32>, Error> {
        for event in events {
            let event = event?;
            if event.kind == EventKind::ScoreEnd {
                return Ok(None);
            }

            self.dispatch(event);
            if event.delay > 0 {
                return Ok(Some(event.delay));
            }
        }

        Ok(None)
    }

    fn dispatch(&mut self, event: Event) {
        trace!("{:?}", event);
        let channel = usize::from(event.channel).min(NUM_CHANNELS - 1);

        match event.kind {
            EventKind::ReleaseNote { note } => self.note_off(channel, note),
            EventKind::PlayNote { note, volume } => {
                if let Some(volume) = volume {
                    self.channels[channel].velocity = volume;
                }
                self.note_on(channel, note);
            }
            EventKind::PitchBend { bend } => {
                self.channels[channel].bend = bend;
                self.update_pitch(channel);
            }
            EventKind::System(SystemEvent::AllSoundsOff)
            | EventKind::System(SystemEvent::AllNotesOff) => self.release_channel(channel),
            EventKind::System(SystemEvent::ResetControllers) => {
                self.channels[channel].reset_controllers();
                self.release_held(channel);
                self.update_pitch(channel);
                self.update_levels(channel);
            }
            EventKind::Controller { controller, value } => {
                self.controller(channel, controller, value)
            }
            EventKind::System(_) | EventKind::MeasureEnd | EventKind::ScoreEnd => (),
        }
    }

    fn controller(&mut self, channel: usize, controller: Controller, value: u8) {
        match controller {
            Controller::Instrument => self.channels[channel].program = value.min(MAX_PROGRAM),
            Controller::Volume => {
                self.channels[channel].volume = value.min(MAX_VOLUME);
                self.update_levels(channel);
            }
            Controller::Sustain => {
                let sustain = value >= 64;
                self.channels[channel].sustain = sustain;
                if !sustain {
                    self.release_held(channel);
                }
            }
            _ => trace!("Ignoring controller {:?} on channel {}", controller, channel),
        }
    }

    fn note_on(&mut self, channel: usize, note: u8) {
        let percussion = channel == PERCUSSION_CHANNEL;
        let patch_index = if percussion {
            Bank::percussion_index(note)
        } else {
            usize::from(self.channels[channel].program)
        };
        let layers = if self.bank.patch(patch_index).double_voice {
            2
        } else {
            1
        };

        // A score channel sounds one note at a time
        self.release_channel(channel);

        let owner = Owner {
            channel: channel as u8,
            note,
        };
        let velocity = self.channels[channel].velocity;

        for layer in 0..layers {
            // Only the primary layer may take a voice from another note
            let index = match self.allocator.allocate(layer == 0) {
                Some(Allocation::Free(index)) => index,
                Some(Allocation::Stolen(index)) => {
                    trace!("Stealing voice {} for channel {}", index, channel);
                    self.key_off(index);
                    index
                }
                None => break,
            };

            self.allocator
                .bind(index, owner, patch_index, layer, velocity, self.now);
            self.sound_voice(index);
        }
    }

    fn note_off(&mut self, channel: usize, note: u8) {
        for index in self.allocator.playing(channel as u8, note) {
            if self.channels[channel].sustain {
                self.allocator.voice_mut(index).held = true;
            } else {
                self.key_off(index);
            }
        }
    }

    /// Program the voice if its patch changed, then key it on.
    fn sound_voice(&mut self, index: usize) {
        let voice = *self.allocator.voice(index);
        let wanted = (voice.patch, voice.layer);

        if voice.loaded != Some(wanted) {
            let patch = self.bank.patch(voice.patch);
            self.chip.program(index, patch.voice(voice.layer));
            self.allocator.voice_mut(index).loaded = Some(wanted);
        }

        self.write_levels(index);
        self.write_frequency(index);
    }

    fn write_levels(&mut self, index: usize) {
        let voice = *self.allocator.voice(index);
        let owner = match voice.owner {
            Some(owner) if Self::is_programmed(&voice) => owner,
            _ => return,
        };
        let channel = &self.channels[usize::from(owner.channel)];
        let patch = self.bank.patch(voice.patch).voice(voice.layer);

        let mix = |base_level| attenuation(voice.velocity, channel.volume, self.volume, base_level);
        let carrier = mix(patch.carrier.level);
        let modulator = if patch.is_additive() {
            mix(patch.modulator.level)
        } else {
            patch.modulator.level
        };

        self.chip.set_levels(index, patch, modulator, carrier);
    }

    fn write_frequency(&mut self, index: usize) {
        let voice = *self.allocator.voice(index);
        let owner = match voice.owner {
            Some(owner) if Self::is_programmed(&voice) => owner,
            _ => return,
        };
        let channel = usize::from(owner.channel);

        let pitch = voice_pitch(
            self.bank.patch(voice.patch),
            voice.layer,
            owner.note,
            channel == PERCUSSION_CHANNEL,
            self.channels[channel].bend,
        );
        let reg_b0 = self.chip.key_on(index, Frequency::from_pitch(pitch));
        self.allocator.voice_mut(index).reg_b0 = reg_b0;
    }

    /// A voice still sounding a patch from a replaced bank is left alone
    /// until its next note.
    fn is_programmed(voice: &Voice) -> bool {
        voice.loaded == Some((voice.patch, voice.layer))
    }

    fn update_pitch(&mut self, channel: usize) {
        for index in self.allocator.owned_by(channel as u8) {
            self.write_frequency(index);
        }
    }

    fn update_levels(&mut self, channel: usize) {
        for index in self.allocator.owned_by(channel as u8) {
            self.write_levels(index);
        }
    }

    fn key_off(&mut self, index: usize) {
        let reg_b0 = self.allocator.voice(index).reg_b0;
        let reg_b0 = self.chip.key_off(index, reg_b0);
        self.allocator.voice_mut(index).reg_b0 = reg_b0;
        self.allocator.release(index);
    }

    fn release_channel(&mut self, channel: usize) {
        for index in self.allocator.owned_by(channel as u8) {
            self.key_off(index);
        }
    }

    fn release_held(&mut self, channel: usize) {
        for index in self.allocator.owned_by(channel as u8) {
            if self.allocator.voice(index).held {
                self.key_off(index);
            }
        }
    }

    /// Key off every physical channel, bound or not.
    fn silence(&mut self) {
        for index in 0..NUM_VOICES {
            self.key_off(index);
        }
    }
}

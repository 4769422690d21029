//! Byte images and a recording sink for unit tests.

use crate::consts::*;
use crate::opl::RegisterSink;

/// Records every register write.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) writes: Vec<(u16, u8)>,
}

impl RegisterSink for Recorder {
    fn write(&mut self, register: u16, value: u8) {
        self.writes.push((register, value));
    }
}

impl Recorder {
    pub(crate) fn take(&mut self) -> Vec<(u16, u8)> {
        std::mem::take(&mut self.writes)
    }

    /// The most recent value written to a register.
    pub(crate) fn last(&self, register: u16) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(r, _)| *r == register)
            .map(|&(_, v)| v)
    }
}

/// A melodic patch record whose first modulator characteristic byte is
/// `index`, so patches can be told apart by the register writes they cause.
pub(crate) fn patch_record(index: u8) -> Vec<u8> {
    let mut record = vec![0x00, 0x00, 128, 60];
    for _ in 0..2 {
        record.extend_from_slice(&[
            index, 0xf1, 0x13, 0x00, 0x40, 0x10, // Modulator
            0x0e, // Feedback
            0x21, 0xf2, 0x14, 0x01, 0x80, 0x00, // Carrier
            0x00, // Unused
            0x00, 0x00, // Base note offset
        ]);
    }
    record
}

/// A full bank of distinguishable patches.
pub(crate) fn bank_bytes() -> Vec<u8> {
    (0..NUM_PATCHES).flat_map(|i| patch_record(i as u8)).collect()
}

/// Builds MUS lumps event by event.
#[derive(Debug, Default)]
pub(crate) struct MusBuilder {
    body: Vec<u8>,
    last_event: Option<usize>,
    instruments: Vec<u16>,
    channels: (u16, u16),
}

impl MusBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn instruments(mut self, instruments: &[u16]) -> Self {
        self.instruments = instruments.to_vec();
        self
    }

    pub(crate) fn channels(mut self, primary: u16, secondary: u16) -> Self {
        self.channels = (primary, secondary);
        self
    }

    fn event(mut self, descriptor: u8, data: &[u8]) -> Self {
        self.last_event = Some(self.body.len());
        self.body.push(descriptor);
        self.body.extend_from_slice(data);
        self
    }

    pub(crate) fn release(self, channel: u8, note: u8) -> Self {
        self.event(channel, &[note])
    }

    pub(crate) fn play(self, channel: u8, note: u8, volume: Option<u8>) -> Self {
        match volume {
            Some(volume) => self.event(0x10 | channel, &[note | 0x80, volume]),
            None => self.event(0x10 | channel, &[note]),
        }
    }

    pub(crate) fn bend(self, channel: u8, bend: u8) -> Self {
        self.event(0x20 | channel, &[bend])
    }

    pub(crate) fn system(self, channel: u8, controller: u8) -> Self {
        self.event(0x30 | channel, &[controller])
    }

    pub(crate) fn controller(self, channel: u8, controller: u8, value: u8) -> Self {
        self.event(0x40 | channel, &[controller, value])
    }

    pub(crate) fn measure_end(self) -> Self {
        self.event(0x50, &[])
    }

    pub(crate) fn end(self) -> Self {
        self.event(0x60, &[])
    }

    /// Append bytes verbatim.
    pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
        self.last_event = None;
        self.body.extend_from_slice(bytes);
        self
    }

    /// Mark the previous event as the last of its group and wait `ticks`.
    pub(crate) fn wait(mut self, ticks: u32) -> Self {
        let last = self.last_event.expect("wait() needs a preceding event");
        self.body[last] |= 0x80;

        let mut groups = vec![(ticks & 0x7f) as u8];
        let mut rest = ticks >> 7;
        while rest > 0 {
            groups.push((rest & 0x7f) as u8 | 0x80);
            rest >>= 7;
        }
        self.body.extend(groups.iter().rev());
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let start = MUS_HEADER_LENGTH + self.instruments.len() * 2;
        let mut lump = MUS_MAGIC.to_vec();
        for value in [
            self.body.len() as u16,
            start as u16,
            self.channels.0,
            self.channels.1,
            self.instruments.len() as u16,
            0,
        ] {
            lump.extend_from_slice(&value.to_le_bytes());
        }
        for instrument in &self.instruments {
            lump.extend_from_slice(&instrument.to_le_bytes());
        }
        lump.extend_from_slice(&self.body);
        lump
    }
}

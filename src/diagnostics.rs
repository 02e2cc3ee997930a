/// Diagnostics - what the patch last decided, for display or telemetry
///
/// Written from the real-time callbacks, read by whoever wants to show it.
/// Nothing in the patch reads it back.
use crate::sequencer::mode::{Suppression, WriteTarget};
use crate::sequencer::{LaneField, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Idle,
    NotControlChange,
    WrongChannel { channel: u8 },
    Unrecognized { cc: u8 },
    /// A known control with no action (mutes, marker keys, releases)
    Ignored { cc: u8 },
    LaneWritten { lane: u8, field: LaneField, value: u8, target: WriteTarget },
    LaneSuppressed { lane: u8, reason: Suppression },
    TempoSet { period: u32 },
    Shift(bool),
    TempoMode(bool),
    StepJump { step: u8 },
    StepMoved { step: u8 },
    LoopLength { steps: u8 },
    Transport(Transport),
    WriteEnable { lane: u8, enabled: bool },
    LockChanged(bool),
    PerformingChanged(bool),
    TickChanged { channel: u8, divisor: u8, multiplier: u8 },
    Saved { slot: u8 },
    Loaded { slot: u8 },
    LoadFailed { slot: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub last: Decision,
    /// Binary-search probes spent on the last CC lookup
    pub probes: u8,
    pub midi_messages: u32,
    pub blocks: u32,
    pub steps_advanced: u32,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            last: Decision::Idle,
            probes: 0,
            midi_messages: 0,
            blocks: 0,
            steps_advanced: 0,
        }
    }

    pub fn decide(&mut self, decision: Decision) {
        self.last = decision;
    }

    pub fn count_message(&mut self) {
        self.midi_messages = self.midi_messages.wrapping_add(1);
    }

    pub fn count_block(&mut self, advanced: bool) {
        self.blocks = self.blocks.wrapping_add(1);
        if advanced {
            self.steps_advanced = self.steps_advanced.wrapping_add(1);
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

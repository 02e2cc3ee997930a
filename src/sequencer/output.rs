/// Parameter output mapping - lane values to the module's 16 outputs
use super::mode::ModeState;
use super::{Step, LANE_COUNT};

pub const PARAMETER_COUNT: usize = 16;
/// Pulses high for a few blocks on every step change while playing
pub const STEP_TRIGGER: usize = 8;
/// High while the transport is playing
pub const RUN_GATE: usize = 9;

pub struct OutputMapper {
    knob_radix: f32,
    values: [f32; PARAMETER_COUNT],
    trigger_blocks: u32,
    trigger_remaining: u32,
}

impl OutputMapper {
    pub fn new(knob_radix: f32, trigger_blocks: u32) -> Self {
        Self {
            knob_radix,
            values: [0.0; PARAMETER_COUNT],
            trigger_blocks,
            trigger_remaining: 0,
        }
    }

    pub fn values(&self) -> &[f32; PARAMETER_COUNT] {
        &self.values
    }

    pub fn value(&self, parameter: usize) -> Option<f32> {
        self.values.get(parameter).copied()
    }

    pub fn map_lane(&mut self, lane: usize, step: &Step, mode: &ModeState) {
        if lane >= LANE_COUNT {
            return;
        }
        let value = mode.output_lane(lane, step).value(self.knob_radix);
        self.values[lane] = value.clamp(0.0, 1.0);
    }

    pub fn map_all(&mut self, step: &Step, mode: &ModeState) {
        for lane in 0..LANE_COUNT {
            self.map_lane(lane, step, mode);
        }
    }

    pub fn fire_trigger(&mut self) {
        self.trigger_remaining = self.trigger_blocks;
    }

    /// Called once per audio block after any step change in that block
    pub fn end_block(&mut self, playing: bool) {
        if !playing {
            self.trigger_remaining = 0;
        }
        self.values[STEP_TRIGGER] = if self.trigger_remaining > 0 { 1.0 } else { 0.0 };
        self.trigger_remaining = self.trigger_remaining.saturating_sub(1);
        self.values[RUN_GATE] = if playing { 1.0 } else { 0.0 };
    }
}

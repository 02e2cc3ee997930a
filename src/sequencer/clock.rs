/// Step clock - advances the sequencer from the audio block counter
///
/// The clock never looks at wall time: one processed block is
/// `block_size` samples of musical time, whether or not any MIDI arrived.
use serde::Deserialize;

use super::mode::ModeState;
use super::{Sequencer, Song, TICK_CHANNELS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub sample_rate: u32,
    pub block_size: u32,
}

impl Timing {
    /// Seconds to samples, rounded up to a whole number of blocks and never
    /// shorter than one block.
    pub fn round_period(&self, seconds: f64) -> u32 {
        let block = self.block_size.max(1) as u64;
        let samples = (seconds * self.sample_rate as f64).ceil().max(0.0) as u64;
        let max_blocks = u32::MAX as u64 / block;
        let blocks = samples.div_ceil(block).clamp(1, max_blocks);
        (blocks * block) as u32
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 64,
        }
    }
}

/// Two-channel click track derived from the step period
#[derive(Debug, Clone)]
pub struct TickTrack {
    phase: [u64; TICK_CHANNELS],
    click_remaining: [u32; TICK_CHANNELS],
    click_length: u32,
    amplitude: f32,
}

impl TickTrack {
    pub fn new(click_length: u32, amplitude: f32) -> Self {
        Self {
            phase: [0; TICK_CHANNELS],
            click_remaining: [0; TICK_CHANNELS],
            click_length,
            amplitude,
        }
    }

    pub fn reset(&mut self) {
        self.phase = [0; TICK_CHANNELS];
        self.click_remaining = [0; TICK_CHANNELS];
    }

    /// Samples between ticks, or `None` when the channel is silenced
    pub fn interval(song: &Song, channel: usize) -> Option<u64> {
        let divisor = *song.tick_divisor.get(channel)? as u64;
        let multiplier = *song.tick_multiplier.get(channel)? as u64;
        if divisor == 0 || multiplier == 0 {
            return None;
        }
        Some((song.period as u64 * multiplier / divisor).max(1))
    }

    pub fn render(&mut self, song: &Song, playing: bool, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if !playing {
            self.reset();
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            return;
        }

        let intervals = [Self::interval(song, 0), Self::interval(song, 1)];
        for i in 0..frames {
            let mut out = [0.0f32; TICK_CHANNELS];
            for (channel, sample) in out.iter_mut().enumerate() {
                if let Some(interval) = intervals[channel] {
                    let phase = &mut self.phase[channel];
                    if *phase >= interval {
                        *phase = 0;
                    }
                    if *phase == 0 {
                        self.click_remaining[channel] = self.click_length;
                    }
                    *phase += 1;
                }
                if self.click_remaining[channel] > 0 {
                    self.click_remaining[channel] -= 1;
                    *sample = self.amplitude;
                }
            }
            left[i] = out[0];
            right[i] = out[1];
        }
    }
}

pub struct StepClock {
    ticks: TickTrack,
}

impl StepClock {
    pub fn new(ticks: TickTrack) -> Self {
        Self { ticks }
    }

    /// Realign the click track with the start of a step
    pub fn restart(&mut self) {
        self.ticks.reset();
    }

    /// Advance by one block. On a step boundary the sequencer moves on and,
    /// unless performing, write-enabled lanes are captured into the new
    /// step. Returns whether a boundary was crossed.
    pub fn advance(&mut self, seq: &mut Sequencer, mode: &ModeState, block: usize) -> bool {
        if !seq.is_playing() || !seq.count_down(block) {
            return false;
        }
        seq.step_forward();
        seq.carry_countdown();
        seq.capture_enabled(mode);
        true
    }

    pub fn render_ticks(&mut self, seq: &Sequencer, left: &mut [f32], right: &mut [f32]) {
        self.ticks.render(seq.song(), seq.is_playing(), left, right);
    }
}

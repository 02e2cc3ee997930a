/// Core sequencer logic - song data, play position and lane writes
///
/// Everything here is fixed-size and `Copy`, so the whole model lives inside
/// the patch and never touches the allocator from the audio callback.
pub mod clock;
pub mod mode;
pub mod output;

use clock::Timing;
use mode::{tempo_period_seconds, ModeState, Suppression, WriteTarget};

pub const LANE_COUNT: usize = 8;
pub const STEP_COUNT: usize = 8;
pub const TICK_CHANNELS: usize = 2;
/// Lane whose controls are borrowed by tempo-set mode
pub const TEMPO_LANE: usize = 7;
pub const KNOB_CENTER: u8 = 64;
pub const DEFAULT_STEP_SECONDS: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneField {
    Slider,
    Knob,
}

/// One slider + knob pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub slider: u8,
    pub knob: u8,
}

impl Lane {
    pub fn set(&mut self, field: LaneField, value: u8) {
        let value = value.min(127);
        match field {
            LaneField::Slider => self.slider = value,
            LaneField::Knob => self.knob = value,
        }
    }

    /// `slider/127 + (knob-64)/(64*knob_radix)`, unclamped
    pub fn value(&self, knob_radix: f32) -> f32 {
        let slider = self.slider as f32 / 127.0;
        let knob = (self.knob as f32 - KNOB_CENTER as f32) / (64.0 * knob_radix);
        slider + knob
    }
}

impl Default for Lane {
    fn default() -> Self {
        Self {
            slider: 0,
            knob: KNOB_CENTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Step {
    pub lanes: [Lane; LANE_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Song {
    pub steps: [Step; STEP_COUNT],
    /// Samples per step, always a whole number of blocks
    pub period: u32,
    pub steps_live: u8,
    pub tick_divisor: [u8; TICK_CHANNELS],
    pub tick_multiplier: [u8; TICK_CHANNELS],
}

impl Song {
    pub fn new(timing: &Timing) -> Self {
        Self::with_step_seconds(timing, DEFAULT_STEP_SECONDS)
    }

    /// Empty steps, knobs centred, all eight steps live
    pub fn with_step_seconds(timing: &Timing, seconds: f64) -> Self {
        Self {
            steps: [Step::default(); STEP_COUNT],
            period: timing.round_period(seconds),
            steps_live: STEP_COUNT as u8,
            tick_divisor: [1, 2],
            tick_multiplier: [1, 1],
        }
    }

    /// Loaded songs go through this before replacing the live one
    pub fn is_valid(&self, timing: &Timing) -> bool {
        let block = timing.block_size.max(1);
        let lanes_ok = self
            .steps
            .iter()
            .flat_map(|step| step.lanes.iter())
            .all(|lane| lane.slider <= 127 && lane.knob <= 127);

        lanes_ok
            && (1..=STEP_COUNT as u8).contains(&self.steps_live)
            && self.period >= block
            && self.period % block == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerState {
    pub step_at: usize,
    pub samples_to_next_step: i64,
    pub transport: Transport,
}

/// What happened to a slider or knob value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneWrite {
    Written(WriteTarget),
    Tempo { period: u32 },
    Suppressed(Suppression),
}

pub struct Sequencer {
    song: Song,
    player: PlayerState,
    timing: Timing,
    knob_mag: f32,
}

impl Sequencer {
    pub fn new(song: Song, timing: Timing, knob_mag: f32) -> Self {
        let period = song.period as i64;
        Self {
            song,
            player: PlayerState {
                step_at: 0,
                samples_to_next_step: period,
                transport: Transport::Stopped,
            },
            timing,
            knob_mag,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn step_at(&self) -> usize {
        self.player.step_at
    }

    pub fn steps_live(&self) -> usize {
        self.song.steps_live as usize
    }

    pub fn current_step(&self) -> &Step {
        &self.song.steps[self.player.step_at]
    }

    pub fn current_step_mut(&mut self) -> &mut Step {
        &mut self.song.steps[self.player.step_at]
    }

    pub fn step_forward(&mut self) -> usize {
        self.player.step_at = (self.player.step_at + 1) % self.steps_live();
        self.player.step_at
    }

    pub fn step_backward(&mut self) -> usize {
        let live = self.steps_live();
        self.player.step_at = (self.player.step_at + live - 1) % live;
        self.player.step_at
    }

    /// Jumps are ignored when `step` is outside the live loop
    pub fn jump_to(&mut self, step: usize) -> bool {
        if step >= self.steps_live() {
            return false;
        }
        self.player.step_at = step;
        true
    }

    pub fn set_steps_live(&mut self, steps: usize) -> usize {
        let steps = steps.clamp(1, STEP_COUNT);
        self.song.steps_live = steps as u8;
        self.player.step_at %= steps;
        steps
    }

    pub fn transport(&self) -> Transport {
        self.player.transport
    }

    pub fn is_playing(&self) -> bool {
        self.player.transport == Transport::Playing
    }

    pub fn toggle_play(&mut self) -> Transport {
        match self.player.transport {
            Transport::Stopped => {
                self.player.transport = Transport::Playing;
                self.rearm();
            }
            Transport::Playing => self.player.transport = Transport::Stopped,
        }
        self.player.transport
    }

    pub fn stop(&mut self) {
        self.player.transport = Transport::Stopped;
        self.player.step_at = 0;
        self.rearm();
    }

    /// Restart the countdown for a full step
    pub fn rearm(&mut self) {
        self.player.samples_to_next_step = self.song.period as i64;
    }

    /// Start the next step's countdown, keeping whatever the crossing block
    /// ran past the boundary.
    pub fn carry_countdown(&mut self) {
        self.player.samples_to_next_step += self.song.period as i64;
        if self.player.samples_to_next_step <= 0 {
            self.rearm();
        }
    }

    /// Count down by one block; true when the countdown crossed zero
    pub fn count_down(&mut self, samples: usize) -> bool {
        self.player.samples_to_next_step -= samples as i64;
        self.player.samples_to_next_step <= 0
    }

    /// Swap in a new period, shifting the in-flight countdown by the
    /// difference so the current step stretches instead of restarting.
    pub fn set_period(&mut self, period: u32) {
        let delta = period as i64 - self.song.period as i64;
        self.song.period = period;
        self.player.samples_to_next_step += delta;
    }

    pub fn set_tick(&mut self, channel: usize, divisor: u8, multiplier: u8) {
        if channel < TICK_CHANNELS {
            self.song.tick_divisor[channel] = divisor;
            self.song.tick_multiplier[channel] = multiplier;
        }
    }

    pub fn load_song(&mut self, song: Song) {
        self.song = song;
        self.player.step_at %= self.steps_live().max(1);
        self.rearm();
    }

    /// Route one slider/knob value through the active modes.
    ///
    /// The raw value is remembered whenever tempo-set mode is off, even if
    /// the write itself is suppressed by the lane lock. The tempo lane is
    /// always remembered, since its slider and knob together are the tempo.
    pub fn write_lane(
        &mut self,
        mode: &mut ModeState,
        lane: usize,
        field: LaneField,
        value: u8,
    ) -> LaneWrite {
        if lane >= LANE_COUNT {
            return LaneWrite::Suppressed(Suppression::OutOfRange);
        }
        if !mode.tempo_set() || lane == TEMPO_LANE {
            mode.record_raw(lane, field, value);
        }

        match mode.route(lane) {
            Err(reason) => LaneWrite::Suppressed(reason),
            Ok(WriteTarget::Tempo) => {
                let tempo = mode.raw(TEMPO_LANE).unwrap_or_default();
                let seconds = tempo_period_seconds(tempo, self.knob_mag);
                let period = self.timing.round_period(seconds);
                self.set_period(period);
                LaneWrite::Tempo { period }
            }
            Ok(WriteTarget::Overlay) => {
                mode.write_overlay(lane, field, value);
                LaneWrite::Written(WriteTarget::Overlay)
            }
            Ok(WriteTarget::Song) => {
                self.current_step_mut().lanes[lane].set(field, value);
                LaneWrite::Written(WriteTarget::Song)
            }
        }
    }

    /// Copy a lane's last raw values into wherever writes for it land now
    pub fn commit_raw(&mut self, mode: &mut ModeState, lane: usize) -> Option<WriteTarget> {
        let raw = mode.raw(lane)?;
        if mode.performing() {
            mode.set_overlay(lane, raw);
            Some(WriteTarget::Overlay)
        } else {
            self.current_step_mut().lanes[lane] = raw;
            Some(WriteTarget::Song)
        }
    }

    /// Write-through: enabled lanes take their raw values into the
    /// current step. Skipped while performing.
    pub fn capture_enabled(&mut self, mode: &ModeState) {
        if mode.performing() {
            return;
        }
        for lane in 0..LANE_COUNT {
            if mode.write_enabled(lane) {
                if let Some(raw) = mode.raw(lane) {
                    self.current_step_mut().lanes[lane] = raw;
                }
            }
        }
    }
}

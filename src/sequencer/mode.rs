/// Mode overlays - tempo-set, lane lock and performance
///
/// These reinterpret where slider/knob writes land without touching the
/// song data themselves.
use super::{Lane, LaneField, Step, LANE_COUNT, TEMPO_LANE};

/// Where an accepted lane write goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Song,
    Overlay,
    Tempo,
}

/// Why a lane write was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    TempoSet,
    Locked,
    OutOfRange,
}

/// `240 / x` seconds, where `x = slider/128 + (knob+1)*knob_mag/128/128`
pub fn tempo_period_seconds(tempo: Lane, knob_mag: f32) -> f64 {
    let x = tempo.slider as f64 / 128.0
        + (tempo.knob as f64 + 1.0) * knob_mag as f64 / 128.0 / 128.0;
    240.0 / x
}

#[derive(Debug, Clone)]
pub struct ModeState {
    shift_held: bool,
    fast_forward_held: bool,
    tempo_set: bool,
    locked: bool,
    performing: bool,
    write_enabled: [bool; LANE_COUNT],
    raw: [Lane; LANE_COUNT],
    overlay: [Option<Lane>; LANE_COUNT],
}

impl ModeState {
    pub fn new() -> Self {
        Self {
            shift_held: false,
            fast_forward_held: false,
            tempo_set: false,
            locked: false,
            performing: false,
            write_enabled: [false; LANE_COUNT],
            raw: [Lane::default(); LANE_COUNT],
            overlay: [None; LANE_COUNT],
        }
    }

    /// Seed the raw memory from a step so enabling a lane before touching
    /// its controls does not zero it.
    pub fn seed_raw(&mut self, step: &Step) {
        self.raw = step.lanes;
    }

    pub fn shift_held(&self) -> bool {
        self.shift_held
    }

    pub fn tempo_set(&self) -> bool {
        self.tempo_set
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn performing(&self) -> bool {
        self.performing
    }

    pub fn write_enabled(&self, lane: usize) -> bool {
        self.write_enabled.get(lane).copied().unwrap_or(false)
    }

    pub fn set_shift(&mut self, held: bool) {
        self.shift_held = held;
        if !held {
            self.tempo_set = false;
        }
    }

    /// Pressing FF with Shift held enters tempo-set mode; it lasts only
    /// while both keys stay down.
    pub fn set_fast_forward(&mut self, held: bool) -> bool {
        self.fast_forward_held = held;
        if !held {
            self.tempo_set = false;
        } else if self.shift_held {
            self.tempo_set = true;
        }
        self.tempo_set
    }

    pub fn toggle_lock(&mut self) -> bool {
        self.locked = !self.locked;
        if !self.locked {
            self.set_performing(false);
        }
        self.locked
    }

    /// Only available while locked
    pub fn toggle_performing(&mut self) -> Option<bool> {
        if !self.locked {
            return None;
        }
        let performing = !self.performing;
        self.set_performing(performing);
        Some(performing)
    }

    fn set_performing(&mut self, performing: bool) {
        self.performing = performing;
        if !performing {
            self.overlay = [None; LANE_COUNT];
        }
    }

    /// Returns the new flag, or `None` for an out-of-range lane
    pub fn toggle_write_enabled(&mut self, lane: usize) -> Option<bool> {
        let flag = self.write_enabled.get_mut(lane)?;
        *flag = !*flag;
        Some(*flag)
    }

    pub fn raw(&self, lane: usize) -> Option<Lane> {
        self.raw.get(lane).copied()
    }

    pub fn record_raw(&mut self, lane: usize, field: LaneField, value: u8) {
        if let Some(raw) = self.raw.get_mut(lane) {
            raw.set(field, value);
        }
    }

    pub fn route(&self, lane: usize) -> Result<WriteTarget, Suppression> {
        if lane >= LANE_COUNT {
            return Err(Suppression::OutOfRange);
        }
        if self.tempo_set {
            return if lane == TEMPO_LANE {
                Ok(WriteTarget::Tempo)
            } else {
                Err(Suppression::TempoSet)
            };
        }
        if self.locked && !self.write_enabled[lane] {
            return Err(Suppression::Locked);
        }
        if self.performing && self.write_enabled[lane] {
            Ok(WriteTarget::Overlay)
        } else {
            Ok(WriteTarget::Song)
        }
    }

    pub fn write_overlay(&mut self, lane: usize, field: LaneField, value: u8) {
        let Some(raw) = self.raw.get(lane).copied() else { return };
        let slot = &mut self.overlay[lane];
        let mut lane_value = slot.unwrap_or(raw);
        lane_value.set(field, value);
        *slot = Some(lane_value);
    }

    pub fn set_overlay(&mut self, lane: usize, value: Lane) {
        if let Some(slot) = self.overlay.get_mut(lane) {
            *slot = Some(value);
        }
    }

    /// The value a lane should output right now: the performance overlay
    /// for enabled lanes while performing, the stored step otherwise.
    pub fn output_lane(&self, lane: usize, step: &Step) -> Lane {
        let stored = step.lanes[lane];
        if self.performing && self.write_enabled(lane) {
            self.overlay[lane].unwrap_or(stored)
        } else {
            stored
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_chord() {
        let mut mode = ModeState::new();
        assert!(!mode.set_fast_forward(true));
        mode.set_fast_forward(false);

        mode.set_shift(true);
        assert!(mode.set_fast_forward(true));
        assert_eq!(mode.route(TEMPO_LANE), Ok(WriteTarget::Tempo));
        assert_eq!(mode.route(0), Err(Suppression::TempoSet));

        mode.set_shift(false);
        assert!(!mode.tempo_set());
        assert_eq!(mode.route(TEMPO_LANE), Ok(WriteTarget::Song));
    }

    #[test]
    fn test_performing_requires_lock() {
        let mut mode = ModeState::new();
        assert_eq!(mode.toggle_performing(), None);
        mode.toggle_lock();
        assert_eq!(mode.toggle_performing(), Some(true));
        mode.toggle_lock();
        assert!(!mode.performing());
    }

    #[test]
    fn test_overlay_used_only_for_enabled_lanes() {
        let mut mode = ModeState::new();
        let step = Step::default();
        mode.toggle_lock();
        mode.toggle_write_enabled(3);
        mode.toggle_performing();

        assert_eq!(mode.route(3), Ok(WriteTarget::Overlay));
        assert_eq!(mode.route(4), Err(Suppression::Locked));

        mode.write_overlay(3, LaneField::Slider, 120);
        assert_eq!(mode.output_lane(3, &step).slider, 120);
        assert_eq!(mode.output_lane(4, &step), step.lanes[4]);

        mode.toggle_performing();
        assert_eq!(mode.output_lane(3, &step), step.lanes[3]);
    }

    #[test]
    fn test_tempo_formula() {
        let seconds = tempo_period_seconds(Lane { slider: 96, knob: 64 }, 1.0);
        let expected = 240.0 / (96.0 / 128.0 + 65.0 / 128.0 / 128.0);
        assert!((seconds - expected).abs() < 1e-9);
    }

    #[test]
    fn test_write_enable_out_of_range() {
        let mut mode = ModeState::new();
        assert_eq!(mode.toggle_write_enabled(8), None);
        assert!(!mode.write_enabled(8));
    }
}

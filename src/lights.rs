/// Light sync - keeps the surface LEDs in step with sequencer state
///
/// Each callback rebuilds the whole desired frame, then only the lights
/// that differ from the last frame go out as CC messages.
use crate::control::{CcGroup, ControlDatabase, UniqueId, LIGHT_COUNT};
use crate::midi::{control_change, MidiSink, LIGHT_OFF, LIGHT_ON};
use crate::sequencer::mode::ModeState;
use crate::sequencer::{Transport, LANE_COUNT, TEMPO_LANE};

pub type LightFrame = [bool; LIGHT_COUNT];

/// The state the lights are computed from
pub struct LightView<'a> {
    pub step_at: usize,
    pub steps_live: usize,
    pub transport: Transport,
    pub mode: &'a ModeState,
}

fn light(frame: &mut LightFrame, index: Option<u8>) {
    if let Some(slot) = index.and_then(|i| frame.get_mut(i as usize)) {
        *slot = true;
    }
}

pub fn compose(view: &LightView, db: &ControlDatabase) -> LightFrame {
    let mut frame = [false; LIGHT_COUNT];
    let mode = view.mode;

    // Record row: playing step, or the whole live loop while locked+shifted
    if mode.locked() && mode.shift_held() {
        for step in 0..view.steps_live {
            light(&mut frame, db.lane_light(CcGroup::Record, step));
        }
    } else {
        light(&mut frame, db.lane_light(CcGroup::Record, view.step_at));
    }

    for lane in 0..LANE_COUNT {
        if mode.write_enabled(lane) {
            light(&mut frame, db.lane_light(CcGroup::Solo, lane));
        }
    }

    let transport = match view.transport {
        Transport::Playing => UniqueId::Play,
        Transport::Stopped => UniqueId::Stop,
    };
    light(&mut frame, db.unique_light(transport));

    if mode.locked() {
        light(&mut frame, db.unique_light(UniqueId::Rewind));
    }
    if mode.performing() {
        light(&mut frame, db.unique_light(UniqueId::Rec));
    }
    if mode.shift_held() {
        light(&mut frame, db.unique_light(UniqueId::Shift));
    }

    if mode.tempo_set() {
        light(&mut frame, db.lane_light(CcGroup::Mute, TEMPO_LANE));
        light(&mut frame, db.lane_light(CcGroup::Solo, TEMPO_LANE));
        light(&mut frame, db.unique_light(UniqueId::FastForward));
    }

    frame
}

pub struct LightSync {
    current: LightFrame,
    previous: LightFrame,
    pending: bool,
    armed: bool,
    channel: u8,
}

impl LightSync {
    pub fn new(channel: u8) -> Self {
        Self {
            current: [false; LIGHT_COUNT],
            previous: [false; LIGHT_COUNT],
            pending: true,
            armed: false,
            channel,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Mark that something a light depends on may have changed
    pub fn invalidate(&mut self) {
        self.pending = true;
    }

    /// Snapshot the current frame as the baseline for the next diff.
    /// Only acts when a recompute is pending, and only once until the
    /// following `update`, so repeated calls keep the true baseline.
    pub fn ready(&mut self) {
        if !self.pending || self.armed {
            return;
        }
        self.previous = self.current;
        self.current = [false; LIGHT_COUNT];
        self.armed = true;
    }

    /// Recompute the frame if pending and send one CC per changed light.
    /// Returns the number of messages sent.
    pub fn update(&mut self, view: &LightView, db: &ControlDatabase, sink: &mut impl MidiSink) -> usize {
        if !self.pending {
            return 0;
        }
        self.ready();
        self.current = compose(view, db);

        let mut sent = 0;
        for (index, (&now, &was)) in self.current.iter().zip(self.previous.iter()).enumerate() {
            if now == was {
                continue;
            }
            if let Some(cc) = db.light_cc(index as u8) {
                let value = if now { LIGHT_ON } else { LIGHT_OFF };
                sink.send(control_change(self.channel, cc, value));
                sent += 1;
            }
        }

        self.pending = false;
        self.armed = false;
        sent
    }

    /// Turn every light on the surface off and forget the last frame
    pub fn blank(&mut self, db: &ControlDatabase, sink: &mut impl MidiSink) {
        for entry in db.entries().iter().filter(|e| e.light.is_some()) {
            sink.send(control_change(self.channel, entry.cc, LIGHT_OFF));
        }
        self.current = [false; LIGHT_COUNT];
        self.previous = [false; LIGHT_COUNT];
        self.armed = false;
        self.pending = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(mode: &ModeState) -> LightView<'_> {
        LightView {
            step_at: 2,
            steps_live: 4,
            transport: Transport::Stopped,
            mode,
        }
    }

    fn lit_ccs(frame: &LightFrame, db: &ControlDatabase) -> Vec<u8> {
        let mut ccs: Vec<u8> = frame
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .filter_map(|(i, _)| db.light_cc(i as u8))
            .collect();
        ccs.sort();
        ccs
    }

    #[test]
    fn test_compose_idle() {
        let db = ControlDatabase::new();
        let mode = ModeState::new();
        // Record 2 and Stop
        assert_eq!(lit_ccs(&compose(&view(&mode), &db), &db), vec![42, 66]);
    }

    #[test]
    fn test_compose_locked_shifted_shows_loop() {
        let db = ControlDatabase::new();
        let mut mode = ModeState::new();
        mode.toggle_lock();
        mode.set_shift(true);
        mode.toggle_write_enabled(5);
        let ccs = lit_ccs(&compose(&view(&mode), &db), &db);
        assert_eq!(ccs, vec![37, 42, 43, 46, 64, 65, 66, 67]);
    }

    #[test]
    fn test_compose_tempo_set() {
        let db = ControlDatabase::new();
        let mut mode = ModeState::new();
        mode.set_shift(true);
        mode.set_fast_forward(true);
        let ccs = lit_ccs(&compose(&view(&mode), &db), &db);
        assert!(ccs.contains(&39));
        assert!(ccs.contains(&55));
        assert!(ccs.contains(&44));
    }

    #[test]
    fn test_second_update_sends_nothing() {
        let db = ControlDatabase::new();
        let mode = ModeState::new();
        let mut lights = LightSync::new(0);
        let mut sent: Vec<[u8; 3]> = Vec::new();

        assert_eq!(lights.update(&view(&mode), &db, &mut sent), 2);
        lights.invalidate();
        lights.ready();
        assert_eq!(lights.update(&view(&mode), &db, &mut sent), 0);
        assert_eq!(lights.update(&view(&mode), &db, &mut sent), 0);
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn test_double_ready_keeps_baseline() {
        let db = ControlDatabase::new();
        let mut mode = ModeState::new();
        let mut lights = LightSync::new(0);
        let mut sent: Vec<[u8; 3]> = Vec::new();
        lights.update(&view(&mode), &db, &mut sent);
        sent.clear();

        lights.invalidate();
        lights.ready();
        lights.ready();
        mode.toggle_write_enabled(0);
        assert_eq!(lights.update(&view(&mode), &db, &mut sent), 1);
        assert_eq!(sent, vec![[0xB0, 32, 127]]);
    }

    #[test]
    fn test_blank_turns_everything_off() {
        let db = ControlDatabase::new();
        let mut lights = LightSync::new(0);
        let mut sent: Vec<[u8; 3]> = Vec::new();
        lights.blank(&db, &mut sent);
        assert_eq!(sent.len(), LIGHT_COUNT);
        assert!(sent.iter().all(|m| m[2] == 0));
        assert!(lights.is_pending());
    }
}

/// The sequencer patch - owns every component and routes MIDI and audio
/// callbacks through them.
///
/// Each callback runs `ready` on the lights first, mutates state, then
/// runs `update` last so only changed lights are sent.
use crate::config::Config;
use crate::control::{CcGroup, ControlDatabase, UniqueId};
use crate::diagnostics::{Decision, Diagnostics};
use crate::lights::{LightSync, LightView};
use crate::midi::{MidiMessage, MidiSink};
use crate::sequencer::clock::{StepClock, TickTrack};
use crate::sequencer::mode::ModeState;
use crate::sequencer::output::{OutputMapper, PARAMETER_COUNT};
use crate::sequencer::{LaneField, LaneWrite, PlayerState, Sequencer, Song, Transport, TICK_CHANNELS};
use crate::store::{MemorySongStore, SongStore};

const MAX_TICK_SETTING: u8 = 8;

/// A copyable summary for hosts that show state outside the callbacks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchStatus {
    pub step_at: usize,
    pub steps_live: usize,
    pub transport: Transport,
    pub period: u32,
    pub tempo_set: bool,
    pub locked: bool,
    pub performing: bool,
    pub last: Decision,
    pub parameters: [f32; PARAMETER_COUNT],
}

pub struct SequencerPatch<S: SongStore = MemorySongStore> {
    db: ControlDatabase,
    seq: Sequencer,
    mode: ModeState,
    clock: StepClock,
    outputs: OutputMapper,
    lights: LightSync,
    diagnostics: Diagnostics,
    store: S,
    channel: u8,
    slot: u8,
}

impl<S: SongStore> SequencerPatch<S> {
    /// Build the patch, starting from the configured store slot when it
    /// holds a usable song and from the default song otherwise.
    pub fn new(config: &Config, mut store: S) -> Self {
        let timing = config.timing;
        let slot = config.song.slot;
        let song = match store.load(slot) {
            Some(song) if song.is_valid(&timing) => {
                log::info!(target: "patch", "starting from song in slot {}", slot);
                song
            }
            Some(_) => {
                log::warn!(target: "patch", "song in slot {} is malformed, using defaults", slot);
                Song::with_step_seconds(&timing, config.song.default_step_seconds)
            }
            None => {
                log::debug!(target: "patch", "slot {} is empty, using defaults", slot);
                Song::with_step_seconds(&timing, config.song.default_step_seconds)
            }
        };

        let seq = Sequencer::new(song, timing, config.surface.knob_mag);
        let mut mode = ModeState::new();
        mode.seed_raw(seq.current_step());

        let mut outputs = OutputMapper::new(config.surface.knob_radix, config.trigger.length_blocks);
        outputs.map_all(seq.current_step(), &mode);
        outputs.end_block(false);

        Self {
            db: ControlDatabase::new(),
            seq,
            mode,
            clock: StepClock::new(TickTrack::new(config.click.length_samples, config.click.amplitude)),
            outputs,
            lights: LightSync::new(config.surface.channel),
            diagnostics: Diagnostics::new(),
            store,
            channel: config.surface.channel,
            slot,
        }
    }

    /// Blank the surface and draw the first frame
    pub fn start(&mut self, sink: &mut impl MidiSink) {
        self.lights.blank(&self.db, sink);
        self.refresh_lights(sink);
    }

    pub fn song(&self) -> &Song {
        self.seq.song()
    }

    pub fn player(&self) -> &PlayerState {
        self.seq.player()
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    pub fn parameters(&self) -> &[f32; PARAMETER_COUNT] {
        self.outputs.values()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn status(&self) -> PatchStatus {
        PatchStatus {
            step_at: self.seq.step_at(),
            steps_live: self.seq.steps_live(),
            transport: self.seq.transport(),
            period: self.seq.song().period,
            tempo_set: self.mode.tempo_set(),
            locked: self.mode.locked(),
            performing: self.mode.performing(),
            last: self.diagnostics.last,
            parameters: *self.outputs.values(),
        }
    }

    pub fn process_midi_bytes(&mut self, bytes: &[u8], sink: &mut impl MidiSink) {
        match MidiMessage::parse(bytes) {
            Some(message) => self.process_midi(message, sink),
            None => {
                self.diagnostics.count_message();
                self.diagnostics.decide(Decision::NotControlChange);
            }
        }
    }

    pub fn process_midi(&mut self, message: MidiMessage, sink: &mut impl MidiSink) {
        self.diagnostics.count_message();
        self.lights.ready();

        let decision = match message {
            MidiMessage::ControlChange { channel, controller, value } if channel == self.channel => {
                self.handle_cc(controller, value)
            }
            MidiMessage::ControlChange { channel, .. } => Decision::WrongChannel { channel },
            MidiMessage::Other { .. } => Decision::NotControlChange,
        };
        self.diagnostics.decide(decision);

        self.refresh_lights(sink);
    }

    /// One audio block. `left`/`right` receive the tick track (silence when
    /// stopped); the block length is the shorter of the two.
    pub fn process_audio(&mut self, left: &mut [f32], right: &mut [f32], sink: &mut impl MidiSink) {
        let frames = left.len().min(right.len());
        self.lights.ready();

        let advanced = self.clock.advance(&mut self.seq, &self.mode, frames);
        if advanced {
            self.outputs.map_all(self.seq.current_step(), &self.mode);
            self.outputs.fire_trigger();
            self.lights.invalidate();
        }
        self.outputs.end_block(self.seq.is_playing());
        self.clock
            .render_ticks(&self.seq, &mut left[..frames], &mut right[..frames]);
        self.diagnostics.count_block(advanced);

        self.refresh_lights(sink);
    }

    fn refresh_lights(&mut self, sink: &mut impl MidiSink) {
        let view = LightView {
            step_at: self.seq.step_at(),
            steps_live: self.seq.steps_live(),
            transport: self.seq.transport(),
            mode: &self.mode,
        };
        self.lights.update(&view, &self.db, sink);
    }

    fn handle_cc(&mut self, cc: u8, value: u8) -> Decision {
        let search = self.db.search(cc);
        self.diagnostics.probes = search.probes;
        let Some(entry) = search.entry else {
            return Decision::Unrecognized { cc };
        };
        self.lights.invalidate();

        let index = entry.id as usize;
        let pressed = value > 0;
        match entry.group {
            CcGroup::Slider => self.move_lane(index, LaneField::Slider, value),
            CcGroup::Knob => self.move_lane(index, LaneField::Knob, value),
            CcGroup::Record if pressed => self.press_record(index, cc),
            CcGroup::Solo if pressed => self.press_solo(index, cc),
            CcGroup::UniqueLit | CcGroup::UniqueUnlit => match entry.unique_id() {
                Some(id) => self.unique(id, pressed, cc),
                None => Decision::Ignored { cc },
            },
            _ => Decision::Ignored { cc },
        }
    }

    fn remap(&mut self) {
        self.outputs.map_all(self.seq.current_step(), &self.mode);
    }

    /// A manual step change: remap and, while playing, retrigger
    fn step_changed(&mut self) {
        self.remap();
        if self.seq.is_playing() {
            self.outputs.fire_trigger();
        }
    }

    fn move_lane(&mut self, lane: usize, field: LaneField, value: u8) -> Decision {
        match self.seq.write_lane(&mut self.mode, lane, field, value) {
            LaneWrite::Written(target) => {
                self.outputs.map_lane(lane, self.seq.current_step(), &self.mode);
                Decision::LaneWritten { lane: lane as u8, field, value, target }
            }
            LaneWrite::Tempo { period } => Decision::TempoSet { period },
            LaneWrite::Suppressed(reason) => Decision::LaneSuppressed { lane: lane as u8, reason },
        }
    }

    fn press_record(&mut self, step: usize, cc: u8) -> Decision {
        if self.mode.shift_held() {
            let steps = self.seq.set_steps_live(step + 1);
            self.remap();
            Decision::LoopLength { steps: steps as u8 }
        } else if self.seq.jump_to(step) {
            self.step_changed();
            Decision::StepJump { step: step as u8 }
        } else {
            Decision::Ignored { cc }
        }
    }

    fn press_solo(&mut self, lane: usize, cc: u8) -> Decision {
        let Some(enabled) = self.mode.toggle_write_enabled(lane) else {
            return Decision::Ignored { cc };
        };
        if enabled {
            self.seq.commit_raw(&mut self.mode, lane);
        }
        self.outputs.map_lane(lane, self.seq.current_step(), &self.mode);
        Decision::WriteEnable { lane: lane as u8, enabled }
    }

    fn unique(&mut self, id: UniqueId, pressed: bool, cc: u8) -> Decision {
        match id {
            UniqueId::Shift => {
                self.mode.set_shift(pressed);
                Decision::Shift(pressed)
            }
            UniqueId::FastForward => self.fast_forward(pressed, cc),
            _ if !pressed => Decision::Ignored { cc },
            UniqueId::Play => {
                let transport = self.seq.toggle_play();
                if transport == Transport::Playing {
                    self.clock.restart();
                    self.outputs.fire_trigger();
                }
                self.remap();
                Decision::Transport(transport)
            }
            UniqueId::Stop => {
                if self.mode.shift_held() && self.mode.locked() {
                    let performing = self.mode.toggle_performing().unwrap_or(false);
                    self.remap();
                    Decision::PerformingChanged(performing)
                } else {
                    self.seq.stop();
                    self.clock.restart();
                    self.remap();
                    Decision::Transport(Transport::Stopped)
                }
            }
            UniqueId::Rewind => {
                if self.mode.shift_held() {
                    let locked = self.mode.toggle_lock();
                    self.remap();
                    Decision::LockChanged(locked)
                } else {
                    let step = self.seq.step_backward();
                    self.step_changed();
                    Decision::StepMoved { step: step as u8 }
                }
            }
            UniqueId::Rec => {
                if self.mode.shift_held() {
                    self.load_song()
                } else {
                    self.store.save(self.slot, self.seq.song());
                    Decision::Saved { slot: self.slot }
                }
            }
            UniqueId::SongL => self.cycle_tick(0),
            UniqueId::SongR => self.cycle_tick(1),
            UniqueId::MenuClick | UniqueId::MenuL | UniqueId::MenuR => Decision::Ignored { cc },
        }
    }

    fn fast_forward(&mut self, pressed: bool, cc: u8) -> Decision {
        if !pressed {
            let was_tempo = self.mode.tempo_set();
            self.mode.set_fast_forward(false);
            return if was_tempo {
                Decision::TempoMode(false)
            } else {
                Decision::Ignored { cc }
            };
        }
        if self.mode.set_fast_forward(true) {
            return Decision::TempoMode(true);
        }
        let step = self.seq.step_forward();
        self.step_changed();
        Decision::StepMoved { step: step as u8 }
    }

    fn load_song(&mut self) -> Decision {
        match self.store.load(self.slot) {
            Some(song) if song.is_valid(self.seq.timing()) => {
                self.seq.load_song(song);
                self.remap();
                Decision::Loaded { slot: self.slot }
            }
            _ => Decision::LoadFailed { slot: self.slot },
        }
    }

    /// Track keys: divisor 0..=8 (0 mutes the channel), with Shift the
    /// multiplier 1..=8.
    fn cycle_tick(&mut self, channel: usize) -> Decision {
        if channel >= TICK_CHANNELS {
            return Decision::Idle;
        }
        let song = self.seq.song();
        let mut divisor = song.tick_divisor[channel];
        let mut multiplier = song.tick_multiplier[channel];
        if self.mode.shift_held() {
            multiplier = multiplier % MAX_TICK_SETTING + 1;
        } else {
            divisor = (divisor + 1) % (MAX_TICK_SETTING + 1);
        }
        self.seq.set_tick(channel, divisor, multiplier);
        Decision::TickChanged { channel: channel as u8, divisor, multiplier }
    }
}

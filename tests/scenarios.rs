use kontrol_seq::control::{ControlDatabase, CC_COUNT};
use kontrol_seq::lights::{LightSync, LightView};
use kontrol_seq::sequencer::clock::Timing;
use kontrol_seq::sequencer::mode::ModeState;
use kontrol_seq::sequencer::Transport;
use kontrol_seq::{Config, Decision, MemorySongStore, MidiMessage, SequencerPatch};

const SHIFT: u8 = 46;
const PLAY: u8 = 41;
const REW: u8 = 43;
const FF: u8 = 44;

fn config(sample_rate: u32, block_size: u32) -> Config {
    let mut config = Config::default();
    config.timing = Timing {
        sample_rate,
        block_size,
    };
    config
}

fn patch_with(config: &Config) -> SequencerPatch {
    let mut patch = SequencerPatch::new(config, MemorySongStore::new());
    patch.start(&mut Vec::<[u8; 3]>::new());
    patch
}

fn cc(patch: &mut SequencerPatch, controller: u8, value: u8) -> Vec<[u8; 3]> {
    let mut sent = Vec::new();
    patch.process_midi(
        MidiMessage::ControlChange {
            channel: 0,
            controller,
            value,
        },
        &mut sent,
    );
    sent
}

fn press(patch: &mut SequencerPatch, controller: u8) {
    cc(patch, controller, 127);
    cc(patch, controller, 0);
}

fn block(patch: &mut SequencerPatch, frames: usize) -> Vec<[u8; 3]> {
    let mut left = vec![0.0; frames];
    let mut right = vec![0.0; frames];
    let mut sent = Vec::new();
    patch.process_audio(&mut left, &mut right, &mut sent);
    sent
}

#[test]
fn test_every_table_cc_dispatches_to_its_entry() {
    let db = ControlDatabase::new();
    assert_eq!(db.entries().len(), CC_COUNT);
    for entry in db.entries() {
        let found = db.search(entry.cc).entry.expect("table cc must be found");
        assert_eq!(found.cc, entry.cc);
        assert_eq!(found, entry);
    }
}

#[test]
fn test_absent_cc_changes_nothing() {
    let db = ControlDatabase::new();
    let mut patch = patch_with(&config(1000, 10));
    cc(&mut patch, 0, 40);
    press(&mut patch, 32 + 3);

    for code in 0..=127u8 {
        if db.lookup(code).is_some() {
            continue;
        }
        let song = *patch.song();
        let player = *patch.player();
        let parameters = *patch.parameters();
        let (locked, performing, tempo_set) = (
            patch.mode().locked(),
            patch.mode().performing(),
            patch.mode().tempo_set(),
        );

        let sent = cc(&mut patch, code, 127);

        assert!(sent.is_empty(), "cc {} lit something", code);
        assert_eq!(patch.diagnostics().last, Decision::Unrecognized { cc: code });
        assert_eq!(*patch.song(), song);
        assert_eq!(*patch.player(), player);
        assert_eq!(*patch.parameters(), parameters);
        assert_eq!(patch.mode().locked(), locked);
        assert_eq!(patch.mode().performing(), performing);
        assert_eq!(patch.mode().tempo_set(), tempo_set);
    }
}

#[test]
fn test_step_stays_inside_live_loop() {
    let mut seed: u32 = 0x2545_f491;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        seed
    };

    for live in 1..=8u8 {
        let mut patch = patch_with(&config(1000, 10));
        cc(&mut patch, SHIFT, 127);
        press(&mut patch, 64 + live - 1);
        cc(&mut patch, SHIFT, 0);
        assert_eq!(patch.song().steps_live, live);

        for _ in 0..200 {
            match next() % 3 {
                0 => press(&mut patch, 64 + (next() % 8) as u8),
                1 => press(&mut patch, FF),
                _ => press(&mut patch, REW),
            }
            assert!(patch.player().step_at < live as usize);
        }
    }
}

#[test]
fn test_unchanged_state_sends_no_lights() {
    let mut patch = patch_with(&config(1000, 10));
    press(&mut patch, 32 + 1);

    assert!(cc(&mut patch, 120, 1).is_empty());
    assert!(block(&mut patch, 10).is_empty());
    assert!(block(&mut patch, 10).is_empty());
}

#[test]
fn test_tempo_chord_sets_rounded_period() {
    let config = config(48_000, 64);
    let mut patch = patch_with(&config);
    cc(&mut patch, SHIFT, 127);
    cc(&mut patch, FF, 127);
    assert!(patch.mode().tempo_set());

    cc(&mut patch, 7, 96);

    let seconds = 240.0 / (96.0 / 128.0 + 65.0 * 1.0 / 128.0 / 128.0);
    let samples = (seconds * 48_000.0f64).ceil() as u64;
    let expected = samples.div_ceil(64) * 64;
    assert_eq!(patch.song().period as u64, expected);
    assert_eq!(patch.song().period % 64, 0);
    assert_eq!(
        patch.diagnostics().last,
        Decision::TempoSet {
            period: expected as u32
        }
    );
    // The tempo lane's stored step values are untouched
    assert_eq!(patch.song().steps[0].lanes[7].slider, 0);
}

#[test]
fn test_tempo_period_never_below_one_block() {
    let mut config = config(48_000, 64);
    config.surface.knob_mag = 1.0e9;
    let mut patch = patch_with(&config);
    cc(&mut patch, SHIFT, 127);
    cc(&mut patch, FF, 127);
    cc(&mut patch, 23, 127);
    assert_eq!(patch.song().period, 64);
}

#[test]
fn test_slider_writes_song_and_output() {
    let mut patch = patch_with(&config(1000, 10));
    cc(&mut patch, 0, 100);

    assert_eq!(patch.song().steps[0].lanes[0].slider, 100);
    let expected = 100.0 / 127.0;
    assert!((patch.parameters()[0] - expected).abs() < 1e-6);
}

#[test]
fn test_enabled_lane_captured_on_step_boundary() {
    let mut patch = patch_with(&config(1000, 10));
    cc(&mut patch, 2, 77);
    cc(&mut patch, 16 + 2, 30);
    press(&mut patch, 32 + 2);
    assert!(patch.mode().write_enabled(2));

    press(&mut patch, PLAY);
    assert_eq!(patch.player().transport, Transport::Playing);

    let period_blocks = patch.song().period / 10;
    for _ in 0..period_blocks {
        block(&mut patch, 10);
    }

    assert_eq!(patch.player().step_at, 1);
    let lane = patch.song().steps[1].lanes[2];
    assert_eq!((lane.slider, lane.knob), (77, 30));
    assert_eq!(patch.parameters()[8], 1.0);
    assert_eq!(patch.diagnostics().steps_advanced, 1);
}

#[test]
fn test_locked_lanes_ignore_moves_until_enabled() {
    let mut patch = patch_with(&config(1000, 10));
    cc(&mut patch, SHIFT, 127);
    press(&mut patch, REW);
    cc(&mut patch, SHIFT, 0);
    assert!(patch.mode().locked());

    cc(&mut patch, 5, 90);
    assert_eq!(patch.song().steps[0].lanes[5].slider, 0);

    press(&mut patch, 32 + 5);
    cc(&mut patch, 5, 91);
    assert_eq!(patch.song().steps[0].lanes[5].slider, 91);
}

fn stopped_view(mode: &ModeState) -> LightView<'_> {
    LightView {
        step_at: 0,
        steps_live: 8,
        transport: Transport::Stopped,
        mode,
    }
}

#[test]
fn test_ready_twice_keeps_baseline() {
    let db = ControlDatabase::new();
    let mut mode = ModeState::new();
    let mut lights = LightSync::new(0);
    let mut sent: Vec<[u8; 3]> = Vec::new();

    lights.update(&stopped_view(&mode), &db, &mut sent);
    sent.clear();

    lights.invalidate();
    lights.ready();
    lights.ready();
    mode.toggle_lock();

    assert_eq!(lights.update(&stopped_view(&mode), &db, &mut sent), 1);
    assert_eq!(sent, vec![[0xB0, REW, 127]]);
}

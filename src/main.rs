use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::RecvTimeoutError;

use kontrol_seq::audio::{self, AudioOutput};
use kontrol_seq::midi::{ChannelSink, MidiInputDevice, MidiOutputDevice};
use kontrol_seq::store::MemorySongStore;
use kontrol_seq::{Config, SequencerPatch};

const MIDI_QUEUE: usize = 1024;
const LIGHT_QUEUE: usize = 256;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref());

    let (device, stream_config) = audio::default_output().context("opening audio output")?;
    config.timing.sample_rate = stream_config.sample_rate.0;

    let (midi_tx, midi_rx) = crossbeam_channel::bounded(MIDI_QUEUE);
    let mut input = MidiInputDevice::new();
    if let Err(e) = input.connect_matching(&config.surface.input_port, midi_tx) {
        for port in MidiInputDevice::available_ports() {
            log::info!(target: "midi", "available input {}: {}", port.index, port.name);
        }
        return Err(e).context("opening control surface input");
    }

    let (light_tx, light_rx) = crossbeam_channel::bounded::<[u8; 3]>(LIGHT_QUEUE);
    let mut output = MidiOutputDevice::new();
    if let Err(e) = output.connect_matching(&config.surface.output_port) {
        log::warn!(target: "midi", "lights disabled: {}", e);
        for port in MidiOutputDevice::available_ports() {
            log::info!(target: "midi", "available output {}: {}", port.index, port.name);
        }
    }
    let writer = std::thread::spawn(move || {
        for message in light_rx.iter() {
            if let Err(e) = output.send(&message) {
                log::warn!(target: "midi", "{}", e);
            }
        }
        output.disconnect();
    });

    let mut sink = ChannelSink::new(light_tx);
    let mut patch = SequencerPatch::new(&config, MemorySongStore::new());
    patch.start(&mut sink);
    let status = Arc::new(Mutex::new(patch.status()));

    let stream = AudioOutput::start(
        &device,
        &stream_config,
        patch,
        midi_rx,
        sink,
        config.timing.block_size as usize,
        Arc::clone(&status),
    )
    .context("starting audio")?;

    let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() {
                break;
            }
        }
        let _ = quit_tx.send(());
    });

    log::info!("running; close stdin (Ctrl-D) to quit");
    loop {
        match quit_rx.recv_timeout(Duration::from_secs(1)) {
            Err(RecvTimeoutError::Timeout) => {
                let s = match status.lock() {
                    Ok(guard) => *guard,
                    Err(poisoned) => *poisoned.into_inner(),
                };
                log::info!(
                    "step {}/{} {:?} period {} tempo_set {} locked {} performing {} last {:?}",
                    s.step_at + 1,
                    s.steps_live,
                    s.transport,
                    s.period,
                    s.tempo_set,
                    s.locked,
                    s.performing,
                    s.last
                );
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Dropping the stream drops the patch and its light sender, which
    // ends the writer thread.
    drop(stream);
    input.disconnect();
    let _ = writer.join();
    log::info!("stopped");
    Ok(())
}

/// kontrol-seq - an 8-step, 8-lane step sequencer played from a Korg
/// nanoKONTROL2 control surface
///
/// The core is real-time safe: `SequencerPatch` takes one MIDI message or
/// one audio block per call, never allocates or blocks, and reports what
/// it did through `Diagnostics` instead of logging.
/// - `control`: the surface's CC table and lookup
/// - `sequencer`: song data, mode overlay, step clock and output mapping
/// - `lights`: LED frame composition and diff sync
/// - `midi` / `audio`: device plumbing for the host binary

pub mod audio;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod lights;
pub mod midi;
pub mod patch;
pub mod sequencer;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use control::ControlDatabase;
pub use diagnostics::{Decision, Diagnostics};
pub use error::{Error, Result};
pub use midi::{MidiMessage, MidiSink};
pub use patch::{PatchStatus, SequencerPatch};
pub use sequencer::{Lane, Sequencer, Song, Step, Transport};
pub use store::{MemorySongStore, SongStore};

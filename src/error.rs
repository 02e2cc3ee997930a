/// Host-side errors. The real-time patch never produces these; they come
/// from opening devices and reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create MIDI client: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("no MIDI {direction} port matching \"{pattern}\"")]
    PortNotFound {
        direction: &'static str,
        pattern: String,
    },

    #[error("failed to connect MIDI port: {0}")]
    Connect(String),

    #[error("failed to send MIDI: {0}")]
    Send(#[from] midir::SendError),

    #[error("no default audio output device")]
    NoOutputDevice,

    #[error("no default output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("block size {size} is outside 1..={max}")]
    BlockSize { size: usize, max: usize },

    #[error("unsupported sample format {0:?} (only f32 is supported)")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Audio output using cpal - drives the patch from the device callback
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::midi::{ChannelSink, MidiMessage, MidiSink};
use crate::patch::{PatchStatus, SequencerPatch};
use crate::store::SongStore;

/// Largest block size the host accepts
pub const MAX_BLOCK: usize = 512;

/// Default output device and its stream config. Only f32 output is
/// supported.
pub fn default_output() -> Result<(cpal::Device, cpal::StreamConfig)> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
    let supported = device.default_output_config()?;
    match supported.sample_format() {
        cpal::SampleFormat::F32 => Ok((device, supported.into())),
        other => Err(Error::UnsupportedFormat(other)),
    }
}

/// Re-slices device buffers of any length into fixed `block_size` blocks.
///
/// The patch always sees whole blocks; frames of a rendered block that
/// don't fit the current device buffer are played out at the start of the
/// next one.
pub struct BlockFramer {
    left: [f32; MAX_BLOCK],
    right: [f32; MAX_BLOCK],
    block: usize,
    pos: usize,
}

impl BlockFramer {
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size > MAX_BLOCK {
            return Err(Error::BlockSize {
                size: block_size,
                max: MAX_BLOCK,
            });
        }
        Ok(Self {
            left: [0.0; MAX_BLOCK],
            right: [0.0; MAX_BLOCK],
            block: block_size,
            pos: block_size,
        })
    }

    /// Fill an interleaved buffer. The click track goes to the first two
    /// channels and the rest stay silent.
    pub fn fill<S: SongStore>(
        &mut self,
        data: &mut [f32],
        channels: usize,
        patch: &mut SequencerPatch<S>,
        sink: &mut impl MidiSink,
    ) {
        let block = self.block;
        for frame in data.chunks_mut(channels.max(1)) {
            if self.pos == block {
                patch.process_audio(&mut self.left[..block], &mut self.right[..block], sink);
                self.pos = 0;
            }
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = match c {
                    0 => self.left[self.pos],
                    1 => self.right[self.pos],
                    _ => 0.0,
                };
            }
            self.pos += 1;
        }
    }
}

pub struct AudioOutput {
    _stream: cpal::Stream,
}

impl AudioOutput {
    /// Build and start the stream. The callback drains pending MIDI, then
    /// runs the patch one fixed block at a time.
    pub fn start<S>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut patch: SequencerPatch<S>,
        midi_rx: Receiver<MidiMessage>,
        mut sink: ChannelSink,
        block_size: usize,
        status: Arc<Mutex<PatchStatus>>,
    ) -> Result<Self>
    where
        S: SongStore + Send + 'static,
    {
        let channels = (config.channels as usize).max(1);
        let mut framer = BlockFramer::new(block_size)?;

        let stream = device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(message) = midi_rx.try_recv() {
                    patch.process_midi(message, &mut sink);
                }

                framer.fill(data, channels, &mut patch, &mut sink);

                if let Ok(mut shared) = status.try_lock() {
                    *shared = patch.status();
                }
            },
            |err| log::error!(target: "audio", "output stream error: {}", err),
            None,
        )?;
        stream.play()?;

        log::info!(
            target: "audio",
            "output running: {} Hz, {} channels, {} frame blocks",
            config.sample_rate.0,
            channels,
            block_size
        );
        Ok(Self { _stream: stream })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sequencer::clock::Timing;
    use crate::store::MemorySongStore;

    fn patch() -> SequencerPatch {
        let mut config = Config::default();
        config.timing = Timing {
            sample_rate: 1000,
            block_size: 10,
        };
        SequencerPatch::new(&config, MemorySongStore::new())
    }

    #[test]
    fn test_block_size_bounds() {
        assert!(BlockFramer::new(0).is_err());
        assert!(BlockFramer::new(MAX_BLOCK + 1).is_err());
        assert!(BlockFramer::new(MAX_BLOCK).is_ok());
    }

    #[test]
    fn test_uneven_buffers_run_whole_blocks() {
        let mut patch = patch();
        let mut framer = BlockFramer::new(10).unwrap();
        let mut sink: Vec<[u8; 3]> = Vec::new();

        // 7 stereo frames per callback, 70 frames in total
        for _ in 0..10 {
            let mut data = [0.0f32; 14];
            framer.fill(&mut data, 2, &mut patch, &mut sink);
        }
        assert_eq!(patch.diagnostics().blocks, 7);

        let mut data = [0.0f32; 2];
        framer.fill(&mut data, 2, &mut patch, &mut sink);
        assert_eq!(patch.diagnostics().blocks, 8);
    }

    #[test]
    fn test_click_lands_on_first_two_channels() {
        let mut patch = patch();
        let mut framer = BlockFramer::new(10).unwrap();
        let mut sink: Vec<[u8; 3]> = Vec::new();
        patch.process_midi(
            MidiMessage::ControlChange { channel: 0, controller: 41, value: 127 },
            &mut sink,
        );

        let mut data = [9.0f32; 12];
        framer.fill(&mut data, 3, &mut patch, &mut sink);
        assert_eq!(&data[0..3], &[1.0, 1.0, 0.0]);
        assert!(data.iter().skip(2).step_by(3).all(|&s| s == 0.0));
    }
}

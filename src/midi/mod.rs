/// MIDI plumbing - message decoding, the outbound sink seam and the
/// midir-backed connections to the control surface
use crossbeam_channel::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::error::{Error, Result};

pub const CONTROL_CHANGE: u8 = 0xB0;
pub const LIGHT_ON: u8 = 127;
pub const LIGHT_OFF: u8 = 0;

const CLIENT_NAME: &str = "kontrol-seq";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Anything that is not a control change; the sequencer ignores it
    Other { status: u8 },
}

impl MidiMessage {
    /// Decode one raw message. Truncated messages and data bytes with the
    /// high bit set decode to `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if status & 0x80 == 0 {
            return None;
        }
        if status & 0xF0 != CONTROL_CHANGE {
            return Some(MidiMessage::Other { status });
        }
        match data {
            [controller, value, ..] if controller & 0x80 == 0 && value & 0x80 == 0 => {
                Some(MidiMessage::ControlChange {
                    channel: status & 0x0F,
                    controller: *controller,
                    value: *value,
                })
            }
            _ => None,
        }
    }
}

pub fn control_change(channel: u8, controller: u8, value: u8) -> [u8; 3] {
    [CONTROL_CHANGE | (channel & 0x0F), controller & 0x7F, value & 0x7F]
}

/// Where the patch writes outbound messages from inside its callbacks.
/// Implementations must not block.
pub trait MidiSink {
    fn send(&mut self, message: [u8; 3]);
}

impl MidiSink for Vec<[u8; 3]> {
    fn send(&mut self, message: [u8; 3]) {
        self.push(message);
    }
}

/// Hands messages to the writer thread over a bounded channel.
/// A full channel drops the message rather than stalling the audio thread.
pub struct ChannelSink {
    tx: Sender<[u8; 3]>,
}

impl ChannelSink {
    pub fn new(tx: Sender<[u8; 3]>) -> Self {
        Self { tx }
    }
}

impl MidiSink for ChannelSink {
    fn send(&mut self, message: [u8; 3]) {
        let _ = self.tx.try_send(message);
    }
}

/// Information about an available MIDI port
#[derive(Debug, Clone)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

pub struct MidiInputDevice {
    connection: Option<MidiInputConnection<()>>,
}

impl MidiInputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
        }
    }

    pub fn available_ports() -> Vec<MidiPortInfo> {
        match MidiInput::new(CLIENT_NAME) {
            Ok(midi_in) => midi_in
                .ports()
                .iter()
                .enumerate()
                .filter_map(|(index, p)| {
                    midi_in.port_name(p).ok().map(|name| MidiPortInfo { index, name })
                })
                .collect(),
            Err(_) => vec![],
        }
    }

    /// Connect to the first input port whose name contains `pattern` and
    /// forward decoded messages into `tx`.
    pub fn connect_matching(&mut self, pattern: &str, tx: Sender<MidiMessage>) -> Result<()> {
        let mut midi_in = MidiInput::new(CLIENT_NAME)?;
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let (port, name) = ports
            .iter()
            .find_map(|p| {
                let name = midi_in.port_name(p).ok()?;
                name.contains(pattern).then_some((p.clone(), name))
            })
            .ok_or_else(|| Error::PortNotFound {
                direction: "input",
                pattern: pattern.to_string(),
            })?;

        let connection = midi_in
            .connect(
                &port,
                "kontrol-seq-in",
                move |_stamp, bytes, _| {
                    if let Some(message) = MidiMessage::parse(bytes) {
                        let _ = tx.try_send(message);
                    }
                },
                (),
            )
            .map_err(|e| Error::Connect(e.to_string()))?;

        log::info!(target: "midi", "listening on input \"{}\"", name);
        self.connection = Some(connection);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Default for MidiInputDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self { connection: None }
    }

    pub fn available_ports() -> Vec<MidiPortInfo> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .enumerate()
                .filter_map(|(index, p)| {
                    midi_out.port_name(p).ok().map(|name| MidiPortInfo { index, name })
                })
                .collect(),
            Err(_) => vec![],
        }
    }

    pub fn connect_matching(&mut self, pattern: &str) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;

        let ports = midi_out.ports();
        let (port, name) = ports
            .iter()
            .find_map(|p| {
                let name = midi_out.port_name(p).ok()?;
                name.contains(pattern).then_some((p.clone(), name))
            })
            .ok_or_else(|| Error::PortNotFound {
                direction: "output",
                pattern: pattern.to_string(),
            })?;

        let connection = midi_out
            .connect(&port, "kontrol-seq-out")
            .map_err(|e| Error::Connect(e.to_string()))?;

        log::info!(target: "midi", "sending lights to \"{}\"", name);
        self.connection = Some(connection);
        Ok(())
    }

    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(message)?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_change() {
        assert_eq!(
            MidiMessage::parse(&[0xB0, 7, 100]),
            Some(MidiMessage::ControlChange { channel: 0, controller: 7, value: 100 })
        );
        assert_eq!(
            MidiMessage::parse(&[0xB3, 41, 127]),
            Some(MidiMessage::ControlChange { channel: 3, controller: 41, value: 127 })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0xB0, 0x87, 1]), None);
        assert_eq!(MidiMessage::parse(&[0x07, 1, 1]), None);
        assert_eq!(MidiMessage::parse(&[0x90, 60, 100]), Some(MidiMessage::Other { status: 0x90 }));
    }

    #[test]
    fn test_control_change_bytes() {
        assert_eq!(control_change(0, 41, LIGHT_ON), [0xB0, 41, 127]);
        assert_eq!(control_change(17, 200, 255), [0xB1, 72, 127]);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(tx);
        sink.send([0xB0, 1, 127]);
        sink.send([0xB0, 2, 127]);
        assert_eq!(rx.try_iter().count(), 1);
    }
}

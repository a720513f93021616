//! USB-MIDI event packets
//!
//! A USB MIDI streaming endpoint carries 4-byte event packets: a header byte
//! holding the virtual cable number and a code index number (CIN), followed by
//! up to three MIDI bytes. These helpers convert between packets and the plain
//! byte stream the framer and merger work on.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::midi::{
    is_realtime, MidiMessage, SONG_POSITION, SONG_SELECT, TC_QUARTER_FRAME, TUNE_REQUEST,
};
use crate::transport::{InputTransport, MessageSink, OutputTransport, TransportError};

pub const PACKET_SIZE: usize = 4;

/// Code index numbers used by the packetizer
pub mod cin {
    pub const SYSTEM_COMMON_2: u8 = 0x2;
    pub const SYSTEM_COMMON_3: u8 = 0x3;
    pub const SYSEX_CONTINUE: u8 = 0x4;
    /// Single-byte system common, or SysEx ending with one byte
    pub const SYSEX_END_1: u8 = 0x5;
    pub const SYSEX_END_2: u8 = 0x6;
    pub const SYSEX_END_3: u8 = 0x7;
    pub const SINGLE_BYTE: u8 = 0xF;
}

/// One 4-byte USB-MIDI event packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbMidiPacket {
    pub cable: u8,
    pub code_index: u8,
    pub data: [u8; 3],
}

impl UsbMidiPacket {
    pub fn from_bytes(raw: [u8; PACKET_SIZE]) -> Self {
        Self {
            cable: raw[0] >> 4,
            code_index: raw[0] & 0x0F,
            data: [raw[1], raw[2], raw[3]],
        }
    }

    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        [
            ((self.cable & 0x0F) << 4) | (self.code_index & 0x0F),
            self.data[0],
            self.data[1],
            self.data[2],
        ]
    }

    /// Number of meaningful MIDI bytes for a code index
    pub fn payload_len(code_index: u8) -> usize {
        match code_index & 0x0F {
            // miscellaneous and cable events are reserved
            0x0 | 0x1 => 0,
            0x2 | 0x6 | 0xC | 0xD => 2,
            0x5 | 0xF => 1,
            _ => 3,
        }
    }

    /// MIDI bytes carried by this packet
    pub fn midi_bytes(&self) -> &[u8] {
        &self.data[..Self::payload_len(self.code_index)]
    }
}

/// Code index for a message starting with `status` (not for SysEx)
pub fn code_index_for(status: u8) -> u8 {
    if is_realtime(status) {
        return cin::SINGLE_BYTE;
    }
    match status {
        0x80..=0xEF => status >> 4,
        TC_QUARTER_FRAME | SONG_SELECT => cin::SYSTEM_COMMON_2,
        SONG_POSITION => cin::SYSTEM_COMMON_3,
        TUNE_REQUEST => cin::SYSEX_END_1,
        _ => cin::SINGLE_BYTE,
    }
}

/// Split a message into event packets for one virtual cable
pub fn packetize(cable: u8, message: &MidiMessage) -> Vec<UsbMidiPacket> {
    let bytes = message.encode();

    if let MidiMessage::SysEx(_) = message {
        let chunk_count = bytes.chunks(3).count();
        return bytes
            .chunks(3)
            .enumerate()
            .map(|(i, chunk)| {
                let code_index = if i + 1 < chunk_count {
                    cin::SYSEX_CONTINUE
                } else {
                    match chunk.len() {
                        1 => cin::SYSEX_END_1,
                        2 => cin::SYSEX_END_2,
                        _ => cin::SYSEX_END_3,
                    }
                };
                let mut data = [0; 3];
                data[..chunk.len()].copy_from_slice(chunk);
                UsbMidiPacket { cable, code_index, data }
            })
            .collect();
    }

    let mut data = [0; 3];
    let len = bytes.len().min(3);
    data[..len].copy_from_slice(&bytes[..len]);
    vec![UsbMidiPacket {
        cable,
        code_index: code_index_for(message.status_byte()),
        data,
    }]
}

/// Turns a stream of event packets into MIDI bytes
///
/// Packets split across reads are held until complete. With a cable filter
/// set, packets for other cables are dropped.
pub struct UsbPacketInput<T> {
    inner: T,
    pending: BytesMut,
    cable: Option<u8>,
}

impl<T: InputTransport> UsbPacketInput<T> {
    pub fn new(inner: T, cable: Option<u8>) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(PACKET_SIZE * 16),
            cable,
        }
    }
}

impl<T: InputTransport> InputTransport for UsbPacketInput<T> {
    fn poll_received_bytes(&mut self) -> Bytes {
        let received = self.inner.poll_received_bytes();
        self.pending.extend_from_slice(&received);

        let mut out = BytesMut::new();
        while self.pending.len() >= PACKET_SIZE {
            let raw = self.pending.split_to(PACKET_SIZE);
            let packet = UsbMidiPacket::from_bytes([raw[0], raw[1], raw[2], raw[3]]);
            if self.cable.is_some_and(|cable| cable != packet.cable) {
                trace!("Packet for cable {} skipped", packet.cable);
                continue;
            }
            out.extend_from_slice(packet.midi_bytes());
        }
        out.freeze()
    }
}

/// Writes whole messages as event packets
pub struct UsbPacketSink<T> {
    inner: T,
    cable: u8,
}

impl<T: OutputTransport> UsbPacketSink<T> {
    pub fn new(inner: T, cable: u8) -> Self {
        Self { inner, cable }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: OutputTransport> MessageSink for UsbPacketSink<T> {
    fn send_message(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        let packets = packetize(self.cable, message);
        let mut raw = Vec::with_capacity(packets.len() * PACKET_SIZE);
        for packet in &packets {
            raw.extend_from_slice(&packet.to_bytes());
        }
        self.inner.send(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{Framer, FramerConfig};
    use crate::midi::{RealtimeKind, SysEx};
    use crate::transport::{MemoryOutput, Reframed, ScriptedInput};

    #[test]
    fn test_note_on_packet() {
        let packets = packetize(1, &MidiMessage::note_on(2, 0x40, 0x64));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].to_bytes(), [0x19, 0x92, 0x40, 0x64]);
        assert_eq!(packets[0].midi_bytes(), &[0x92, 0x40, 0x64]);
    }

    #[test]
    fn test_short_messages_use_matching_cin() {
        let pc = packetize(0, &MidiMessage::program_change(0, 5));
        assert_eq!(pc[0].to_bytes(), [0x0C, 0xC0, 0x05, 0x00]);
        assert_eq!(pc[0].midi_bytes(), &[0xC0, 0x05]);

        let clock = packetize(0, &MidiMessage::Realtime(RealtimeKind::Clock));
        assert_eq!(clock[0].to_bytes(), [0x0F, 0xF8, 0, 0]);

        let tune = packetize(0, &MidiMessage::TuneRequest);
        assert_eq!(tune[0].code_index, cin::SYSEX_END_1);

        let spp = packetize(0, &MidiMessage::song_position(1));
        assert_eq!(spp[0].code_index, cin::SYSTEM_COMMON_3);
    }

    #[test]
    fn test_sysex_chunking() {
        let msg = MidiMessage::SysEx(SysEx::from_payload(&[1, 2, 3, 4]));
        let packets = packetize(0, &msg);
        // F0 01 02 | 03 04 F7
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].code_index, cin::SYSEX_CONTINUE);
        assert_eq!(packets[1].code_index, cin::SYSEX_END_3);

        let msg = MidiMessage::SysEx(SysEx::from_payload(&[1, 2]));
        let packets = packetize(0, &msg);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].code_index, cin::SYSEX_END_1);
        assert_eq!(packets[1].midi_bytes(), &[0xF7]);

        let msg = MidiMessage::SysEx(SysEx::from_payload(&[1, 2, 3]));
        let packets = packetize(0, &msg);
        assert_eq!(packets[1].code_index, cin::SYSEX_END_2);
    }

    #[test]
    fn test_packet_input_reassembles_split_reads() {
        let script = ScriptedInput::new();
        script.push(vec![0x09u8, 0x90, 0x40]);
        script.push(vec![0x64u8, 0x0F, 0xF8, 0x00, 0x00]);
        let mut input = UsbPacketInput::new(script, None);

        assert!(input.poll_received_bytes().is_empty());
        assert_eq!(&input.poll_received_bytes()[..], &[0x90, 0x40, 0x64, 0xF8]);
    }

    #[test]
    fn test_packet_input_cable_filter() {
        let script = ScriptedInput::new();
        script.push(vec![0x19u8, 0x91, 0x01, 0x02, 0x09, 0x90, 0x03, 0x04]);
        let mut input = UsbPacketInput::new(script, Some(0));
        assert_eq!(&input.poll_received_bytes()[..], &[0x90, 0x03, 0x04]);
    }

    #[test]
    fn test_packet_sink_round_trip() {
        let wire = MemoryOutput::new();
        let mut out = Reframed::new(UsbPacketSink::new(wire.clone(), 0), FramerConfig::default());
        let stream = [0xF0, 0x7D, 0x01, 0x02, 0x03, 0xF7, 0xB0, 0x07, 0x7F];
        out.send(&stream).unwrap();

        let script = ScriptedInput::new();
        script.push(wire.contents());
        let mut input = UsbPacketInput::new(script, None);
        let bytes = input.poll_received_bytes();
        assert_eq!(&bytes[..], &stream[..]);

        let mut framer = Framer::default();
        assert_eq!(framer.feed_slice(&bytes).len(), 2);
    }
}

//! MIDI wire constants and message types
//!
//! Provides byte classification, the typed message produced by the framer,
//! encoding back to wire bytes, and value conversions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SYSEX_BEGIN: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Any byte with this bit set is a status byte
pub const STATUS_MASK: u8 = 0x80;

/// Low nibble of a channel status byte
pub const CHANNEL_MASK: u8 = 0x0F;

pub const DATA_MASK: u8 = 0x7F;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const AFTERTOUCH: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

pub const TC_QUARTER_FRAME: u8 = 0xF1;
pub const SONG_POSITION: u8 = 0xF2;
pub const SONG_SELECT: u8 = 0xF3;
pub const TUNE_REQUEST: u8 = 0xF6;

/// First realtime byte; everything from here to 0xFF is a one-byte message
pub const REALTIME_MIN: u8 = 0xF8;

/// Check whether a byte is a status byte (high bit set)
#[inline]
pub fn is_status_byte(byte: u8) -> bool {
    byte & STATUS_MASK != 0
}

/// Check whether a byte is a realtime byte (0xF8..=0xFF)
#[inline]
pub fn is_realtime(byte: u8) -> bool {
    byte >= REALTIME_MIN
}

/// Check whether a byte is a channel voice status (0x80..=0xEF)
#[inline]
pub fn is_channel_status(byte: u8) -> bool {
    (0x80..0xF0).contains(&byte)
}

/// Wire length of a message, derived from its status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLength {
    One,
    Two,
    Three,
    /// SysEx delimiters, undefined system common, or not a status byte
    Undefined,
}

impl PacketLength {
    /// Number of bytes including the status byte, if fixed
    pub fn bytes(self) -> Option<usize> {
        match self {
            PacketLength::One => Some(1),
            PacketLength::Two => Some(2),
            PacketLength::Three => Some(3),
            PacketLength::Undefined => None,
        }
    }
}

/// Classify a status byte by message length
pub fn packet_length(status: u8) -> PacketLength {
    if !is_status_byte(status) {
        return PacketLength::Undefined;
    }
    if is_realtime(status) {
        return PacketLength::One;
    }

    match status & 0xF0 {
        NOTE_OFF | NOTE_ON | AFTERTOUCH | CONTROL_CHANGE | PITCH_BEND => PacketLength::Three,
        PROGRAM_CHANGE | CHANNEL_PRESSURE => PacketLength::Two,
        _ => match status {
            TC_QUARTER_FRAME | SONG_SELECT => PacketLength::Two,
            SONG_POSITION => PacketLength::Three,
            TUNE_REQUEST => PacketLength::One,
            _ => PacketLength::Undefined,
        },
    }
}

/// Single-byte realtime messages (0xF8..=0xFF)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeKind {
    Clock,
    Tick,
    Start,
    Continue,
    Stop,
    /// 0xFD, undefined by MIDI 1.0 but still passed through
    Reserved,
    ActiveSense,
    Reset,
}

impl RealtimeKind {
    /// Map a realtime byte to its kind, `None` for anything below 0xF8
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xF8 => RealtimeKind::Clock,
            0xF9 => RealtimeKind::Tick,
            0xFA => RealtimeKind::Start,
            0xFB => RealtimeKind::Continue,
            0xFC => RealtimeKind::Stop,
            0xFD => RealtimeKind::Reserved,
            0xFE => RealtimeKind::ActiveSense,
            0xFF => RealtimeKind::Reset,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        match self {
            RealtimeKind::Clock => 0xF8,
            RealtimeKind::Tick => 0xF9,
            RealtimeKind::Start => 0xFA,
            RealtimeKind::Continue => 0xFB,
            RealtimeKind::Stop => 0xFC,
            RealtimeKind::Reserved => 0xFD,
            RealtimeKind::ActiveSense => 0xFE,
            RealtimeKind::Reset => 0xFF,
        }
    }
}

/// Captured system exclusive run
///
/// `data` always starts with 0xF0 and ends with 0xF7. When the run was longer
/// than the framer's capture limit the middle is cut and `truncated` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SysEx {
    pub data: Bytes,
    pub truncated: bool,
}

impl SysEx {
    /// Build a complete run from a payload without delimiters
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 2);
        data.push(SYSEX_BEGIN);
        data.extend(payload.iter().map(|b| b & DATA_MASK));
        data.push(SYSEX_END);
        Self {
            data: Bytes::from(data),
            truncated: false,
        }
    }

    /// Payload between the delimiters
    pub fn payload(&self) -> &[u8] {
        let len = self.data.len();
        if len < 2 {
            return &[];
        }
        &self.data[1..len - 1]
    }
}

/// Message kinds, used as dispatch keys and route filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    Aftertouch,
    SongPosition,
    SongSelect,
    TimeCodeQuarterFrame,
    TuneRequest,
    Realtime,
    SysExBoundary,
}

/// A complete MIDI message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    ///
    /// Velocity 0 is kept as a Note On so the bytes re-encode unchanged.
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic key pressure: channel (0-15), note (0-127), pressure (0-127)
    Aftertouch { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), controller (0-127), value (0-127)
    ControlChange { channel: u8, controller: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit, center 8192)
    PitchBend { channel: u8, value: u16 },

    /// MIDI Time Code Quarter Frame
    TimeCodeQuarterFrame { data: u8 },

    /// Song Position Pointer (14-bit)
    SongPosition { position: u16 },

    SongSelect { song: u8 },

    TuneRequest,

    Realtime(RealtimeKind),

    /// System exclusive run, both delimiters included
    SysEx(SysEx),
}

impl MidiMessage {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOn {
            channel: channel & CHANNEL_MASK,
            note: note & DATA_MASK,
            velocity: velocity & DATA_MASK,
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOff {
            channel: channel & CHANNEL_MASK,
            note: note & DATA_MASK,
            velocity: velocity & DATA_MASK,
        }
    }

    pub fn aftertouch(channel: u8, note: u8, pressure: u8) -> Self {
        MidiMessage::Aftertouch {
            channel: channel & CHANNEL_MASK,
            note: note & DATA_MASK,
            pressure: pressure & DATA_MASK,
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        MidiMessage::ControlChange {
            channel: channel & CHANNEL_MASK,
            controller: controller & DATA_MASK,
            value: value & DATA_MASK,
        }
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        MidiMessage::ProgramChange {
            channel: channel & CHANNEL_MASK,
            program: program & DATA_MASK,
        }
    }

    pub fn channel_pressure(channel: u8, pressure: u8) -> Self {
        MidiMessage::ChannelPressure {
            channel: channel & CHANNEL_MASK,
            pressure: pressure & DATA_MASK,
        }
    }

    /// Pitch bend from a signed amount, clamped to -8192..=8191
    pub fn pitch_bend_signed(channel: u8, amount: i16) -> Self {
        MidiMessage::PitchBend {
            channel: channel & CHANNEL_MASK,
            value: convert::pitch_bend_from_signed(amount),
        }
    }

    /// Song position, clamped to 14 bits
    pub fn song_position(position: u16) -> Self {
        MidiMessage::SongPosition {
            position: position.min(convert::MAX_14BIT),
        }
    }

    /// Parse a complete message from raw bytes
    ///
    /// The slice must start with a status byte and contain the whole message;
    /// running status is not resolved here.
    pub fn from_packet(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        if !is_status_byte(status) {
            return None;
        }

        if let Some(kind) = RealtimeKind::from_byte(status) {
            return Some(MidiMessage::Realtime(kind));
        }

        if status == SYSEX_BEGIN {
            let end = data.iter().position(|&b| b == SYSEX_END)?;
            return Some(MidiMessage::SysEx(SysEx {
                data: Bytes::copy_from_slice(&data[..=end]),
                truncated: false,
            }));
        }

        let needed = packet_length(status).bytes()?;
        if data.len() < needed {
            return None;
        }
        let d1 = data.get(1).map_or(0, |b| b & DATA_MASK);
        let d2 = data.get(2).map_or(0, |b| b & DATA_MASK);
        let channel = status & CHANNEL_MASK;

        let message = match status & 0xF0 {
            NOTE_OFF => MidiMessage::NoteOff { channel, note: d1, velocity: d2 },
            NOTE_ON => MidiMessage::NoteOn { channel, note: d1, velocity: d2 },
            AFTERTOUCH => MidiMessage::Aftertouch { channel, note: d1, pressure: d2 },
            CONTROL_CHANGE => MidiMessage::ControlChange {
                channel,
                controller: d1,
                value: d2,
            },
            PROGRAM_CHANGE => MidiMessage::ProgramChange { channel, program: d1 },
            CHANNEL_PRESSURE => MidiMessage::ChannelPressure { channel, pressure: d1 },
            PITCH_BEND => MidiMessage::PitchBend {
                channel,
                value: convert::join_14bit(d1, d2),
            },
            _ => match status {
                TC_QUARTER_FRAME => MidiMessage::TimeCodeQuarterFrame { data: d1 },
                SONG_POSITION => MidiMessage::SongPosition {
                    position: convert::join_14bit(d1, d2),
                },
                SONG_SELECT => MidiMessage::SongSelect { song: d1 },
                TUNE_REQUEST => MidiMessage::TuneRequest,
                _ => return None,
            },
        };

        Some(message)
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![NOTE_OFF | (channel & CHANNEL_MASK), note & DATA_MASK, velocity & DATA_MASK]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![NOTE_ON | (channel & CHANNEL_MASK), note & DATA_MASK, velocity & DATA_MASK]
            }
            MidiMessage::Aftertouch { channel, note, pressure } => {
                vec![AFTERTOUCH | (channel & CHANNEL_MASK), note & DATA_MASK, pressure & DATA_MASK]
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                vec![
                    CONTROL_CHANGE | (channel & CHANNEL_MASK),
                    controller & DATA_MASK,
                    value & DATA_MASK,
                ]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![PROGRAM_CHANGE | (channel & CHANNEL_MASK), program & DATA_MASK]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![CHANNEL_PRESSURE | (channel & CHANNEL_MASK), pressure & DATA_MASK]
            }
            MidiMessage::PitchBend { channel, value } => {
                let (lsb, msb) = convert::split_14bit(value);
                vec![PITCH_BEND | (channel & CHANNEL_MASK), lsb, msb]
            }
            MidiMessage::TimeCodeQuarterFrame { data } => vec![TC_QUARTER_FRAME, data & DATA_MASK],
            MidiMessage::SongPosition { position } => {
                let (lsb, msb) = convert::split_14bit(position);
                vec![SONG_POSITION, lsb, msb]
            }
            MidiMessage::SongSelect { song } => vec![SONG_SELECT, song & DATA_MASK],
            MidiMessage::TuneRequest => vec![TUNE_REQUEST],
            MidiMessage::Realtime(kind) => vec![kind.as_byte()],
            MidiMessage::SysEx(ref sysex) => sysex.data.to_vec(),
        }
    }

    /// Status byte this message starts with
    pub fn status_byte(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { channel, .. } => NOTE_OFF | (channel & CHANNEL_MASK),
            MidiMessage::NoteOn { channel, .. } => NOTE_ON | (channel & CHANNEL_MASK),
            MidiMessage::Aftertouch { channel, .. } => AFTERTOUCH | (channel & CHANNEL_MASK),
            MidiMessage::ControlChange { channel, .. } => CONTROL_CHANGE | (channel & CHANNEL_MASK),
            MidiMessage::ProgramChange { channel, .. } => PROGRAM_CHANGE | (channel & CHANNEL_MASK),
            MidiMessage::ChannelPressure { channel, .. } => {
                CHANNEL_PRESSURE | (channel & CHANNEL_MASK)
            }
            MidiMessage::PitchBend { channel, .. } => PITCH_BEND | (channel & CHANNEL_MASK),
            MidiMessage::TimeCodeQuarterFrame { .. } => TC_QUARTER_FRAME,
            MidiMessage::SongPosition { .. } => SONG_POSITION,
            MidiMessage::SongSelect { .. } => SONG_SELECT,
            MidiMessage::TuneRequest => TUNE_REQUEST,
            MidiMessage::Realtime(kind) => kind.as_byte(),
            MidiMessage::SysEx(_) => SYSEX_BEGIN,
        }
    }

    /// Number of bytes on the wire (with status byte and SysEx delimiters)
    pub fn wire_len(&self) -> usize {
        match self {
            MidiMessage::SysEx(sysex) => sysex.data.len(),
            other => packet_length(other.status_byte()).bytes().unwrap_or(1),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MidiMessage::NoteOff { .. } => MessageKind::NoteOff,
            MidiMessage::NoteOn { .. } => MessageKind::NoteOn,
            MidiMessage::Aftertouch { .. } => MessageKind::Aftertouch,
            MidiMessage::ControlChange { .. } => MessageKind::ControlChange,
            MidiMessage::ProgramChange { .. } => MessageKind::ProgramChange,
            MidiMessage::ChannelPressure { .. } => MessageKind::ChannelPressure,
            MidiMessage::PitchBend { .. } => MessageKind::PitchBend,
            MidiMessage::TimeCodeQuarterFrame { .. } => MessageKind::TimeCodeQuarterFrame,
            MidiMessage::SongPosition { .. } => MessageKind::SongPosition,
            MidiMessage::SongSelect { .. } => MessageKind::SongSelect,
            MidiMessage::TuneRequest => MessageKind::TuneRequest,
            MidiMessage::Realtime(_) => MessageKind::Realtime,
            MidiMessage::SysEx(_) => MessageKind::SysExBoundary,
        }
    }

    /// Get the channel for channel messages (0-15), None for system messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::Aftertouch { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// Check if this is a channel message
    pub fn is_channel_message(&self) -> bool {
        self.channel().is_some()
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::Aftertouch { channel, note, pressure } => {
                write!(f, "Aftertouch ch:{} n:{} p:{}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, controller, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
            MidiMessage::SysEx(ref sysex) => {
                if sysex.truncated {
                    write!(f, "SysEx {} bytes (truncated)", sysex.data.len())
                } else {
                    write!(f, "SysEx {} bytes", sysex.data.len())
                }
            }
            MidiMessage::Realtime(kind) => write!(f, "{:?}", kind),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// MIDI value conversion utilities
pub mod convert {
    use super::DATA_MASK;

    pub const MAX_14BIT: u16 = 0x3FFF;
    pub const PITCH_BEND_CENTER: u16 = 0x2000;

    /// Combine LSB and MSB data bytes into a 14-bit value
    pub fn join_14bit(lsb: u8, msb: u8) -> u16 {
        (((msb & DATA_MASK) as u16) << 7) | (lsb & DATA_MASK) as u16
    }

    /// Split a 14-bit value into (LSB, MSB) data bytes
    pub fn split_14bit(value: u16) -> (u8, u8) {
        ((value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8)
    }

    /// Signed pitch bend (-8192..=8191) to the unsigned wire value
    pub fn pitch_bend_from_signed(amount: i16) -> u16 {
        let clamped = amount.clamp(-0x2000, 0x1FFF);
        (clamped as i32 + PITCH_BEND_CENTER as i32) as u16
    }

    /// Unsigned wire pitch bend to a signed amount around center
    pub fn pitch_bend_to_signed(value: u16) -> i16 {
        (value.min(MAX_14BIT) as i32 - PITCH_BEND_CENTER as i32) as i16
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_lengths() {
        assert_eq!(packet_length(0x90), PacketLength::Three);
        assert_eq!(packet_length(0xB5), PacketLength::Three);
        assert_eq!(packet_length(0xC3), PacketLength::Two);
        assert_eq!(packet_length(0xD0), PacketLength::Two);
        assert_eq!(packet_length(0xF1), PacketLength::Two);
        assert_eq!(packet_length(0xF2), PacketLength::Three);
        assert_eq!(packet_length(0xF3), PacketLength::Two);
        assert_eq!(packet_length(0xF6), PacketLength::One);
        assert_eq!(packet_length(0xF8), PacketLength::One);
        assert_eq!(packet_length(0xF0), PacketLength::Undefined);
        assert_eq!(packet_length(0xF7), PacketLength::Undefined);
        assert_eq!(packet_length(0xF4), PacketLength::Undefined);
        assert_eq!(packet_length(0x40), PacketLength::Undefined);
    }

    #[test]
    fn test_note_on_parsing() {
        let msg = MidiMessage::from_packet(&[0x90, 60, 100]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 });
    }

    #[test]
    fn test_note_on_velocity_zero_kept() {
        let msg = MidiMessage::from_packet(&[0x90, 60, 0]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 0 });
        assert_eq!(msg.encode(), vec![0x90, 60, 0]);
    }

    #[test]
    fn test_control_change() {
        let msg = MidiMessage::from_packet(&[0xB2, 7, 100]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::ControlChange { channel: 2, controller: 7, value: 100 }
        );
        assert_eq!(msg.kind(), MessageKind::ControlChange);
        assert_eq!(msg.channel(), Some(2));
    }

    #[test]
    fn test_pitch_bend() {
        let msg = MidiMessage::from_packet(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(msg, MidiMessage::PitchBend { channel: 0, value: 8192 });
    }

    #[test]
    fn test_short_packet_rejected() {
        assert_eq!(MidiMessage::from_packet(&[0x90, 60]), None);
        assert_eq!(MidiMessage::from_packet(&[0x40, 60, 1]), None);
        assert_eq!(MidiMessage::from_packet(&[]), None);
        assert_eq!(MidiMessage::from_packet(&[0xF4]), None);
    }

    #[test]
    fn test_sysex_parsing_keeps_delimiters() {
        let msg = MidiMessage::from_packet(&[0xF0, 0x7D, 0x01, 0xF7]).unwrap();
        match &msg {
            MidiMessage::SysEx(sysex) => {
                assert_eq!(&sysex.data[..], &[0xF0, 0x7D, 0x01, 0xF7]);
                assert_eq!(sysex.payload(), &[0x7D, 0x01]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(msg.wire_len(), 4);
        assert_eq!(msg.kind(), MessageKind::SysExBoundary);
    }

    #[test]
    fn test_realtime_bytes_are_lossless() {
        for byte in 0xF8..=0xFFu8 {
            let kind = RealtimeKind::from_byte(byte).unwrap();
            assert_eq!(kind.as_byte(), byte);
        }
        assert_eq!(RealtimeKind::from_byte(0xF7), None);
    }

    #[test]
    fn test_constructors_mask_values() {
        let msg = MidiMessage::note_on(0x13, 0xC0, 0xFF);
        assert_eq!(msg.encode(), vec![0x93, 0x40, 0x7F]);

        let msg = MidiMessage::program_change(1, 200);
        assert_eq!(msg.encode(), vec![0xC1, 200 & 0x7F]);
    }

    #[test]
    fn test_encode_system_common() {
        assert_eq!(MidiMessage::song_position(0x3FFF + 5).encode(), vec![0xF2, 0x7F, 0x7F]);
        assert_eq!(MidiMessage::SongSelect { song: 3 }.encode(), vec![0xF3, 3]);
        assert_eq!(MidiMessage::TuneRequest.encode(), vec![0xF6]);
        assert_eq!(MidiMessage::TimeCodeQuarterFrame { data: 0x25 }.encode(), vec![0xF1, 0x25]);
    }

    #[test]
    fn test_signed_pitch_bend() {
        assert_eq!(convert::pitch_bend_from_signed(0), 0x2000);
        assert_eq!(convert::pitch_bend_from_signed(i16::MIN), 0);
        assert_eq!(convert::pitch_bend_from_signed(i16::MAX), 0x3FFF);
        assert_eq!(convert::pitch_bend_to_signed(0x2000), 0);
        assert_eq!(convert::pitch_bend_to_signed(0), -8192);

        let msg = MidiMessage::pitch_bend_signed(0, 8191);
        assert_eq!(msg.encode(), vec![0xE0, 0x7F, 0x7F]);
    }

    #[test]
    fn test_wire_len() {
        assert_eq!(MidiMessage::note_on(0, 1, 2).wire_len(), 3);
        assert_eq!(MidiMessage::channel_pressure(0, 1).wire_len(), 2);
        assert_eq!(MidiMessage::Realtime(RealtimeKind::Clock).wire_len(), 1);
        assert_eq!(MidiMessage::TuneRequest.wire_len(), 1);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x40, 0x07]), "90 40 07");
        assert_eq!(format_hex(&[]), "");
    }
}

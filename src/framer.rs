//! Byte-stream to message framer
//!
//! Reassembles complete [`MidiMessage`]s from a raw byte stream. Realtime bytes
//! are emitted immediately and never disturb a message in progress; any new
//! status byte aborts whatever was pending; stray data bytes are dropped. The
//! framer never fails, it resynchronizes on the next status byte.

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::midi::{
    is_channel_status, is_realtime, is_status_byte, packet_length, MidiMessage, PacketLength,
    RealtimeKind, SysEx, SYSEX_BEGIN, SYSEX_END,
};

/// Default capture limit for a SysEx run, delimiters included
pub const DEFAULT_MAX_SYSEX_LEN: usize = 256;

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    Idle,
    AwaitingSecondOf2,
    AwaitingSecondOf3,
    AwaitingThirdOf3,
    InSysEx,
}

/// Framer options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Reuse the last channel status when a data byte arrives in Idle.
    ///
    /// Off by default: every message must carry its own status byte.
    pub running_status: bool,

    /// Maximum captured SysEx length, delimiters included (minimum 2)
    pub max_sysex_len: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            running_status: false,
            max_sysex_len: DEFAULT_MAX_SYSEX_LEN,
        }
    }
}

/// Diagnostic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Completed messages, realtime included
    pub messages: u64,
    pub realtime: u64,
    /// Data bytes with no active status, stray SysEx ends, undefined status
    pub framing_errors: u64,
    /// Pending messages cut short by a new status byte
    pub aborted: u64,
    pub sysex_truncated: u64,
}

/// Framer for one input stream
#[derive(Debug)]
pub struct Framer {
    config: FramerConfig,
    state: FramerState,
    buffer: [u8; 3],
    count: usize,
    sysex: BytesMut,
    sysex_truncated: bool,
    running_status: Option<u8>,
    stats: FramerStats,
}

impl Framer {
    pub fn new(config: FramerConfig) -> Self {
        let config = FramerConfig {
            max_sysex_len: config.max_sysex_len.max(2),
            ..config
        };
        Self {
            config,
            state: FramerState::Idle,
            buffer: [0; 3],
            count: 0,
            sysex: BytesMut::with_capacity(config.max_sysex_len.min(DEFAULT_MAX_SYSEX_LEN)),
            sysex_truncated: false,
            running_status: None,
            stats: FramerStats::default(),
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes held for the message being assembled
    pub fn pending_len(&self) -> usize {
        match self.state {
            FramerState::InSysEx => self.sysex.len(),
            _ => self.count,
        }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Force the initial state, discarding anything pending
    pub fn reset(&mut self) {
        self.state = FramerState::Idle;
        self.count = 0;
        self.sysex.clear();
        self.sysex_truncated = false;
        self.running_status = None;
    }

    /// Feed one byte, returning the message it completes, if any
    pub fn feed(&mut self, byte: u8) -> Option<MidiMessage> {
        if is_realtime(byte) {
            self.stats.realtime += 1;
            return RealtimeKind::from_byte(byte).map(|kind| self.complete(MidiMessage::Realtime(kind)));
        }

        if is_status_byte(byte) {
            self.on_status(byte)
        } else {
            self.on_data(byte)
        }
    }

    /// Feed a run of bytes, collecting every completed message
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Vec<MidiMessage> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    fn on_status(&mut self, status: u8) -> Option<MidiMessage> {
        if self.state == FramerState::InSysEx {
            if status == SYSEX_END {
                return Some(self.finish_sysex());
            }
            debug!("SysEx aborted by status {:02X} after {} bytes", status, self.sysex.len());
            self.stats.aborted += 1;
            self.sysex.clear();
            self.sysex_truncated = false;
        } else if self.state != FramerState::Idle {
            trace!("Pending {:02X} aborted by status {:02X}", self.buffer[0], status);
            self.stats.aborted += 1;
        }

        self.state = FramerState::Idle;
        self.count = 0;

        if is_channel_status(status) {
            self.running_status = Some(status);
        } else {
            // system common cancels running status
            self.running_status = None;
        }

        match packet_length(status) {
            PacketLength::One => self.complete_packet(&[status]),
            PacketLength::Two => {
                self.begin(status);
                self.state = FramerState::AwaitingSecondOf2;
                None
            }
            PacketLength::Three => {
                self.begin(status);
                self.state = FramerState::AwaitingSecondOf3;
                None
            }
            PacketLength::Undefined => {
                match status {
                    SYSEX_BEGIN => {
                        self.sysex.clear();
                        self.sysex.extend_from_slice(&[SYSEX_BEGIN]);
                        self.sysex_truncated = false;
                        self.state = FramerState::InSysEx;
                    }
                    SYSEX_END => {
                        trace!("Stray SysEx end outside of a SysEx run");
                        self.stats.framing_errors += 1;
                    }
                    _ => {
                        trace!("Undefined status {:02X} ignored", status);
                        self.stats.framing_errors += 1;
                    }
                }
                None
            }
        }
    }

    fn on_data(&mut self, byte: u8) -> Option<MidiMessage> {
        match self.state {
            FramerState::Idle => match self.running_status {
                Some(status) if self.config.running_status => {
                    self.begin(status);
                    self.state = match packet_length(status) {
                        PacketLength::Two => FramerState::AwaitingSecondOf2,
                        _ => FramerState::AwaitingSecondOf3,
                    };
                    self.on_data(byte)
                }
                _ => {
                    trace!("Data byte {:02X} with no active status dropped", byte);
                    self.stats.framing_errors += 1;
                    None
                }
            },
            FramerState::AwaitingSecondOf2 => {
                self.buffer[1] = byte;
                self.count = 2;
                self.state = FramerState::Idle;
                let packet = [self.buffer[0], self.buffer[1]];
                self.complete_packet(&packet)
            }
            FramerState::AwaitingSecondOf3 => {
                self.buffer[1] = byte;
                self.count = 2;
                self.state = FramerState::AwaitingThirdOf3;
                None
            }
            FramerState::AwaitingThirdOf3 => {
                self.buffer[2] = byte;
                self.count = 3;
                self.state = FramerState::Idle;
                let packet = self.buffer;
                self.complete_packet(&packet)
            }
            FramerState::InSysEx => {
                if self.sysex.len() < self.config.max_sysex_len - 1 {
                    self.sysex.extend_from_slice(&[byte]);
                } else if !self.sysex_truncated {
                    debug!(
                        "SysEx longer than {} bytes, dropping the remainder",
                        self.config.max_sysex_len
                    );
                    self.sysex_truncated = true;
                    self.stats.sysex_truncated += 1;
                }
                None
            }
        }
    }

    fn begin(&mut self, status: u8) {
        self.buffer = [status, 0, 0];
        self.count = 1;
    }

    fn finish_sysex(&mut self) -> MidiMessage {
        self.sysex.extend_from_slice(&[SYSEX_END]);
        self.state = FramerState::Idle;
        self.count = 0;
        let sysex = SysEx {
            data: self.sysex.split().freeze(),
            truncated: self.sysex_truncated,
        };
        self.sysex_truncated = false;
        self.complete(MidiMessage::SysEx(sysex))
    }

    fn complete_packet(&mut self, packet: &[u8]) -> Option<MidiMessage> {
        self.count = 0;
        let message = MidiMessage::from_packet(packet);
        debug_assert!(message.is_some(), "unparsed packet {:02X?}", packet);
        if message.is_none() {
            self.stats.framing_errors += 1;
        }
        message.map(|m| self.complete(m))
    }

    fn complete(&mut self, message: MidiMessage) -> MidiMessage {
        self.stats.messages += 1;
        message
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(FramerConfig::default())
    }
}

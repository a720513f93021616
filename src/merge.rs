//! Output merging with running-status tracking
//!
//! Several sources may write to one physical output. [`MergeState`] follows
//! the bytes going out so the caller knows when a message boundary has been
//! reached and another source can safely inject a message.

use std::collections::VecDeque;
use tracing::{trace, warn};

use crate::midi::{
    is_channel_status, is_realtime, is_status_byte, packet_length, MidiMessage, PacketLength,
    SYSEX_END, TUNE_REQUEST,
};
use crate::transport::OutputTransport;

/// Running-status tracker for one output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeState {
    /// Last status byte emitted, 0 when none is cached
    last_status: u8,
    /// Data bytes seen for the cached status
    count: u8,
    last_return: bool,
}

impl MergeState {
    pub fn new() -> Self {
        Self {
            last_status: 0,
            count: 0,
            last_return: true,
        }
    }

    /// Track one outgoing byte
    ///
    /// Returns true when the byte leaves the stream at a message boundary.
    pub fn merge_emit(&mut self, byte: u8) -> bool {
        let safe = if is_realtime(byte) {
            // realtime can sit anywhere, it leaves the boundary where it was
            self.last_return
        } else if is_status_byte(byte) {
            if byte == TUNE_REQUEST || byte == SYSEX_END {
                self.last_status = 0;
                true
            } else {
                self.last_status = byte;
                self.count = 0;
                false
            }
        } else {
            self.on_data()
        };

        self.last_return = safe;
        safe
    }

    fn on_data(&mut self) -> bool {
        if self.last_status == 0 {
            return false;
        }

        match packet_length(self.last_status) {
            PacketLength::Two => {
                self.last_status = 0;
                true
            }
            PacketLength::Three => {
                if self.count == 0 {
                    self.count = 1;
                    return false;
                }
                self.count = 0;
                if !is_channel_status(self.last_status) {
                    // song position: running status never applies to system common
                    self.last_status = 0;
                }
                true
            }
            // SysEx body or undefined status: wait for the next status byte
            PacketLength::One | PacketLength::Undefined => false,
        }
    }

    /// Whether the last byte completed a message
    pub fn is_safe(&self) -> bool {
        self.last_return
    }

    /// Cached status byte, if any
    pub fn last_status(&self) -> Option<u8> {
        (self.last_status != 0).then_some(self.last_status)
    }

    /// Whether `status` may be omitted for the next message
    pub fn can_run(&self, status: u8) -> bool {
        self.last_return && self.count == 0 && self.last_status == status && is_channel_status(status)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for MergeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one merged output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub bytes: u64,
    pub messages: u64,
    /// Status bytes left out by running-status compression
    pub compressed: u64,
    /// Messages held back until the stream reached a boundary
    pub deferred: u64,
    pub send_errors: u64,
}

/// Merged output: running-status tracker in front of a transport
///
/// Raw bytes passed to [`Merger::emit`] go out immediately. Whole messages
/// passed to [`Merger::emit_message`] only go out at a message boundary;
/// otherwise they wait and are sent as soon as the raw stream completes the
/// message it is in.
pub struct Merger<T> {
    state: MergeState,
    output: T,
    compress: bool,
    pending: VecDeque<MidiMessage>,
    stats: MergeStats,
}

impl<T: OutputTransport> Merger<T> {
    pub fn new(output: T) -> Self {
        Self {
            state: MergeState::new(),
            output,
            compress: false,
            pending: VecDeque::new(),
            stats: MergeStats::default(),
        }
    }

    /// Leave out repeated channel status bytes when it is safe to do so
    ///
    /// The receiving framer must have running status enabled.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Track and forward one byte; true when the stream is at a boundary
    ///
    /// Reaching a boundary sends any messages held by `emit_message`.
    pub fn emit(&mut self, byte: u8) -> bool {
        let safe = self.send_byte(byte);
        if safe {
            self.flush_pending();
        }
        safe
    }

    /// Emit a complete message
    ///
    /// Returns true when the message was written and the stream ended at a
    /// boundary, false when it was deferred behind a partial message.
    /// Realtime messages may sit inside other messages and are never deferred.
    pub fn emit_message(&mut self, message: &MidiMessage) -> bool {
        let realtime = matches!(message, MidiMessage::Realtime(_));
        if !realtime && (!self.state.is_safe() || !self.pending.is_empty()) {
            trace!("Stream mid-message, deferring {}", message);
            self.stats.deferred += 1;
            self.pending.push_back(message.clone());
            return false;
        }
        self.write_message(message)
    }

    fn write_message(&mut self, message: &MidiMessage) -> bool {
        let bytes = message.encode();
        let skip_status = self.compress && self.state.can_run(message.status_byte());
        if skip_status {
            trace!("Running status {:02X} reused", message.status_byte());
            self.stats.compressed += 1;
        }

        let mut safe = self.state.is_safe();
        for &byte in bytes.iter().skip(usize::from(skip_status)) {
            safe = self.send_byte(byte);
        }
        self.stats.messages += 1;
        safe
    }

    fn send_byte(&mut self, byte: u8) -> bool {
        let safe = self.state.merge_emit(byte);
        self.stats.bytes += 1;
        if let Err(e) = self.output.send(&[byte]) {
            self.stats.send_errors += 1;
            warn!("Failed to send byte {:02X}: {}", byte, e);
        }
        safe
    }

    fn flush_pending(&mut self) {
        while self.state.is_safe() {
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            self.write_message(&message);
        }
    }

    pub fn is_safe(&self) -> bool {
        self.state.is_safe()
    }

    /// Messages waiting for a boundary
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn state(&self) -> &MergeState {
        &self.state
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    pub fn output(&self) -> &T {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut T {
        &mut self.output
    }

    /// Forget the cached status, e.g. after the output was reconnected
    ///
    /// The stream starts over at a boundary, so held messages go out now.
    pub fn reset(&mut self) {
        self.state.reset();
        self.flush_pending();
    }
}

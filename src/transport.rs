//! Byte transport contracts and in-memory transports
//!
//! Real endpoints (USB streaming endpoints, UARTs, host MIDI ports) implement
//! these traits; the framer and merger never touch hardware directly.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::framer::{Framer, FramerConfig};
use crate::midi::{format_hex, MidiMessage};

/// Transport failures
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no MIDI port matching '{0}'")]
    PortNotFound(String),

    #[error("failed to connect to '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport closed")]
    Closed,
}

/// Source of raw received bytes
pub trait InputTransport: Send {
    /// Bytes received since the last call, empty when there are none. Never blocks.
    fn poll_received_bytes(&mut self) -> Bytes;
}

/// Sink for raw bytes
pub trait OutputTransport: Send {
    /// Queue bytes for transmission. Never blocks.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl<T: OutputTransport + ?Sized> OutputTransport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }
}

impl<T: InputTransport + ?Sized> InputTransport for Box<T> {
    fn poll_received_bytes(&mut self) -> Bytes {
        (**self).poll_received_bytes()
    }
}

/// Sink that only accepts whole messages
pub trait MessageSink: Send {
    fn send_message(&mut self, message: &MidiMessage) -> Result<(), TransportError>;
}

/// Adapts a [`MessageSink`] to a byte-level [`OutputTransport`]
///
/// Bytes are framed with a private [`Framer`]; only completed messages reach
/// the sink. Realtime bytes are forwarded as soon as they arrive.
pub struct Reframed<S> {
    framer: Framer,
    sink: S,
}

impl<S: MessageSink> Reframed<S> {
    pub fn new(sink: S, config: FramerConfig) -> Self {
        Self {
            framer: Framer::new(config),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: MessageSink> OutputTransport for Reframed<S> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        for &byte in bytes {
            if let Some(message) = self.framer.feed(byte) {
                self.sink.send_message(&message)?;
            }
        }
        Ok(())
    }
}

/// Output that appends everything to a shared buffer
///
/// Clones share the same buffer, so a test can keep one handle while the
/// merger owns the other.
#[derive(Clone, Default)]
pub struct MemoryOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// Take everything written so far
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock())
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl OutputTransport for MemoryOutput {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        trace!("memory out: {}", format_hex(bytes));
        self.buffer.lock().extend_from_slice(bytes);
        Ok(())
    }
}

/// Message sink that records whole messages
#[derive(Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<MidiMessage>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.messages.lock().clone()
    }
}

impl MessageSink for MemorySink {
    fn send_message(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

/// Input that replays pre-loaded chunks, one per poll
///
/// Clones share the same chunk list so more data can be pushed after the
/// input has been handed to a bridge.
#[derive(Clone, Default)]
pub struct ScriptedInput {
    chunks: Arc<Mutex<VecDeque<Bytes>>>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: impl Into<Bytes>) {
        self.chunks.lock().push_back(chunk.into());
    }

    pub fn pending(&self) -> usize {
        self.chunks.lock().len()
    }
}

impl InputTransport for ScriptedInput {
    fn poll_received_bytes(&mut self) -> Bytes {
        self.chunks.lock().pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::RealtimeKind;

    #[test]
    fn test_memory_output_shares_buffer() {
        let out = MemoryOutput::new();
        let mut handle: Box<dyn OutputTransport> = Box::new(out.clone());
        handle.send(&[0x90, 0x40]).unwrap();
        handle.send(&[0x64]).unwrap();
        assert_eq!(out.contents(), vec![0x90, 0x40, 0x64]);
        assert_eq!(out.take(), vec![0x90, 0x40, 0x64]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_scripted_input_one_chunk_per_poll() {
        let input = ScriptedInput::new();
        input.push(vec![1u8, 2]);
        input.push(vec![3u8]);
        let mut polled = input.clone();
        assert_eq!(&polled.poll_received_bytes()[..], &[1, 2]);
        assert_eq!(&polled.poll_received_bytes()[..], &[3]);
        assert!(polled.poll_received_bytes().is_empty());
    }

    #[test]
    fn test_reframed_delivers_whole_messages() {
        let sink = MemorySink::new();
        let mut out = Reframed::new(sink.clone(), FramerConfig::default());
        out.send(&[0xB0, 0x07]).unwrap();
        assert!(sink.messages().is_empty());
        out.send(&[0xF8, 0x64]).unwrap();
        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::Realtime(RealtimeKind::Clock),
                MidiMessage::control_change(0, 7, 0x64),
            ]
        );
    }

    #[test]
    fn test_error_messages() {
        let err = TransportError::PortNotFound("uart".to_string());
        assert_eq!(err.to_string(), "no MIDI port matching 'uart'");
    }
}

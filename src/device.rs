//! One input stream: queue, framer and handlers
//!
//! The transport side owns the matching [`QueueProducer`](crate::queue::QueueProducer);
//! the poll loop calls [`MidiDevice::process`] to drain what arrived since the
//! last pass.

use tracing::{debug, trace};

use crate::dispatch::{Dispatcher, SourceId};
use crate::framer::{Framer, FramerConfig, FramerState, FramerStats};
use crate::midi::{MessageKind, MidiMessage};
use crate::queue::QueueConsumer;

/// Bytes taken from the queue per batch
pub const PROCESS_BATCH: usize = 16;

pub struct MidiDevice {
    source: SourceId,
    name: String,
    input: QueueConsumer,
    framer: Framer,
    dispatcher: Dispatcher,
}

impl MidiDevice {
    pub fn new(
        source: SourceId,
        name: impl Into<String>,
        input: QueueConsumer,
        config: FramerConfig,
    ) -> Self {
        Self {
            source,
            name: name.into(),
            input,
            framer: Framer::new(config),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Register a handler for one message kind
    pub fn on<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: FnMut(SourceId, &MidiMessage) + Send + 'static,
    {
        self.dispatcher.register(kind, handler);
    }

    /// Register the catch-all handler
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: FnMut(SourceId, &MidiMessage) + Send + 'static,
    {
        self.dispatcher.register_catchall(handler);
    }

    /// Register the fallthrough handler
    pub fn on_unhandled<F>(&mut self, handler: F)
    where
        F: FnMut(SourceId, &MidiMessage) + Send + 'static,
    {
        self.dispatcher.register_fallthrough(handler);
    }

    /// Feed a single byte directly, bypassing the queue
    pub fn feed(&mut self, byte: u8) -> Option<MessageKind> {
        let message = self.framer.feed(byte)?;
        trace!("{}: {}", self.name, message);
        self.dispatcher.dispatch(self.source, &message);
        Some(message.kind())
    }

    /// Process the bytes queued when the call starts, returning the number
    /// of messages dispatched
    ///
    /// Bytes arriving meanwhile are left for the next call.
    pub fn process(&mut self) -> usize {
        let mut dispatched = 0;
        let mut remaining = self.input.len();
        while remaining > 0 {
            let batch = self.input.dequeue_batch(remaining.min(PROCESS_BATCH));
            if batch.is_empty() {
                break;
            }
            remaining -= batch.len();
            for &byte in batch.iter() {
                if self.feed(byte).is_some() {
                    dispatched += 1;
                }
            }
        }
        dispatched
    }

    /// Return to the power-on state, dropping queued and pending bytes
    pub fn reset(&mut self) {
        let discarded = self.input.clear();
        self.framer.reset();
        debug!("{}: reset, {} queued bytes discarded", self.name, discarded);
    }

    pub fn state(&self) -> FramerState {
        self.framer.state()
    }

    pub fn framer_stats(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Bytes dropped by the input queue
    pub fn lost(&self) -> u64 {
        self.input.lost()
    }

    pub fn queued(&self) -> usize {
        self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::RealtimeKind;
    use crate::queue::byte_queue;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_process_dispatches_note_on_once() {
        let (tx, rx) = byte_queue(64);
        let mut device = MidiDevice::new(SourceId(2), "uart", rx, FramerConfig::default());

        let notes = Arc::new(Mutex::new(Vec::new()));
        let all = Arc::new(Mutex::new(Vec::new()));
        {
            let notes = notes.clone();
            device.on(MessageKind::NoteOn, move |src, msg| notes.lock().push((src, msg.clone())));
            let all = all.clone();
            device.on_any(move |_, msg| all.lock().push(msg.wire_len()));
        }

        tx.enqueue_slice(&[0x90, 0x40, 0x64]);
        assert_eq!(device.process(), 1);

        assert_eq!(
            *notes.lock(),
            vec![(SourceId(2), MidiMessage::NoteOn { channel: 0, note: 0x40, velocity: 0x64 })]
        );
        assert_eq!(*all.lock(), vec![3]);
    }

    #[test]
    fn test_realtime_dispatched_before_pending_message() {
        let (tx, rx) = byte_queue(64);
        let mut device = MidiDevice::new(SourceId(0), "usb", rx, FramerConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            device.on_any(move |_, msg| seen.lock().push(msg.clone()));
        }

        tx.enqueue_slice(&[0x90, 0xF8, 0x40, 0x64]);
        assert_eq!(device.process(), 2);
        assert_eq!(
            *seen.lock(),
            vec![
                MidiMessage::Realtime(RealtimeKind::Clock),
                MidiMessage::NoteOn { channel: 0, note: 0x40, velocity: 0x64 },
            ]
        );
    }

    #[test]
    fn test_process_drains_more_than_one_batch() {
        let (tx, rx) = byte_queue(64);
        let mut device = MidiDevice::new(SourceId(0), "usb", rx, FramerConfig::default());
        for _ in 0..20 {
            tx.enqueue_slice(&[0xF8]);
        }
        assert_eq!(device.process(), 20);
        assert_eq!(device.queued(), 0);
    }

    #[test]
    fn test_process_handles_only_bytes_queued_on_entry() {
        let (tx, rx) = byte_queue(64);
        let mut device = MidiDevice::new(SourceId(0), "busy", rx, FramerConfig::default());
        tx.enqueue_slice(&[0xF8, 0xF8]);

        // the producer keeps writing while the handler runs
        let count = Arc::new(Mutex::new(0usize));
        {
            let count = count.clone();
            device.on_any(move |_, _| {
                *count.lock() += 1;
                tx.enqueue(0xFA);
            });
        }

        assert_eq!(device.process(), 2);
        assert_eq!(device.queued(), 2);
        assert_eq!(device.process(), 2);
        assert_eq!(*count.lock(), 4);
    }

    #[test]
    fn test_reset_clears_queue_and_state() {
        let (tx, rx) = byte_queue(8);
        let mut device = MidiDevice::new(SourceId(0), "usb", rx, FramerConfig::default());
        device.feed(0x90);
        tx.enqueue_slice(&[0x40, 0x64]);
        device.reset();
        assert_eq!(device.state(), FramerState::Idle);
        assert_eq!(device.queued(), 0);
        assert_eq!(device.process(), 0);
    }

    #[test]
    fn test_garbage_produces_no_callbacks() {
        let (tx, rx) = byte_queue(8);
        let mut device = MidiDevice::new(SourceId(0), "usb", rx, FramerConfig::default());
        let count = Arc::new(Mutex::new(0usize));
        {
            let count = count.clone();
            device.on_any(move |_, _| *count.lock() += 1);
        }
        tx.enqueue_slice(&[0x01, 0x7F, 0x40]);
        assert_eq!(device.process(), 0);
        assert_eq!(*count.lock(), 0);
        assert_eq!(device.state(), FramerState::Idle);
        assert_eq!(device.framer_stats().framing_errors, 3);
    }
}

//! Per-kind message callbacks
//!
//! Each completed message goes to the handler registered for its kind, or to
//! the fallthrough handler when there is none, and then always to the
//! catch-all handler.

use std::collections::HashMap;
use std::fmt;

use crate::midi::{MessageKind, MidiMessage};

/// Identifies the input stream a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u8);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src{}", self.0)
    }
}

/// Callback invoked with the source and the completed message
pub type Handler = Box<dyn FnMut(SourceId, &MidiMessage) + Send>;

/// Handler table for one input stream
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageKind, Handler>,
    catch_all: Option<Handler>,
    fallthrough: Option<Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for one kind, replacing any previous one
    pub fn register<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: FnMut(SourceId, &MidiMessage) + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn unregister(&mut self, kind: MessageKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    /// Install the handler that sees every message
    pub fn register_catchall<F>(&mut self, handler: F)
    where
        F: FnMut(SourceId, &MidiMessage) + Send + 'static,
    {
        self.catch_all = Some(Box::new(handler));
    }

    /// Install the handler for kinds without a specific handler
    pub fn register_fallthrough<F>(&mut self, handler: F)
    where
        F: FnMut(SourceId, &MidiMessage) + Send + 'static,
    {
        self.fallthrough = Some(Box::new(handler));
    }

    pub fn has_handler(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Deliver a message; returns true when a kind-specific handler ran
    pub fn dispatch(&mut self, source: SourceId, message: &MidiMessage) -> bool {
        let called = match self.handlers.get_mut(&message.kind()) {
            Some(handler) => {
                handler(source, message);
                true
            }
            None => false,
        };

        if !called {
            if let Some(fallthrough) = self.fallthrough.as_mut() {
                fallthrough(source, message);
            }
        }

        if let Some(catch_all) = self.catch_all.as_mut() {
            catch_all(source, message);
        }

        called
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .field("catch_all", &self.catch_all.is_some())
            .field("fallthrough", &self.fallthrough.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::RealtimeKind;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<(&'static str, SourceId, MidiMessage)>>>;

    fn recorder(log: &Log, tag: &'static str) -> impl FnMut(SourceId, &MidiMessage) + Send + 'static {
        let log = log.clone();
        move |src, msg| log.lock().push((tag, src, msg.clone()))
    }

    #[test]
    fn test_specific_and_catchall() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(MessageKind::NoteOn, recorder(&log, "note_on"));
        dispatcher.register_catchall(recorder(&log, "all"));
        dispatcher.register_fallthrough(recorder(&log, "fallthrough"));

        let msg = MidiMessage::note_on(0, 0x40, 0x64);
        assert!(dispatcher.dispatch(SourceId(1), &msg));

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], ("note_on", SourceId(1), msg.clone()));
        assert_eq!(log[1], ("all", SourceId(1), msg));
    }

    #[test]
    fn test_fallthrough_once_without_specific() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(MessageKind::NoteOn, recorder(&log, "note_on"));
        dispatcher.register_fallthrough(recorder(&log, "fallthrough"));

        let clock = MidiMessage::Realtime(RealtimeKind::Clock);
        assert!(!dispatcher.dispatch(SourceId(0), &clock));

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "fallthrough");
    }

    #[test]
    fn test_reregistration_replaces() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(MessageKind::ControlChange, recorder(&log, "first"));
        dispatcher.register(MessageKind::ControlChange, recorder(&log, "second"));

        dispatcher.dispatch(SourceId(0), &MidiMessage::control_change(0, 7, 1));
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "second");
    }

    #[test]
    fn test_catchall_reregistration_replaces() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_catchall(recorder(&log, "first"));
        dispatcher.register_catchall(recorder(&log, "second"));

        dispatcher.dispatch(SourceId(3), &MidiMessage::program_change(0, 1));
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "second");
    }

    #[test]
    fn test_fallthrough_reregistration_replaces() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_fallthrough(recorder(&log, "first"));
        dispatcher.register_fallthrough(recorder(&log, "second"));

        dispatcher.dispatch(SourceId(0), &MidiMessage::Realtime(RealtimeKind::Stop));
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "second");
    }

    #[test]
    fn test_unregister_falls_back() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(MessageKind::TuneRequest, recorder(&log, "tune"));
        dispatcher.register_fallthrough(recorder(&log, "fallthrough"));
        assert!(dispatcher.unregister(MessageKind::TuneRequest));
        assert!(!dispatcher.has_handler(MessageKind::TuneRequest));

        dispatcher.dispatch(SourceId(0), &MidiMessage::TuneRequest);
        assert_eq!(log.lock()[0].0, "fallthrough");
    }

    #[test]
    fn test_empty_dispatcher_is_silent() {
        let mut dispatcher = Dispatcher::new();
        assert!(!dispatcher.dispatch(SourceId(0), &MidiMessage::TuneRequest));
    }
}

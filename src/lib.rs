//! MIDI framing, merging and multi-sink dispatch
//!
//! Bytes arrive in a lock-free [`queue`], are assembled into complete messages
//! by the [`framer`] and handed to per-kind handlers by the [`dispatch`]
//! table. On the way out, [`merge`] tracks running status so several sources
//! can share one output. [`bridge`] wires these together for a set of ports.

pub mod bridge;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod framer;
pub mod merge;
pub mod midi;
pub mod monitor;
pub mod ports;
pub mod queue;
pub mod transport;
pub mod usb;

pub use bridge::{Bridge, BridgeError, BridgeSettings, MessageFilter, PortId, Route};
pub use device::MidiDevice;
pub use dispatch::{Dispatcher, SourceId};
pub use framer::{Framer, FramerConfig, FramerState};
pub use merge::{MergeState, Merger};
pub use midi::{MessageKind, MidiMessage};
pub use queue::{byte_queue, QueueConsumer, QueueProducer};
pub use transport::{InputTransport, OutputTransport, TransportError};

//! Bridge - ties input devices, routes and merged outputs together
//!
//! Each port owns a byte queue, a [`MidiDevice`] draining it and, when it can
//! transmit, a [`Merger`] in front of its output transport. The bridge claims
//! every device's catch-all handler: completed messages go through an internal
//! channel and are then fanned out to the mergers of all matching routes.
//! Specific and fallthrough handlers stay available through [`Bridge::device_mut`].

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{BridgeConfig, FilterConfig};
use crate::device::MidiDevice;
use crate::dispatch::SourceId;
use crate::framer::{FramerConfig, FramerStats};
use crate::merge::{MergeStats, Merger};
use crate::midi::{MessageKind, MidiMessage};
use crate::queue::{byte_queue, QueueProducer, DEFAULT_CAPACITY};
use crate::transport::{InputTransport, OutputTransport};

/// Index of a port inside a [`Bridge`]; doubles as the source id of its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u8);

impl PortId {
    fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn source(self) -> SourceId {
        SourceId(self.0)
    }
}

impl From<SourceId> for PortId {
    fn from(source: SourceId) -> Self {
        PortId(source.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BridgeError {
    #[error("unknown port {0}")]
    UnknownPort(PortId),

    #[error("no port named '{0}'")]
    UnknownPortName(String),

    #[error("port '{0}' already exists")]
    DuplicatePort(String),

    #[error("too many ports")]
    TooManyPorts,

    #[error("input queue producer of '{0}' was already taken")]
    ProducerTaken(String),

    #[error("port '{0}' has no output")]
    NoOutput(String),
}

/// Construction parameters shared by all ports
#[derive(Debug, Clone, Copy)]
pub struct BridgeSettings {
    pub queue_capacity: usize,
    pub framer: FramerConfig,
    pub compress_running_status: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            framer: FramerConfig::default(),
            compress_running_status: false,
        }
    }
}

impl From<&BridgeConfig> for BridgeSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            framer: FramerConfig::from(&config.framer),
            compress_running_status: config.merge.compress_running_status,
        }
    }
}

/// Which messages a route lets through
///
/// Channels are 1-based. System messages have no channel and are only
/// subject to the kind list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub channels: Option<Vec<u8>>,
    pub kinds: Option<Vec<MessageKind>>,
}

impl MessageFilter {
    pub fn matches(&self, message: &MidiMessage) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&message.kind()) {
                return false;
            }
        }
        match (&self.channels, message.channel()) {
            (Some(channels), Some(channel)) => channels.contains(&(channel + 1)),
            _ => true,
        }
    }
}

impl From<&FilterConfig> for MessageFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            channels: config.channels.clone(),
            kinds: config.kinds.clone(),
        }
    }
}

/// Forwarding rule from one port's input to another port's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub from: PortId,
    pub to: PortId,
    pub filter: MessageFilter,
}

impl Route {
    pub fn new(from: PortId, to: PortId) -> Self {
        Self {
            from,
            to,
            filter: MessageFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Called once for every message completed on any input
pub type Observer = Box<dyn FnMut(PortId, &MidiMessage) + Send>;

/// Work done by one [`Bridge::poll`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Bytes moved from polled inputs into their queues
    pub bytes_in: usize,
    /// Bytes polled inputs delivered to a full queue
    pub bytes_dropped: usize,
    pub messages: usize,
    /// Message deliveries to outputs
    pub routed: usize,
}

impl PollStats {
    pub fn is_idle(&self) -> bool {
        self.bytes_in == 0 && self.messages == 0
    }
}

/// Counters for one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStats {
    pub id: PortId,
    pub name: String,
    pub queued: usize,
    pub lost: u64,
    pub framer: FramerStats,
    pub merge: Option<MergeStats>,
}

struct Port {
    name: String,
    device: MidiDevice,
    producer: Option<QueueProducer>,
    input: Option<Box<dyn InputTransport>>,
    merger: Option<Merger<Box<dyn OutputTransport>>>,
}

pub struct Bridge {
    settings: BridgeSettings,
    ports: Vec<Port>,
    routes: Vec<Route>,
    observer: Option<Observer>,
    message_tx: Sender<(SourceId, MidiMessage)>,
    message_rx: Receiver<(SourceId, MidiMessage)>,
}

impl Bridge {
    pub fn new(settings: BridgeSettings) -> Self {
        let (message_tx, message_rx) = unbounded();
        Self {
            settings,
            ports: Vec::new(),
            routes: Vec::new(),
            observer: None,
            message_tx,
            message_rx,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Add a port that can both receive and transmit
    pub fn add_port(
        &mut self,
        name: impl Into<String>,
        output: Box<dyn OutputTransport>,
    ) -> Result<PortId, BridgeError> {
        let merger = Merger::new(output).with_compression(self.settings.compress_running_status);
        self.push_port(name.into(), Some(merger))
    }

    /// Add a receive-only port
    pub fn add_input_port(&mut self, name: impl Into<String>) -> Result<PortId, BridgeError> {
        self.push_port(name.into(), None)
    }

    fn push_port(
        &mut self,
        name: String,
        merger: Option<Merger<Box<dyn OutputTransport>>>,
    ) -> Result<PortId, BridgeError> {
        if self.ports.iter().any(|p| p.name == name) {
            return Err(BridgeError::DuplicatePort(name));
        }
        let id = u8::try_from(self.ports.len())
            .map(PortId)
            .map_err(|_| BridgeError::TooManyPorts)?;

        let (producer, consumer) = byte_queue(self.settings.queue_capacity);
        let mut device = MidiDevice::new(id.source(), name.clone(), consumer, self.settings.framer);
        let tx = self.message_tx.clone();
        device.on_any(move |source, message| {
            // the receiver lives as long as the bridge
            let _ = tx.send((source, message.clone()));
        });

        debug!("Port added: {} ({})", name, id);
        self.ports.push(Port {
            name,
            device,
            producer: Some(producer),
            input: None,
            merger,
        });
        Ok(id)
    }

    fn port(&self, id: PortId) -> Result<&Port, BridgeError> {
        self.ports.get(id.index()).ok_or(BridgeError::UnknownPort(id))
    }

    fn port_mut(&mut self, id: PortId) -> Result<&mut Port, BridgeError> {
        self.ports
            .get_mut(id.index())
            .ok_or(BridgeError::UnknownPort(id))
    }

    /// Look up a port by name
    pub fn port_id(&self, name: &str) -> Option<PortId> {
        self.ports
            .iter()
            .position(|p| p.name == name)
            .and_then(|idx| u8::try_from(idx).ok())
            .map(PortId)
    }

    pub fn port_name(&self, id: PortId) -> Option<&str> {
        self.ports.get(id.index()).map(|p| p.name.as_str())
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Hand the queue's writing end to an interrupt-style producer
    ///
    /// Returns None once taken, or when a polled input is attached.
    pub fn take_producer(&mut self, id: PortId) -> Result<Option<QueueProducer>, BridgeError> {
        let port = self.port_mut(id)?;
        if port.input.is_some() {
            return Ok(None);
        }
        Ok(port.producer.take())
    }

    /// Attach a polled input; [`Bridge::poll`] moves its bytes into the queue
    pub fn attach_input(
        &mut self,
        id: PortId,
        input: Box<dyn InputTransport>,
    ) -> Result<(), BridgeError> {
        let port = self.port_mut(id)?;
        if port.producer.is_none() {
            return Err(BridgeError::ProducerTaken(port.name.clone()));
        }
        port.input = Some(input);
        Ok(())
    }

    pub fn add_route(&mut self, route: Route) -> Result<(), BridgeError> {
        self.port(route.from)?;
        let to = self.port(route.to)?;
        if to.merger.is_none() {
            return Err(BridgeError::NoOutput(to.name.clone()));
        }
        info!(
            "Route: {} -> {}",
            self.ports[route.from.index()].name,
            self.ports[route.to.index()].name
        );
        self.routes.push(route);
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: FnMut(PortId, &MidiMessage) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Input device of a port, for registering kind handlers
    ///
    /// Registering a catch-all here detaches the port from routing.
    pub fn device_mut(&mut self, id: PortId) -> Result<&mut MidiDevice, BridgeError> {
        Ok(&mut self.port_mut(id)?.device)
    }

    /// Merged output of a port, for injecting messages directly
    pub fn merger(
        &mut self,
        id: PortId,
    ) -> Result<&mut Merger<Box<dyn OutputTransport>>, BridgeError> {
        let port = self.port_mut(id)?;
        let name = port.name.clone();
        port.merger.as_mut().ok_or(BridgeError::NoOutput(name))
    }

    /// Return a port to its power-on state
    ///
    /// Drops queued input bytes and the partial message being framed, and
    /// forgets the running status cached on its output.
    pub fn reset_port(&mut self, id: PortId) -> Result<(), BridgeError> {
        let port = self.port_mut(id)?;
        port.device.reset();
        if let Some(merger) = port.merger.as_mut() {
            merger.reset();
        }
        // drop messages from this port that were dispatched but not yet routed
        let pending: Vec<_> = self.message_rx.try_iter().collect();
        for item in pending.into_iter().filter(|(source, _)| *source != id.source()) {
            let _ = self.message_tx.send(item);
        }
        info!("Port reset: {}", self.ports[id.index()].name);
        Ok(())
    }

    /// Run one pass of the poll loop
    pub fn poll(&mut self) -> PollStats {
        let mut stats = PollStats::default();

        for port in &mut self.ports {
            let (Some(input), Some(producer)) = (port.input.as_mut(), port.producer.as_ref())
            else {
                continue;
            };
            let bytes = input.poll_received_bytes();
            if bytes.is_empty() {
                continue;
            }
            let accepted = producer.enqueue_slice(&bytes);
            stats.bytes_in += accepted;
            if accepted < bytes.len() {
                stats.bytes_dropped += bytes.len() - accepted;
                warn!(
                    "{}: input queue full, dropped {} bytes ({} lost in total)",
                    port.name,
                    bytes.len() - accepted,
                    producer.lost()
                );
            }
        }

        for port in &mut self.ports {
            stats.messages += port.device.process();
        }

        for (source, message) in self.message_rx.try_iter() {
            let from = PortId::from(source);
            if let Some(observer) = self.observer.as_mut() {
                observer(from, &message);
            }

            for route in self
                .routes
                .iter()
                .filter(|r| r.from == from && r.filter.matches(&message))
            {
                if let Some(merger) = self
                    .ports
                    .get_mut(route.to.index())
                    .and_then(|p| p.merger.as_mut())
                {
                    merger.emit_message(&message);
                    stats.routed += 1;
                    trace!("{} -> {}: {}", from, route.to, message);
                }
            }
        }

        stats
    }

    /// Snapshot of every port's counters
    pub fn stats(&self) -> Vec<PortStats> {
        self.ports
            .iter()
            .enumerate()
            .map(|(idx, port)| PortStats {
                id: PortId(idx as u8),
                name: port.name.clone(),
                queued: port.device.queued(),
                lost: port.device.lost(),
                framer: port.device.framer_stats(),
                merge: port.merger.as_ref().map(|m| m.stats()),
            })
            .collect()
    }

    /// Build ports and routes from a validated configuration
    ///
    /// `open_output` is called for every port with an output; ports without
    /// one become receive-only. Inputs are left for the caller to attach.
    /// A route naming a port that does not exist is an error.
    pub fn from_config<F, E>(config: &BridgeConfig, mut open_output: F) -> Result<Self, E>
    where
        F: FnMut(&crate::config::PortConfig) -> Result<Option<Box<dyn OutputTransport>>, E>,
        E: From<BridgeError>,
    {
        let mut bridge = Bridge::new(BridgeSettings::from(config));

        for port in &config.ports {
            match open_output(port)? {
                Some(output) => bridge.add_port(port.name.clone(), output)?,
                None => bridge.add_input_port(port.name.clone())?,
            };
        }

        for route in &config.routes {
            let from = bridge
                .port_id(&route.from)
                .ok_or_else(|| BridgeError::UnknownPortName(route.from.clone()))?;
            let to = bridge
                .port_id(&route.to)
                .ok_or_else(|| BridgeError::UnknownPortName(route.to.clone()))?;
            let filter = route
                .filter
                .as_ref()
                .map(MessageFilter::from)
                .unwrap_or_default();
            bridge.add_route(Route::new(from, to).with_filter(filter))?;
        }

        Ok(bridge)
    }
}

//! Host MIDI ports via midir
//!
//! On a host the midir input callback thread plays the role of the receive
//! interrupt: it only pushes bytes into a [`QueueProducer`]. Output ports only
//! accept whole messages, so they are exposed as a [`MessageSink`] and wrapped
//! in [`Reframed`](crate::transport::Reframed) by the caller.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info, warn};

use crate::midi::{format_hex, MidiMessage};
use crate::queue::QueueProducer;
use crate::transport::{MessageSink, TransportError};

const CLIENT_NAME: &str = "midi-bridge";

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>, TransportError> {
    let midi_in = MidiInput::new(&format!("{}-scanner", CLIENT_NAME)).map_err(init_error)?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>, TransportError> {
    let midi_out = MidiOutput::new(&format!("{}-scanner", CLIENT_NAME)).map_err(init_error)?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// Case-insensitive substring match, first hit wins
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

fn init_error(e: midir::InitError) -> TransportError {
    TransportError::Connect {
        port: CLIENT_NAME.to_string(),
        reason: e.to_string(),
    }
}

/// Input port feeding a byte queue
pub struct MidirInput {
    port_name: String,
    connection: Option<MidiInputConnection<()>>,
}

impl MidirInput {
    /// Connect to the first input port whose name contains `pattern`
    pub fn connect(pattern: &str, producer: QueueProducer) -> Result<Self, TransportError> {
        let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME)).map_err(init_error)?;
        // SysEx, clock and active sense must reach the framer
        midi_in.ignore(Ignore::None);

        let (port, port_name) = midi_in
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_in.port_name(&port).ok()?;
                matches_pattern(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        info!("Connecting to input port: {}", port_name);

        let log_name = port_name.clone();
        let connection = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| {
                    let accepted = producer.enqueue_slice(data);
                    if accepted < data.len() {
                        warn!(
                            "{}: input queue full, dropped {} of {} bytes ({} lost in total)",
                            log_name,
                            data.len() - accepted,
                            data.len(),
                            producer.lost()
                        );
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port_name,
            connection: Some(connection),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!("Input port closed: {}", self.port_name);
        }
    }
}

impl Drop for MidirInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Output port accepting whole messages
pub struct MidirOutput {
    port_name: String,
    connection: Option<MidiOutputConnection>,
}

impl MidirOutput {
    /// Connect to the first output port whose name contains `pattern`
    pub fn connect(pattern: &str) -> Result<Self, TransportError> {
        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME)).map_err(init_error)?;

        let (port, port_name) = midi_out
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_out.port_name(&port).ok()?;
                matches_pattern(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        info!("Connecting to output port: {}", port_name);

        let connection = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| TransportError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port_name,
            connection: Some(connection),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!("Output port closed: {}", self.port_name);
        }
    }
}

impl MessageSink for MidirOutput {
    fn send_message(&mut self, message: &MidiMessage) -> Result<(), TransportError> {
        let connection = self.connection.as_mut().ok_or(TransportError::Closed)?;
        let data = message.encode();
        connection
            .send(&data)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        debug!("{} <- {} | {}", self.port_name, format_hex(&data), message);
        Ok(())
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching_is_case_insensitive() {
        assert!(matches_pattern("USB MIDI Interface 1", "usb midi"));
        assert!(matches_pattern("UART Out", "OUT"));
        assert!(!matches_pattern("UART Out", "usb"));
        assert!(matches_pattern("anything", ""));
    }
}

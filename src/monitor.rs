//! Traffic monitor for the command line
//!
//! One colored line per completed input message:
//! `[timestamp] PORT | HEX => PARSED`

use colored::*;
use std::time::Instant;

use crate::midi::{format_hex, MidiMessage};
use crate::ports::{list_input_ports, list_output_ports};

const PORT_WIDTH: usize = 20;

/// One observed message
#[derive(Debug, Clone)]
pub struct MonitorEvent {
    pub timestamp_ms: u64,
    pub port_name: String,
    pub message: MidiMessage,
}

/// Stamps observed messages relative to when monitoring started
pub struct Monitor {
    start_time: Instant,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn event(&self, port_name: &str, message: &MidiMessage) -> MonitorEvent {
        MonitorEvent {
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            port_name: port_name.to_string(),
            message: message.clone(),
        }
    }

    pub fn print_header() {
        println!("{}", "Monitoring MIDI traffic...".green());
        println!("{}", "Format: [timestamp] PORT | HEX => PARSED".dimmed());
        println!("{}", "─".repeat(80).dimmed());
    }

    pub fn print(&self, port_name: &str, message: &MidiMessage) {
        println!("{}", format_event(&self.event(port_name, message)));
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Render an event as a monitor line
pub fn format_event(event: &MonitorEvent) -> String {
    let timestamp = format!("{:08}", event.timestamp_ms);
    let port = if event.port_name.chars().count() > PORT_WIDTH {
        let short: String = event.port_name.chars().take(PORT_WIDTH - 3).collect();
        format!("{}...", short)
    } else {
        event.port_name.clone()
    };

    let hex = format_hex(&event.message.encode());
    let hex_colored = match event.message {
        MidiMessage::NoteOn { .. } => hex.bright_green(),
        MidiMessage::NoteOff { .. } => hex.bright_red(),
        MidiMessage::ControlChange { .. } => hex.bright_yellow(),
        MidiMessage::PitchBend { .. } => hex.bright_cyan(),
        MidiMessage::SysEx(_) => hex.bright_magenta(),
        MidiMessage::Realtime(_) => hex.dimmed(),
        _ => hex.normal(),
    };

    format!(
        "[{}ms] {:width$} | {} => {}",
        timestamp.dimmed(),
        port.white(),
        hex_colored,
        event.message.to_string().bright_blue(),
        width = PORT_WIDTH
    )
}

/// Print the host's MIDI ports
pub fn print_ports() {
    println!("\n{}", "=== MIDI Input Ports ===".bold().cyan());
    match list_input_ports() {
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("  {}: {}", i, name);
            }
        }
        Err(e) => println!("  {}", e.to_string().red()),
    }

    println!("\n{}", "=== MIDI Output Ports ===".bold().cyan());
    match list_output_ports() {
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("  {}: {}", i, name);
            }
        }
        Err(e) => println!("  {}", e.to_string().red()),
    }
    println!();
}

//! midi-bridge - MIDI merge and routing bridge
//!
//! Connects host MIDI ports, frames their input and merges the routed traffic
//! onto the configured outputs.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_bridge::bridge::{Bridge, BridgeError};
use midi_bridge::config::{BridgeConfig, PortConfig};
use midi_bridge::framer::FramerConfig;
use midi_bridge::monitor::{self, Monitor};
use midi_bridge::ports::{MidirInput, MidirOutput};
use midi_bridge::transport::{OutputTransport, Reframed};

/// MIDI Bridge - merge and route MIDI streams between ports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridge.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print every message received on any port
    #[arg(long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        monitor::print_ports();
        return Ok(());
    }

    info!("Starting midi-bridge v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = BridgeConfig::load(&args.config).await?;
    info!(
        "Configuration loaded: {} ports, {} routes",
        config.ports.len(),
        config.routes.len()
    );

    let mut bridge = build_bridge(&config)?;
    let inputs = connect_inputs(&mut bridge, &config)?;

    if args.monitor {
        Monitor::print_header();
        let monitor = Monitor::new();
        let names: Vec<String> = config.ports.iter().map(|p| p.name.clone()).collect();
        bridge.set_observer(move |port, message| {
            let name = names.get(usize::from(port.0)).map(String::as_str).unwrap_or("?");
            monitor.print(name, message);
        });
    }

    run(&mut bridge, config.poll_interval_ms).await;

    drop(inputs);
    log_stats(&bridge);
    info!("midi-bridge shutdown complete");
    Ok(())
}

/// Open every configured output and build ports and routes
fn build_bridge(config: &BridgeConfig) -> Result<Bridge> {
    // outputs reframe with the same running-status rule the merger uses
    let reframe = FramerConfig {
        running_status: config.merge.compress_running_status,
        ..FramerConfig::from(&config.framer)
    };

    Bridge::from_config(config, |port: &PortConfig| -> Result<_> {
        let Some(pattern) = port.output.as_deref() else {
            return Ok(None);
        };
        let output = MidirOutput::connect(pattern)
            .with_context(|| format!("Failed to open output for port '{}'", port.name))?;
        Ok(Some(Box::new(Reframed::new(output, reframe)) as Box<dyn OutputTransport>))
    })
}

/// Connect inputs; the midir callback threads feed the port queues directly
fn connect_inputs(bridge: &mut Bridge, config: &BridgeConfig) -> Result<Vec<MidirInput>> {
    let mut inputs = Vec::new();
    for port in &config.ports {
        let Some(pattern) = port.input.as_deref() else {
            continue;
        };
        let id = bridge
            .port_id(&port.name)
            .ok_or_else(|| anyhow::anyhow!("Port '{}' missing from bridge", port.name))?;
        let producer = bridge
            .take_producer(id)?
            .ok_or_else(|| BridgeError::ProducerTaken(port.name.clone()))?;
        let input = MidirInput::connect(pattern, producer)
            .with_context(|| format!("Failed to open input for port '{}'", port.name))?;
        inputs.push(input);
    }
    Ok(inputs)
}

async fn run(bridge: &mut Bridge, poll_interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(poll_interval_ms.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Bridge running, press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stats = bridge.poll();
                if stats.bytes_dropped > 0 {
                    warn!("{} bytes dropped this pass", stats.bytes_dropped);
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown signal received");
                break;
            }
        }
    }
}

fn log_stats(bridge: &Bridge) {
    for port in bridge.stats() {
        info!(
            "{}: {} messages, {} realtime, {} framing errors, {} aborted, {} bytes lost",
            port.name,
            port.framer.messages,
            port.framer.realtime,
            port.framer.framing_errors,
            port.framer.aborted,
            port.lost
        );
        if let Some(merge) = port.merge {
            info!(
                "{}: {} messages out, {} bytes, {} compressed, {} send errors",
                port.name, merge.messages, merge.bytes, merge.compressed, merge.send_errors
            );
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

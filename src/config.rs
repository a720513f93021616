//! Configuration management for the MIDI bridge
//!
//! Handles loading, parsing and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;

use crate::framer::{FramerConfig, DEFAULT_MAX_SYSEX_LEN};
use crate::midi::MessageKind;
use crate::queue::DEFAULT_CAPACITY;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub framer: FramerSettings,
    #[serde(default)]
    pub merge: MergeSettings,
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Receive-side framing options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FramerSettings {
    #[serde(default)]
    pub running_status: bool,
    #[serde(default = "default_max_sysex_len")]
    pub max_sysex_len: usize,
}

impl Default for FramerSettings {
    fn default() -> Self {
        Self {
            running_status: false,
            max_sysex_len: DEFAULT_MAX_SYSEX_LEN,
        }
    }
}

impl From<&FramerSettings> for FramerConfig {
    fn from(settings: &FramerSettings) -> Self {
        FramerConfig {
            running_status: settings.running_status,
            max_sysex_len: settings.max_sysex_len,
        }
    }
}

/// Output merge options
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MergeSettings {
    #[serde(default)]
    pub compress_running_status: bool,
}

/// One bridged endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortConfig {
    pub name: String,
    /// Input port name pattern (substring match)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Output port name pattern (substring match)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Message route between two ports
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
}

/// Route filter
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Channels 1-16; system messages always pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<MessageKind>>,
}

impl BridgeConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: BridgeConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        if self.framer.max_sysex_len < 2 {
            anyhow::bail!("framer.max_sysex_len must be at least 2");
        }
        if self.ports.is_empty() {
            anyhow::bail!("At least one port must be defined");
        }
        if self.ports.len() > u8::MAX as usize {
            anyhow::bail!("Too many ports ({})", self.ports.len());
        }

        let mut names = HashSet::new();
        for (idx, port) in self.ports.iter().enumerate() {
            if port.name.is_empty() {
                anyhow::bail!("Port {} name cannot be empty", idx);
            }
            if !names.insert(port.name.as_str()) {
                anyhow::bail!("Duplicate port name '{}'", port.name);
            }
            if port.input.is_none() && port.output.is_none() {
                anyhow::bail!("Port '{}' needs an input, an output, or both", port.name);
            }
        }

        for route in &self.routes {
            let from = self.port(&route.from).with_context(|| {
                format!("Route {} -> {} references unknown port", route.from, route.to)
            })?;
            let to = self.port(&route.to).with_context(|| {
                format!("Route {} -> {} references unknown port", route.from, route.to)
            })?;
            if from.input.is_none() {
                anyhow::bail!("Route source '{}' has no input", from.name);
            }
            if to.output.is_none() {
                anyhow::bail!("Route destination '{}' has no output", to.name);
            }

            if let Some(channels) = route.filter.as_ref().and_then(|f| f.channels.as_ref()) {
                if let Some(bad) = channels.iter().find(|&&c| !(1..=16).contains(&c)) {
                    anyhow::bail!(
                        "Route {} -> {} channel {} is invalid (must be 1-16)",
                        route.from,
                        route.to,
                        bad
                    );
                }
            }
        }

        Ok(())
    }

    /// Look up a port by name
    pub fn port(&self, name: &str) -> Option<&PortConfig> {
        self.ports.iter().find(|p| p.name == name)
    }
}

// Default value functions
fn default_queue_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_poll_interval_ms() -> u64 {
    1
}
fn default_max_sysex_len() -> usize {
    DEFAULT_MAX_SYSEX_LEN
}

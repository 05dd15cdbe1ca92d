//! Simulation configuration
//!
//! Loaded from JSON; every field has a default so a partial file works.
//!
//! ```json
//! {
//!   "channel": { "type": "lossy", "delay": 1, "drop_probability": 0.1, "seed": 3 },
//!   "stability_window": 20,
//!   "hop_limit": 32
//! }
//! ```
//!
//! Without `hop_limit` every message may cross N-1 links, the longest
//! simple path of an N-node network.

use std::path::Path;

use serde::{Deserialize, Serialize};
use star_core::{ChannelConfig, KernelError, StarError};
use star_routing::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Channel(#[from] KernelError),
}

impl From<ConfigError> for StarError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Channel(e) => StarError::Kernel(e),
            other => StarError::Config(other.to_string()),
        }
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Delivery semantics between neighbors
    pub channel: ChannelConfig,
    /// Ticks without a view change before a node reports STABLE
    pub stability_window: u64,
    /// Forwarding budget of every application message; `None` sizes it to
    /// the network
    pub hop_limit: Option<u32>,
    /// Abort the run after this many dispatched events
    pub event_limit: Option<u64>,
    /// Seed for generated topologies
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            stability_window: EngineConfig::default().stability_window,
            hop_limit: None,
            event_limit: None,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check every field, including that the channel can be built
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stability_window == 0 {
            return Err(ConfigError::Invalid(
                "stability_window must be at least 1".to_string(),
            ));
        }
        if self.hop_limit == Some(0) {
            return Err(ConfigError::Invalid("hop_limit must be at least 1".to_string()));
        }
        self.channel.build()?;
        Ok(())
    }

    /// Hop budget for a network of `nodes` nodes
    pub fn hop_budget(&self, nodes: usize) -> u32 {
        self.hop_limit.unwrap_or_else(|| {
            u32::try_from(nodes.saturating_sub(1))
                .unwrap_or(u32::MAX)
                .max(1)
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            stability_window: self.stability_window,
        }
    }
}

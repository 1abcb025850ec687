//! Gateway configuration
//!
//! Loaded from a YAML file, with command-line flags applied on top.

use crate::daemon::DEFAULT_LISTEN_ADDR;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address to serve the API on (`host:port` or `unix://<path>`)
    pub listen_addr: String,
    /// Engine addresses making up the cluster
    pub nodes: Vec<String>,
    /// Seconds between polls of each engine
    pub refresh_interval_secs: u64,
    /// Seconds before an engine request is abandoned
    pub engine_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            nodes: Vec::new(),
            refresh_interval_secs: 10,
            engine_timeout_secs: 5,
        }
    }
}

impl GatewayConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse YAML configuration. Missing keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location, `<config dir>/swarmgate/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("swarmgate").join("config.yaml"))
    }

    /// Check values that would make the gateway unusable
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "listen_addr must not be empty".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(GatewayError::InvalidConfig(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.engine_timeout_secs == 0 {
            return Err(GatewayError::InvalidConfig(
                "engine_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.nodes.iter().any(|n| n.trim().is_empty()) {
            return Err(GatewayError::InvalidConfig(
                "node addresses must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

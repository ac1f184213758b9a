//! Hub server configuration.

use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Hub server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Outbound frames buffered per connection before sends are dropped.
    #[serde(default = "default_observer_queue_capacity")]
    pub observer_queue_capacity: usize,
    /// Maximum concurrent dashboard connections.
    #[serde(default = "default_max_dashboards")]
    pub max_dashboards: usize,
    /// Status string returned by the liveness endpoint.
    #[serde(default = "default_status_message")]
    pub status_message: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_observer_queue_capacity() -> usize {
    64
}

fn default_max_dashboards() -> usize {
    64
}

fn default_status_message() -> String {
    "Smart Gridx Backend Running".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            observer_queue_capacity: default_observer_queue_capacity(),
            max_dashboards: default_max_dashboards(),
            status_message: default_status_message(),
        }
    }
}

impl HubConfig {
    /// `host:port` string for binding.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> HubResult<()> {
        if self.observer_queue_capacity == 0 {
            return Err(HubError::Config(
                "observer_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_dashboards == 0 {
            return Err(HubError::Config("max_dashboards must be at least 1".to_string()));
        }
        Ok(())
    }
}

//! Application configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use gridx_core::AnalyticsConfig;
use gridx_devices::DeviceMonitorConfig;
use gridx_hub::HubConfig;

use crate::error::{AppError, AppResult};

/// Default config path when neither `--config` nor `GRIDX_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP / WebSocket server.
    #[serde(default)]
    pub hub: HubConfig,
    /// Theft and maintenance model parameters.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Device monitor. Absent disables it.
    #[serde(default)]
    pub devices: Option<DeviceMonitorConfig>,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &str) -> AppResult<Self> {
        let config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Validate every section.
    pub fn validate(&self) -> AppResult<()> {
        self.hub.validate()?;
        self.analytics
            .validate()
            .map_err(|e| AppError::Config(format!("analytics: {e}")))?;
        if let Some(devices) = &self.devices {
            devices.validate()?;
        }
        Ok(())
    }
}

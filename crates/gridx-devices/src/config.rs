//! Device monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DevicesError, DevicesResult};

/// Per-metric alert limits. A reading strictly above a limit is a breach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub temperature_above: Option<f64>,
    #[serde(default)]
    pub humidity_above: Option<f64>,
    #[serde(default)]
    pub power_above: Option<f64>,
    /// Only watch these devices. Empty watches all.
    #[serde(default)]
    pub device_ids: Vec<String>,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.temperature_above.is_none() && self.humidity_above.is_none() && self.power_above.is_none()
    }

    pub fn watches(&self, device_id: &str) -> bool {
        self.device_ids.is_empty() || self.device_ids.iter().any(|id| id == device_id)
    }
}

/// Alert mail settings.
///
/// `smtp_host` selects SMTP over implicit TLS. Otherwise `relay_url`
/// selects the HTTP mail relay. With neither, alerts are only logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Falls back to `GRIDX_SMTP_USERNAME`.
    #[serde(default)]
    pub smtp_username: Option<String>,
    /// Falls back to `GRIDX_SMTP_PASSWORD`.
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub relay_url: String,
    /// Sender address. For SMTP, empty means the SMTP username.
    #[serde(default)]
    pub sender: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    /// Bearer token for the relay, if it needs one.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_smtp_port() -> u16 {
    465
}

fn default_sender_name() -> String {
    "Gridx Alerts".to_string()
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            relay_url: String::new(),
            sender: String::new(),
            sender_name: default_sender_name(),
            api_key: None,
        }
    }
}

/// Device monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMonitorConfig {
    /// Regional API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// OAuth access token for the account.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Operator addresses that receive alerts.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Switch a device off when one of its readings breaches.
    #[serde(default)]
    pub switch_off_on_breach: bool,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

fn default_api_base_url() -> String {
    "https://us-apia.coolkit.cc".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl Default for DeviceMonitorConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            access_token: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            thresholds: Thresholds::default(),
            recipients: Vec::new(),
            switch_off_on_breach: false,
            notifier: NotifierConfig::default(),
        }
    }
}

impl DeviceMonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> DevicesResult<()> {
        if self.poll_interval_secs == 0 {
            return Err(DevicesError::Config(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.api_base_url.is_empty() {
            return Err(DevicesError::Config("api_base_url is empty".to_string()));
        }
        if self.access_token.is_empty() {
            return Err(DevicesError::Config("access_token is empty".to_string()));
        }
        let non_finite = [
            self.thresholds.temperature_above,
            self.thresholds.humidity_above,
            self.thresholds.power_above,
        ]
        .into_iter()
        .flatten()
        .any(|v| !v.is_finite());
        if non_finite {
            return Err(DevicesError::Config("thresholds must be finite".to_string()));
        }
        Ok(())
    }
}

//! Threshold monitor.
//!
//! Polls the device directory on a fixed interval and raises an alert the
//! first time a reading rises above its limit. The `(device, metric)` pair
//! then stays tripped, without further alerts, until a reading at or below
//! the limit re-arms it. Devices that are offline or do not report a metric
//! keep their current trip state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gridx_telemetry::Metrics;

use crate::config::{DeviceMonitorConfig, Thresholds};
use crate::device::{Device, SwitchState};
use crate::directory::{CloudDeviceDirectory, DynDeviceDirectory};
use crate::error::DevicesResult;
use crate::notifier::{notifier_from_config, render_alert_html, DynNotifier};

/// A watched reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Humidity,
    Power,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Power];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Power => "power",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Power => "W",
        }
    }

    fn reading(&self, device: &Device) -> Option<f64> {
        match self {
            Self::Temperature => device.temperature,
            Self::Humidity => device.humidity,
            Self::Power => device.power,
        }
    }

    fn limit(&self, thresholds: &Thresholds) -> Option<f64> {
        match self {
            Self::Temperature => thresholds.temperature_above,
            Self::Humidity => thresholds.humidity_above,
            Self::Power => thresholds.power_above,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reading that has just crossed above its limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub device_id: String,
    pub device_name: String,
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    /// Whether the device relay was on when the breach was seen.
    pub switch_on: bool,
}

impl Breach {
    pub fn subject(&self) -> String {
        format!("Device alert: {} {}", self.device_name, self.metric)
    }

    pub fn message(&self) -> String {
        let unit = self.metric.unit();
        format!(
            "{} ({}) reported {} {:.1}{unit}, above the limit of {:.1}{unit}.",
            self.device_name, self.device_id, self.metric, self.value, self.threshold
        )
    }
}

/// Watches device readings and alerts operators on threshold breaches.
pub struct ThresholdMonitor {
    directory: DynDeviceDirectory,
    notifier: DynNotifier,
    thresholds: Thresholds,
    recipients: Vec<String>,
    switch_off_on_breach: bool,
    poll_interval: Duration,
    tripped: Mutex<HashSet<(String, Metric)>>,
}

impl ThresholdMonitor {
    pub fn new(
        directory: DynDeviceDirectory,
        notifier: DynNotifier,
        config: &DeviceMonitorConfig,
    ) -> Self {
        Self {
            directory,
            notifier,
            thresholds: config.thresholds.clone(),
            recipients: config.recipients.clone(),
            switch_off_on_breach: config.switch_off_on_breach,
            poll_interval: config.poll_interval(),
            tripped: Mutex::new(HashSet::new()),
        }
    }

    /// Build a monitor against the cloud directory.
    pub fn from_config(config: &DeviceMonitorConfig) -> DevicesResult<Self> {
        config.validate()?;
        let directory = Arc::new(CloudDeviceDirectory::new(
            config.api_base_url.clone(),
            config.access_token.clone(),
        )?);
        let notifier = notifier_from_config(&config.notifier)?;
        Ok(Self::new(directory, notifier, config))
    }

    /// Directory the monitor polls; shared with the operator routes.
    pub fn directory(&self) -> DynDeviceDirectory {
        self.directory.clone()
    }

    /// Update trip state from one listing and return the new breaches.
    fn evaluate(&self, devices: &[Device]) -> Vec<Breach> {
        let mut tripped = self.tripped.lock();
        let mut breaches = Vec::new();

        for device in devices {
            if !self.thresholds.watches(&device.id) {
                continue;
            }
            if !device.online {
                debug!(device = %device.id, "Device offline, readings ignored");
                continue;
            }

            for metric in Metric::ALL {
                let (Some(limit), Some(value)) = (metric.limit(&self.thresholds), metric.reading(device))
                else {
                    continue;
                };
                let key = (device.id.clone(), metric);

                if value > limit {
                    if tripped.insert(key) {
                        breaches.push(Breach {
                            device_id: device.id.clone(),
                            device_name: device.name.clone(),
                            metric,
                            value,
                            threshold: limit,
                            switch_on: device.switch == Some(SwitchState::On),
                        });
                    }
                } else if tripped.remove(&key) {
                    info!(device = %device.id, %metric, value, "Reading back within limit");
                }
            }
        }
        breaches
    }

    /// Poll the directory once, alerting on any new breaches.
    pub async fn poll_once(&self) -> DevicesResult<Vec<Breach>> {
        let devices = self.directory.list_devices().await?;
        let breaches = self.evaluate(&devices);

        for breach in &breaches {
            warn!(
                device = %breach.device_id,
                metric = %breach.metric,
                value = breach.value,
                threshold = breach.threshold,
                "Threshold breached"
            );
            self.handle_breach(breach).await;
        }
        Ok(breaches)
    }

    async fn handle_breach(&self, breach: &Breach) {
        let mut message = breach.message();

        if self.switch_off_on_breach && breach.switch_on {
            match self
                .directory
                .set_switch(&breach.device_id, SwitchState::Off)
                .await
            {
                Ok(()) => message.push_str("\nThe device has been switched off."),
                Err(e) => {
                    warn!(device = %breach.device_id, error = %e, "Failed to switch device off");
                    message.push_str("\nSwitching the device off failed.");
                }
            }
        }

        let subject = breach.subject();
        let html = render_alert_html(&message);
        for recipient in &self.recipients {
            self.notifier.send(recipient, &subject, &html).await;
        }
    }

    /// Poll on the configured interval until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        if self.thresholds.is_empty() {
            warn!("No device thresholds configured, monitor idle");
        }
        info!(
            interval_secs = self.poll_interval.as_secs(),
            recipients = self.recipients.len(),
            "Device monitor started"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            match self.poll_once().await {
                Ok(breaches) => {
                    Metrics::device_poll("ok");
                    debug!(breaches = breaches.len(), "Device poll complete");
                }
                Err(e) => {
                    Metrics::device_poll("error");
                    warn!(error = %e, "Device poll failed, retrying next tick");
                }
            }
        }
        info!("Device monitor stopped");
    }
}

//! gridx-devices - Device-control and alerting backend.
//!
//! Talks to the vendor cloud for smart plugs and sensors, watches their
//! readings against operator limits and emails the operators when a limit
//! is crossed.
//!
//! - [`DeviceDirectory`]: list devices and flip their relays
//!   ([`CloudDeviceDirectory`] over REST)
//! - [`Notifier`]: best-effort alert delivery ([`SmtpNotifier`],
//!   [`HttpMailNotifier`], [`LogNotifier`])
//! - [`device_routes`]: operator REST routes to list devices and switch them
//! - [`ThresholdMonitor`]: edge-triggered polling loop tying the two together

pub mod api;
pub mod config;
pub mod device;
pub mod directory;
pub mod error;
pub mod monitor;
pub mod notifier;

pub use api::device_routes;
pub use config::{DeviceMonitorConfig, NotifierConfig, Thresholds};
pub use device::{parse_thing_list, Device, SwitchState};
pub use directory::{
    BoxFuture, CloudDeviceDirectory, DeviceDirectory, DynDeviceDirectory, MockDeviceDirectory,
};
pub use error::{DevicesError, DevicesResult};
pub use monitor::{Breach, Metric, ThresholdMonitor};
pub use notifier::{
    build_alert_message, notifier_from_config, render_alert_html, DynNotifier, HttpMailNotifier,
    LogNotifier, MockNotifier, Notifier, NotifyOutcome, SentNotification, SmtpNotifier,
};

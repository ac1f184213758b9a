//! Prometheus metrics for the gridx hub.
//!
//! Covers:
//! - Producer connectivity and ingest volume per node kind
//! - Dashboard fan-out (broadcasts, deliveries, dropped sends)
//! - Derived alert signals (risk score, theft loss)
//! - Device monitor polling and notifications
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which must crash at startup rather than
//! silently drop metrics. These panics only occur during static
//! initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, register_int_gauge,
    Counter, CounterVec, Encoder, Gauge, GaugeVec, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Producer connection state per node kind (1 = connected).
pub static NODE_CONNECTED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gridx_node_connected",
        "Hardware producer connection state (1=connected)",
        &["node"]
    )
    .unwrap()
});

/// Telemetry frames accepted per node kind.
pub static TELEMETRY_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridx_telemetry_messages_total",
        "Telemetry frames accepted from hardware producers",
        &["node"]
    )
    .unwrap()
});

/// Frames skipped because they could not be decoded.
pub static MALFORMED_PAYLOADS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridx_malformed_payloads_total",
        "Inbound frames skipped because they could not be decoded",
        &["channel"]
    )
    .unwrap()
});

/// Connected dashboards.
pub static DASHBOARD_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "gridx_dashboard_connections",
        "Currently connected dashboard observers"
    )
    .unwrap()
});

/// Publish calls.
pub static BROADCASTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("gridx_broadcasts_total", "Snapshot publish calls").unwrap()
});

/// Per-observer delivery outcomes.
pub static BROADCAST_DELIVERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridx_broadcast_deliveries_total",
        "Per-observer snapshot deliveries by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Latest predictive-maintenance score.
pub static RISK_SCORE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("gridx_risk_score", "Latest predictive-maintenance score (Px)").unwrap()
});

/// Latest pole/house power gap, in watts.
pub static THEFT_LOSS_WATTS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "gridx_theft_loss_watts",
        "Latest pole minus house power while both nodes are connected"
    )
    .unwrap()
});

/// Alert flags (1 = raised).
pub static ALERT_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gridx_alert_active",
        "Derived alert flags (1=raised)",
        &["alert"]
    )
    .unwrap()
});

/// Relay commands from dashboards by outcome.
pub static RELAY_COMMANDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridx_relay_commands_total",
        "Dashboard relay commands by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Device directory polls by outcome.
pub static DEVICE_POLLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridx_device_polls_total",
        "Device directory polls by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Operator notifications by outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridx_notifications_total",
        "Operator notifications by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Encode every registered metric in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn flag(raised: bool) -> f64 {
    if raised {
        1.0
    } else {
        0.0
    }
}

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a producer connect/disconnect.
    pub fn node_connected(node: &str, connected: bool) {
        NODE_CONNECTED.with_label_values(&[node]).set(flag(connected));
    }

    /// Record an accepted telemetry frame.
    pub fn telemetry_received(node: &str) {
        TELEMETRY_MESSAGES_TOTAL.with_label_values(&[node]).inc();
    }

    /// Record a skipped, undecodable frame.
    pub fn malformed_payload(channel: &str) {
        MALFORMED_PAYLOADS_TOTAL.with_label_values(&[channel]).inc();
    }

    /// Set the connected dashboard count.
    pub fn dashboards_set(count: usize) {
        DASHBOARD_CONNECTIONS.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record one publish and its per-observer outcomes.
    pub fn broadcast(delivered: usize, failed: usize) {
        BROADCASTS_TOTAL.inc();
        BROADCAST_DELIVERIES_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(delivered as f64);
        BROADCAST_DELIVERIES_TOTAL
            .with_label_values(&["failed"])
            .inc_by(failed as f64);
    }

    /// Record the latest derived alert state.
    pub fn alerts(theft_detected: bool, maintenance_risk: bool, risk_score: f64) {
        ALERT_ACTIVE
            .with_label_values(&["theft"])
            .set(flag(theft_detected));
        ALERT_ACTIVE
            .with_label_values(&["maintenance"])
            .set(flag(maintenance_risk));
        RISK_SCORE.set(risk_score);
    }

    /// Record the latest pole/house power gap.
    pub fn theft_loss(loss_watts: f64) {
        THEFT_LOSS_WATTS.set(loss_watts);
    }

    /// Record a relay command outcome (`forwarded`, `no_producer`, `failed`, `ignored`).
    pub fn relay_command(outcome: &str) {
        RELAY_COMMANDS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a device poll outcome (`ok`, `error`).
    pub fn device_poll(outcome: &str) {
        DEVICE_POLLS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a notification outcome (`sent`, `failed`, `disabled`).
    pub fn notification(outcome: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }
}

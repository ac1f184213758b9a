//! System state snapshot types.
//!
//! `SystemState` is the single pole/house/alerts record the hub keeps for
//! the lifetime of the process. Each section has a matching partial update
//! type whose `None` fields leave the current value untouched.
//!
//! Field names serialize in camelCase because that is what dashboards read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::HEALTHY_MESSAGE;
use crate::node::NodeKind;

/// Number of relays on the house node.
pub const RELAY_COUNT: usize = 4;

/// House relay bank, in relay order.
pub type Relays = [bool; RELAY_COUNT];

/// Default house temperature (°C) before the first reading arrives.
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;

/// Latest readings from the pole meter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleState {
    pub connected: bool,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub energy: f64,
    pub power_factor: f64,
    pub frequency: f64,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Latest readings from the house meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseState {
    pub connected: bool,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub energy: f64,
    pub power_factor: f64,
    pub temperature: f64,
    pub relays: Relays,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Default for HouseState {
    fn default() -> Self {
        Self {
            connected: false,
            power: 0.0,
            voltage: 0.0,
            current: 0.0,
            energy: 0.0,
            power_factor: 0.0,
            temperature: DEFAULT_TEMPERATURE_C,
            relays: [false; RELAY_COUNT],
            last_seen: None,
        }
    }
}

/// Derived alert signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub theft_detected: bool,
    pub maintenance_risk: bool,
    /// Predictive-maintenance score, rounded to 2 decimals.
    pub risk_score: f64,
    pub message: String,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            theft_detected: false,
            maintenance_risk: false,
            risk_score: 0.0,
            message: HEALTHY_MESSAGE.to_string(),
        }
    }
}

/// Full system state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub pole: PoleState,
    pub house: HouseState,
    pub alerts: AlertState,
}

impl SystemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the producer of the given kind is currently connected.
    pub fn is_connected(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Pole => self.pole.connected,
            NodeKind::House => self.house.connected,
        }
    }

    /// Set the connectivity flag for a producer kind.
    pub fn set_connected(&mut self, kind: NodeKind, connected: bool) {
        match kind {
            NodeKind::Pole => self.pole.connected = connected,
            NodeKind::House => self.house.connected = connected,
        }
    }

    /// Merge a partial section update into the state.
    pub fn apply(&mut self, section: &StateSection) {
        match section {
            StateSection::Pole(update) => update.merge_into(&mut self.pole),
            StateSection::House(update) => update.merge_into(&mut self.house),
            StateSection::Alerts(update) => update.merge_into(&mut self.alerts),
        }
    }
}

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Partial update for the pole section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoleUpdate {
    pub power: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub energy: Option<f64>,
    pub power_factor: Option<f64>,
    pub frequency: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl PoleUpdate {
    pub fn merge_into(&self, pole: &mut PoleState) {
        merge(&mut pole.power, &self.power);
        merge(&mut pole.voltage, &self.voltage);
        merge(&mut pole.current, &self.current);
        merge(&mut pole.energy, &self.energy);
        merge(&mut pole.power_factor, &self.power_factor);
        merge(&mut pole.frequency, &self.frequency);
        if self.last_seen.is_some() {
            pole.last_seen = self.last_seen;
        }
    }
}

/// Partial update for the house section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HouseUpdate {
    pub power: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub energy: Option<f64>,
    pub power_factor: Option<f64>,
    pub temperature: Option<f64>,
    pub relays: Option<Relays>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl HouseUpdate {
    pub fn merge_into(&self, house: &mut HouseState) {
        merge(&mut house.power, &self.power);
        merge(&mut house.voltage, &self.voltage);
        merge(&mut house.current, &self.current);
        merge(&mut house.energy, &self.energy);
        merge(&mut house.power_factor, &self.power_factor);
        merge(&mut house.temperature, &self.temperature);
        merge(&mut house.relays, &self.relays);
        if self.last_seen.is_some() {
            house.last_seen = self.last_seen;
        }
    }
}

/// Partial update for the alerts section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertUpdate {
    pub theft_detected: Option<bool>,
    pub maintenance_risk: Option<bool>,
    pub risk_score: Option<f64>,
    pub message: Option<String>,
}

impl AlertUpdate {
    pub fn merge_into(&self, alerts: &mut AlertState) {
        merge(&mut alerts.theft_detected, &self.theft_detected);
        merge(&mut alerts.maintenance_risk, &self.maintenance_risk);
        merge(&mut alerts.risk_score, &self.risk_score);
        merge(&mut alerts.message, &self.message);
    }
}

impl From<AlertState> for AlertUpdate {
    fn from(alerts: AlertState) -> Self {
        Self {
            theft_detected: Some(alerts.theft_detected),
            maintenance_risk: Some(alerts.maintenance_risk),
            risk_score: Some(alerts.risk_score),
            message: Some(alerts.message),
        }
    }
}

/// A partial update addressed to one section of the state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateSection {
    Pole(PoleUpdate),
    House(HouseUpdate),
    Alerts(AlertUpdate),
}

impl StateSection {
    /// Producer kind whose telemetry this section carries, if any.
    pub fn node(&self) -> Option<NodeKind> {
        match self {
            Self::Pole(_) => Some(NodeKind::Pole),
            Self::House(_) => Some(NodeKind::House),
            Self::Alerts(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_defaults() {
        let state = SystemState::new();
        assert!(!state.pole.connected);
        assert!(!state.house.connected);
        assert_eq!(state.house.temperature, 25.0);
        assert_eq!(state.house.relays, [false; 4]);
        assert_eq!(state.alerts.message, HEALTHY_MESSAGE);
        assert!(state.pole.last_seen.is_none());
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let mut state = SystemState::new();
        state.apply(&StateSection::Pole(PoleUpdate {
            power: Some(500.0),
            voltage: Some(230.0),
            ..Default::default()
        }));
        state.apply(&StateSection::Pole(PoleUpdate {
            power: Some(480.0),
            ..Default::default()
        }));

        assert_eq!(state.pole.power, 480.0);
        assert_eq!(state.pole.voltage, 230.0);
        assert_eq!(state.house, HouseState::default());
    }

    #[test]
    fn test_house_update_replaces_relays() {
        let mut state = SystemState::new();
        state.apply(&StateSection::House(HouseUpdate {
            relays: Some([true, false, true, false]),
            temperature: Some(31.5),
            ..Default::default()
        }));
        assert_eq!(state.house.relays, [true, false, true, false]);
        assert_eq!(state.house.temperature, 31.5);
    }

    #[test]
    fn test_connected_flag_per_kind() {
        let mut state = SystemState::new();
        state.set_connected(NodeKind::House, true);
        assert!(state.is_connected(NodeKind::House));
        assert!(!state.is_connected(NodeKind::Pole));
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(SystemState::new()).unwrap();
        assert_eq!(json["alerts"]["theftDetected"], false);
        assert_eq!(json["alerts"]["riskScore"], 0.0);
        assert_eq!(json["pole"]["powerFactor"], 0.0);
        assert!(json["house"]["lastSeen"].is_null());
        assert_eq!(json["house"]["relays"].as_array().unwrap().len(), 4);
    }
}

//! Inbound wire payloads.
//!
//! Hardware nodes send one JSON object per frame. Every numeric field is
//! optional and an absent field takes its documented default, so a payload
//! always yields a complete section update.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::state::{HouseUpdate, PoleUpdate, Relays, DEFAULT_TEMPERATURE_C, RELAY_COUNT};

/// Dashboard action that is relayed to the house node.
pub const SET_RELAY_ACTION: &str = "set_relay";

/// Parse text into a JSON object, rejecting arrays and scalars.
fn parse_object(text: &str) -> CoreResult<Value> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CoreError::InvalidPayload(format!(
            "expected JSON object, got {}",
            json_kind(&value)
        )));
    }
    Ok(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Telemetry frame from the pole meter.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PolePayload {
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub pf: Option<f64>,
}

impl PolePayload {
    pub fn parse(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_value(parse_object(text)?)?)
    }

    /// Build a full pole update; absent readings become 0.
    pub fn into_update(self, now: DateTime<Utc>) -> PoleUpdate {
        PoleUpdate {
            power: Some(self.power.unwrap_or(0.0)),
            voltage: Some(self.voltage.unwrap_or(0.0)),
            current: Some(self.current.unwrap_or(0.0)),
            energy: Some(self.energy.unwrap_or(0.0)),
            power_factor: Some(self.pf.unwrap_or(0.0)),
            frequency: Some(self.frequency.unwrap_or(0.0)),
            last_seen: Some(now),
        }
    }
}

/// Sensor block of a house frame.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HouseSensors {
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub pf: Option<f64>,
}

/// Telemetry frame from the house meter.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HousePayload {
    #[serde(default)]
    pub sensors: Option<HouseSensors>,
    #[serde(default)]
    pub relays: Option<Vec<bool>>,
}

impl HousePayload {
    pub fn parse(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_value(parse_object(text)?)?)
    }

    /// Build a full house update.
    ///
    /// Temperature defaults to 25 °C, other readings to 0. The relay bank is
    /// padded with `false` or truncated so it always has four entries.
    pub fn into_update(self, now: DateTime<Utc>) -> HouseUpdate {
        let sensors = self.sensors.unwrap_or_default();
        HouseUpdate {
            power: Some(sensors.power.unwrap_or(0.0)),
            voltage: Some(sensors.voltage.unwrap_or(0.0)),
            current: Some(sensors.current.unwrap_or(0.0)),
            energy: Some(sensors.energy.unwrap_or(0.0)),
            power_factor: Some(sensors.pf.unwrap_or(0.0)),
            temperature: Some(sensors.temperature.unwrap_or(DEFAULT_TEMPERATURE_C)),
            relays: Some(normalize_relays(self.relays.as_deref().unwrap_or(&[]))),
            last_seen: Some(now),
        }
    }
}

fn normalize_relays(reported: &[bool]) -> Relays {
    let mut relays = [false; RELAY_COUNT];
    for (slot, value) in relays.iter_mut().zip(reported) {
        *slot = *value;
    }
    relays
}

/// Control command sent by a dashboard.
///
/// Only the `action` field is interpreted; the original text is kept so it
/// can be forwarded to the house node unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardCommand {
    pub action: Option<String>,
    pub raw: String,
}

impl DashboardCommand {
    pub fn parse(text: &str) -> CoreResult<Self> {
        let value = parse_object(text)?;
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            action,
            raw: text.to_string(),
        })
    }

    pub fn is_set_relay(&self) -> bool {
        self.action.as_deref() == Some(SET_RELAY_ACTION)
    }
}

//! Smart devices as reported by the cloud directory.
//!
//! The cloud lists devices as `data.thingList[].itemData`. Sensor readings
//! arrive either as numbers or as numeric strings, and sensors that are not
//! fitted report `"unavailable"`; both of those map to `None` here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DevicesError, DevicesResult};

/// Relay position of a switchable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchState {
    type Err = DevicesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(DevicesError::Api(format!("unknown switch state: {other}"))),
        }
    }
}

/// One device from the directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub online: bool,
    pub switch: Option<SwitchState>,
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity, percent.
    pub humidity: Option<f64>,
    /// Watts.
    pub power: Option<f64>,
}

impl Device {
    /// Build a device from one `itemData` object.
    pub fn from_item_data(item: &Value) -> DevicesResult<Self> {
        let id = item
            .get("deviceid")
            .and_then(Value::as_str)
            .ok_or_else(|| DevicesError::Api("device entry without deviceid".to_string()))?;
        let name = item.get("name").and_then(Value::as_str).unwrap_or(id);
        let online = item.get("online").and_then(Value::as_bool).unwrap_or(false);
        let params = item.get("params");
        let param = |key: &str| params.and_then(|p| p.get(key));

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            online,
            switch: param("switch")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            temperature: param("currentTemperature").and_then(reading),
            humidity: param("currentHumidity").and_then(reading),
            power: param("power").and_then(reading),
        })
    }
}

/// Numeric reading, accepting numbers and numeric strings.
fn reading(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Parse a full list response body.
///
/// Entries without `itemData` (groups, scenes) are skipped.
pub fn parse_thing_list(body: &Value) -> DevicesResult<Vec<Device>> {
    let list = body
        .pointer("/data/thingList")
        .and_then(Value::as_array)
        .ok_or_else(|| DevicesError::Api("response has no data.thingList".to_string()))?;

    list.iter()
        .filter_map(|entry| entry.get("itemData"))
        .map(Device::from_item_data)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_readings() {
        let body = json!({
            "error": 0,
            "data": {
                "thingList": [
                    {
                        "itemType": 1,
                        "itemData": {
                            "deviceid": "1000a1",
                            "name": "Water heater",
                            "online": true,
                            "params": {
                                "switch": "on",
                                "currentTemperature": "41.5",
                                "currentHumidity": "unavailable",
                                "power": 1830.2
                            }
                        }
                    },
                    {
                        "itemType": 3,
                        "index": 0
                    },
                    {
                        "itemType": 1,
                        "itemData": {
                            "deviceid": "1000b2",
                            "online": false,
                            "params": {}
                        }
                    }
                ]
            }
        });

        let devices = parse_thing_list(&body).unwrap();
        assert_eq!(devices.len(), 2);

        let heater = &devices[0];
        assert_eq!(heater.id, "1000a1");
        assert_eq!(heater.switch, Some(SwitchState::On));
        assert_eq!(heater.temperature, Some(41.5));
        assert_eq!(heater.humidity, None);
        assert_eq!(heater.power, Some(1830.2));

        let bare = &devices[1];
        assert_eq!(bare.name, "1000b2");
        assert!(!bare.online);
        assert_eq!(bare.switch, None);
        assert_eq!(bare.temperature, None);
    }

    #[test]
    fn test_missing_thing_list_is_api_error() {
        let err = parse_thing_list(&json!({"error": 0, "data": {}})).unwrap_err();
        assert!(matches!(err, DevicesError::Api(_)));
    }

    #[test]
    fn test_entry_without_id_is_rejected() {
        let body = json!({"data": {"thingList": [{"itemData": {"name": "x"}}]}});
        assert!(parse_thing_list(&body).is_err());
    }

    #[test]
    fn test_switch_state_round_trip() {
        assert_eq!("off".parse::<SwitchState>().unwrap(), SwitchState::Off);
        assert_eq!(SwitchState::On.to_string(), "on");
        assert!("toggle".parse::<SwitchState>().is_err());
        assert_eq!(serde_json::to_value(SwitchState::Off).unwrap(), json!("off"));
    }
}

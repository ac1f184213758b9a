//! Device directory abstraction and the cloud implementation.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::device::{parse_thing_list, Device, SwitchState};
use crate::error::{DevicesError, DevicesResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of device readings and switch control.
pub trait DeviceDirectory: Send + Sync {
    /// Every device visible to the account.
    fn list_devices(&self) -> BoxFuture<'_, DevicesResult<Vec<Device>>>;

    /// Turn a device's relay on or off.
    fn set_switch<'a>(&'a self, id: &'a str, state: SwitchState) -> BoxFuture<'a, DevicesResult<()>>;
}

/// Arc wrapper for DeviceDirectory trait objects.
pub type DynDeviceDirectory = Arc<dyn DeviceDirectory>;

#[derive(Debug, Serialize)]
struct SwitchParams {
    switch: SwitchState,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    #[serde(rename = "type")]
    item_type: u8,
    id: &'a str,
    params: SwitchParams,
}

/// REST client for the vendor cloud.
pub struct CloudDeviceDirectory {
    client: Client,
    base_url: String,
    access_token: String,
}

impl CloudDeviceDirectory {
    /// Create a client for a regional API base URL (e.g. `https://us-apia.coolkit.cc`).
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> DevicesResult<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(DevicesError::Config("access token is empty".to_string()));
        }
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_devices(&self) -> DevicesResult<Vec<Device>> {
        let url = self.url("/v2/device/thing");
        debug!(url = %url, "Fetching device list");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let body = read_envelope(response).await?;
        parse_thing_list(&body)
    }

    async fn post_switch(&self, id: &str, state: SwitchState) -> DevicesResult<()> {
        let request = StatusRequest {
            item_type: 1,
            id,
            params: SwitchParams { switch: state },
        };

        let response = self
            .client
            .post(self.url("/v2/device/thing/status"))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;
        read_envelope(response).await?;

        info!(device = id, switch = %state, "Device switch updated");
        Ok(())
    }
}

impl DeviceDirectory for CloudDeviceDirectory {
    fn list_devices(&self) -> BoxFuture<'_, DevicesResult<Vec<Device>>> {
        Box::pin(self.fetch_devices())
    }

    fn set_switch<'a>(&'a self, id: &'a str, state: SwitchState) -> BoxFuture<'a, DevicesResult<()>> {
        Box::pin(self.post_switch(id, state))
    }
}

/// Check HTTP status and the `error` code every cloud response carries.
async fn read_envelope(response: reqwest::Response) -> DevicesResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DevicesError::Api(format!("HTTP {status}: {body}")));
    }

    let body: Value = response.json().await?;
    match body.get("error").and_then(Value::as_i64) {
        Some(0) | None => Ok(body),
        Some(code) => {
            let msg = body.get("msg").and_then(Value::as_str).unwrap_or_default();
            Err(DevicesError::Api(format!("error {code}: {msg}")))
        }
    }
}

/// In-memory directory for testing.
#[derive(Debug, Default)]
pub struct MockDeviceDirectory {
    devices: parking_lot::Mutex<Vec<Device>>,
    switches: parking_lot::Mutex<Vec<(String, SwitchState)>>,
    fail_next: parking_lot::Mutex<Option<String>>,
}

impl MockDeviceDirectory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: parking_lot::Mutex::new(devices),
            ..Default::default()
        }
    }

    /// Replace the listed devices.
    pub fn set_devices(&self, devices: Vec<Device>) {
        *self.devices.lock() = devices;
    }

    /// Make the next `list_devices` call fail.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Recorded `set_switch` calls.
    pub fn switches(&self) -> Vec<(String, SwitchState)> {
        self.switches.lock().clone()
    }
}

impl DeviceDirectory for MockDeviceDirectory {
    fn list_devices(&self) -> BoxFuture<'_, DevicesResult<Vec<Device>>> {
        Box::pin(async move {
            if let Some(message) = self.fail_next.lock().take() {
                return Err(DevicesError::Api(message));
            }
            Ok(self.devices.lock().clone())
        })
    }

    fn set_switch<'a>(&'a self, id: &'a str, state: SwitchState) -> BoxFuture<'a, DevicesResult<()>> {
        Box::pin(async move {
            self.switches.lock().push((id.to_string(), state));
            if let Some(device) = self.devices.lock().iter_mut().find(|d| d.id == id) {
                device.switch = Some(state);
            }
            Ok(())
        })
    }
}

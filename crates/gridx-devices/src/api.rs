//! Operator REST routes for device control.
//!
//! - `GET /api/devices` lists every device on the account
//! - `POST /api/devices/{id}/status` with `{"params": {"switch": "on"}}`
//!
//! Any directory failure is a 500 with a short message; details go to the log.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::device::{Device, SwitchState};
use crate::directory::DynDeviceDirectory;
use crate::error::DevicesError;

/// Body of a switch request.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchRequest {
    pub params: SwitchParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchParams {
    pub switch: SwitchState,
}

/// Reply to an accepted switch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchReply {
    pub id: String,
    pub switch: SwitchState,
}

/// Routes backed by `directory`, ready to merge into the server router.
pub fn device_routes(directory: DynDeviceDirectory) -> Router {
    Router::new()
        .route("/api/devices", get(list_devices))
        .route("/api/devices/{id}/status", post(set_status))
        .with_state(directory)
}

fn failure(message: &'static str, e: DevicesError) -> Response {
    error!(error = %e, "{}", message);
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

async fn list_devices(State(directory): State<DynDeviceDirectory>) -> Response {
    match directory.list_devices().await {
        Ok(devices) => Json::<Vec<Device>>(devices).into_response(),
        Err(e) => failure("Failed to fetch devices.", e),
    }
}

async fn set_status(
    State(directory): State<DynDeviceDirectory>,
    Path(id): Path<String>,
    Json(request): Json<SwitchRequest>,
) -> Response {
    let switch = request.params.switch;
    match directory.set_switch(&id, switch).await {
        Ok(()) => {
            info!(device = %id, switch = %switch, "Operator switched device");
            Json(SwitchReply { id, switch }).into_response()
        }
        Err(e) => failure("Failed to toggle device.", e),
    }
}

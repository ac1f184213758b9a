//! Hub API types.
//!
//! These types are used for JSON serialization on the dashboard channel and
//! the REST endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gridx_core::SystemState;

use crate::store::StateSnapshot;

/// Dashboard channel message (tagged enum for type safety).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// Full system state, sent on connect and after every change.
    Update {
        /// When the snapshot was taken (ISO-8601).
        timestamp: DateTime<Utc>,
        /// Complete system state.
        data: SystemState,
    },
}

impl From<StateSnapshot> for DashboardMessage {
    fn from(snapshot: StateSnapshot) -> Self {
        Self::Update {
            timestamp: snapshot.generated_at,
            data: snapshot.state,
        }
    }
}

/// Liveness response for `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

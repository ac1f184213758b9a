//! Core domain types for the gridx telemetry hub.
//!
//! This crate is transport-free and holds everything that can be reasoned
//! about without a running server:
//! - `SystemState`: the pole/house/alert snapshot shared by the hub
//! - `PolePayload`, `HousePayload`: inbound telemetry with defaulting rules
//! - `AnalyticsEngine`: theft detection and predictive-maintenance risk
//! - `NodeKind`: the two hardware producers

pub mod analytics;
pub mod error;
pub mod node;
pub mod payload;
pub mod state;

pub use analytics::{
    round2, AnalyticsConfig, AnalyticsEngine, Evaluation, MaintenanceAssessment, TheftAssessment,
    HEALTHY_MESSAGE,
};
pub use error::{CoreError, CoreResult};
pub use node::NodeKind;
pub use payload::{DashboardCommand, HousePayload, HouseSensors, PolePayload, SET_RELAY_ACTION};
pub use state::{
    AlertState, AlertUpdate, HouseState, HouseUpdate, PoleState, PoleUpdate, Relays, StateSection,
    SystemState, RELAY_COUNT,
};

//! gridx-hub - Real-time telemetry hub for the smart-grid demo.
//!
//! Hardware nodes stream readings over WebSocket; the hub merges them into
//! one shared [`SystemState`](gridx_core::SystemState), re-derives theft and
//! maintenance alerts, and pushes the full snapshot to every dashboard.
//! Dashboards can switch house relays, which the hub relays to the house node.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   /ws/hardware/pole    ┌──────────────────────────────┐
//! │   Pole node   │ ─────────────────────▶ │        IngestService         │
//! └───────────────┘                        │                              │
//! ┌───────────────┐   /ws/hardware/house   │  StateStore  (RwLock state)  │
//! │  House node   │ ◀────────────────────▶ │  ConnectionRegistry          │
//! └───────────────┘      set_relay         │  AnalyticsEngine             │
//!                                          │  Broadcaster                 │
//! ┌───────────────┐   /ws/client           │                              │
//! │  Dashboards   │ ◀────────────────────▶ │                              │
//! └───────────────┘  update / set_relay    └──────────────────────────────┘
//! ```
//!
//! Every connection owns a bounded outbound queue drained by its own writer
//! task, so a slow dashboard only loses its own frames.
//!
//! # Usage
//!
//! ```ignore
//! use gridx_core::AnalyticsEngine;
//! use gridx_hub::{run_server, HubConfig, IngestService};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = IngestService::new(AnalyticsEngine::default());
//! run_server(service, HubConfig::default(), CancellationToken::new()).await?;
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;

pub use broadcast::{Broadcaster, PublishReport};
pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use ingest::{IngestService, RelayForward};
pub use registry::{ConnectionId, ConnectionRegistry, DeliveryError, ObserverHandle};
pub use server::{create_router, run_server, serve, serve_with, AppState, ConnectionLimiter};
pub use store::{StateSnapshot, StateStore};
pub use types::{DashboardMessage, StatusResponse};

//! gridx smart-grid service.
//!
//! Wires the pieces into one process:
//! - Telemetry hub (hardware ingest, shared state, dashboard broadcast)
//! - Optional device threshold monitor with operator alerts
//! - Logging, metrics and configuration

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};

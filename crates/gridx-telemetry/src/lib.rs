//! Prometheus metrics and structured logging for gridx.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus metrics for producer connectivity, ingest, fan-out and alerts
//! - Text exposition for the hub's `/metrics` endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{gather_text, Metrics};

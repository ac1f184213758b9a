//! Device backend error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DevicesError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Device API error: {0}")]
    Api(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type DevicesResult<T> = Result<T, DevicesError>;

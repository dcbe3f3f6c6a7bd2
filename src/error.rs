use std::sync::Arc;
use thiserror::Error;

/// Main error type for the cutoff tracker
#[derive(Error, Debug)]
pub enum TierwatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// One failed upstream fetch handed to every caller that waited on it
    #[error("{0}")]
    Shared(Arc<TierwatchError>),

    // Upstream data errors
    #[error("Invalid catalog data: {0}")]
    InvalidCatalog(String),

    // Forecast errors
    #[error("Forecast failed: {0}")]
    Forecast(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for TierwatchError
pub type Result<T> = std::result::Result<T, TierwatchError>;

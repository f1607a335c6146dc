//! Error types for feedpull.
//!
//! Centralized error handling using thiserror. Fetch failures reported by a
//! transport live in [`crate::transport::FetchError`]; they drive retries and
//! are only surfaced to callers through the `on_error` callback.

use thiserror::Error;

/// All error types that can cross the public API of feedpull.
#[derive(Debug, Error)]
pub enum FeedpullError {
    /// A request descriptor failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A recurring schedule was given unusable parameters.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A recurring schedule needs a request that carries a pull interval.
    #[error("Request has no pull interval: {0}")]
    MissingPullInterval(String),

    /// The pulling queue was started outside of a tokio runtime.
    #[error("No tokio runtime available to drive the pulling queue")]
    NoRuntime,

    /// A dynamic request supplier failed to produce requests.
    #[error("Supplier error: {0}")]
    Supplier(String),

    /// Configuration error, including an HTTP client that cannot be built.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for feedpull operations.
pub type Result<T> = std::result::Result<T, FeedpullError>;

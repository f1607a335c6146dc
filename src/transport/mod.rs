//! Transport seam between the scheduler and the network.
//!
//! The scheduler never talks HTTP itself. It hands each admitted request to a
//! `FeedTransport` and expects exactly one outcome per call: the body bytes or
//! a `FetchError`. The retry and in-flight bookkeeping depend on that.

mod http;
mod stats;

pub use http::{HttpTransport, HttpTransportConfig};
pub use stats::PullStatistics;

use crate::domain::FeedRequest;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Async "fetch the bytes for this request" capability.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Fetch the body for `request`.
    async fn fetch(&self, request: &FeedRequest) -> Result<Vec<u8>, FetchError>;

    /// Release transport resources. Called once when the queue shuts down.
    async fn shutdown(&self) {}
}

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Timeouts are expected under load and logged quieter than other failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

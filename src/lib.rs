//! feedpull - rate-limited, prioritised and deduplicated pulling of remote data feeds.
//!
//! Callers describe fetches as `FeedRequest`s and hand them to a `PullQueue`,
//! directly or through recurring schedules built by `PullingScheduler`. The
//! queue keeps outbound traffic under a requests-per-second ceiling, serves
//! higher priorities first, never has two fetches in flight for the same
//! dedup key, and retries failures with a per-request backoff policy.

pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod scheduler;
pub mod transport;

pub use error::{FeedpullError, Result};

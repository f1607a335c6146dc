//! Pulling scheduler: rate-limited, prioritised, deduplicated feed fetching.
//!
//! This module provides:
//! - **RateLimiter**: sliding-window admission, at most N requests per trailing second.
//! - **InFlightTracker**: dedup bookkeeping of requests awaiting a response or a retry.
//! - **PullQueue**: the shared priority queue and its drain loop.
//! - **Retry controller**: per-request attempt loop with pluggable backoff.
//! - **PullingScheduler**: one-shot, recurring and bounded schedules.
//! - **ScheduleRegistry**: keyed store of cancellable schedule handles.
//!
//! # Architecture
//!
//! 1. Callers (or schedule timers) enqueue a `FeedRequest` with two callbacks
//! 2. The queue drops duplicates, pushes the rest and drains while the limiter admits
//! 3. Each dispatched request runs on its own task: fetch, then retry or deliver
//! 4. A background tick keeps draining so rate-limited requests are not starved.
//!
//! # Example
//!
//! ```ignore
//! use feedpull::config::Config;
//! use feedpull::domain::{FeedRequest, FeedRequestConfig, callbacks};
//! use feedpull::scheduler::{PullQueue, PullingScheduler, ScheduleRegistry};
//! use feedpull::transport::{HttpTransport, HttpTransportConfig};
//!
//! let config = Config::load(None)?;
//! let transport = Arc::new(HttpTransport::new(HttpTransportConfig::from(&config.http))?);
//! let scheduler = PullingScheduler::new(PullQueue::start(&config, transport)?);
//! let registry = ScheduleRegistry::new();
//!
//! let request = FeedRequest::new(
//!     FeedRequestConfig::new("fixtures", "https://feeds.example/fixtures")
//!         .with_pull_interval(Duration::from_secs(30)),
//! )?;
//! let handle = scheduler.schedule_fixed(
//!     "fixtures",
//!     request,
//!     callbacks::on_success(|result| println!("{} bytes", result.data.len())),
//!     callbacks::noop_error(),
//!     Duration::ZERO,
//! )?;
//! registry.set(handle);
//! ```

mod handle;
mod manager;
mod queue;
mod rate_limit;
mod registry;
mod retry;
mod tracker;

pub use handle::{ScheduleHandle, ScheduleKind};
pub use manager::{PullingScheduler, RequestSupplier};
pub use queue::{Enqueued, PullQueue};
pub use rate_limit::{RateLimiter, WINDOW};
pub use registry::ScheduleRegistry;
pub use tracker::{DedupKeyFn, InFlightTracker, TrackedEntry};

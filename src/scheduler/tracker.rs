//! In-flight bookkeeping for deduplication.
//!
//! Two independent maps keyed by a dedup key: requests awaiting a response
//! and requests awaiting a retry. Key-level atomicity is all that is needed,
//! so both are plain concurrent maps with no outer lock.

use crate::domain::{FeedRequest, Priority, default_dedup_key};
use crate::error::Result;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Derives the dedup key of a request.
pub type DedupKeyFn = Arc<dyn Fn(&FeedRequest) -> Result<String> + Send + Sync>;

/// One tracked request.
#[derive(Debug, Clone)]
pub struct TrackedEntry {
    pub key: String,
    pub priority: Priority,
    pub tracked_since: Instant,
}

pub struct InFlightTracker {
    awaiting_response: DashMap<String, TrackedEntry>,
    awaiting_retry: DashMap<String, TrackedEntry>,
    dedup_key: DedupKeyFn,
}

impl InFlightTracker {
    /// Tracker keyed by `{url}_{PRIORITY}`.
    pub fn new() -> Self {
        Self::with_dedup_key(Arc::new(|request: &FeedRequest| -> Result<String> { Ok(default_dedup_key(request)) }))
    }

    /// Tracker keyed by `dedup_key`.
    pub fn with_dedup_key(dedup_key: DedupKeyFn) -> Self {
        Self {
            awaiting_response: DashMap::new(),
            awaiting_retry: DashMap::new(),
            dedup_key,
        }
    }

    /// Dedup key for `request`; falls back to the raw url if the key function fails.
    pub fn key_of(&self, request: &FeedRequest) -> String {
        match catch_unwind(AssertUnwindSafe(|| (self.dedup_key)(request))) {
            Ok(Ok(key)) => key,
            Ok(Err(e)) => {
                warn!(request_id = %request.id(), error = %e, "Dedup key function failed, using url");
                request.url().to_string()
            }
            Err(_) => {
                warn!(request_id = %request.id(), "Dedup key function panicked, using url");
                request.url().to_string()
            }
        }
    }

    fn entry_for(&self, request: &FeedRequest) -> TrackedEntry {
        TrackedEntry {
            key: self.key_of(request),
            priority: request.priority(),
            tracked_since: Instant::now(),
        }
    }

    /// True if a request with the same dedup key is queued or being fetched.
    pub fn is_awaiting_response(&self, request: &FeedRequest) -> bool {
        self.awaiting_response.contains_key(&self.key_of(request))
    }

    /// Mark `request` as awaiting a response.
    pub fn track(&self, request: &FeedRequest) {
        let entry = self.entry_for(request);
        self.awaiting_response.insert(entry.key.clone(), entry);
        debug!(
            request_id = %request.id(),
            awaiting = self.awaiting_response.len(),
            "InFlightTracker::track: awaiting response"
        );
    }

    /// Clear the awaiting-response entry for `request`'s key.
    pub fn untrack_processed(&self, request: &FeedRequest) {
        self.awaiting_response.remove(&self.key_of(request));
        debug!(
            request_id = %request.id(),
            awaiting = self.awaiting_response.len(),
            "InFlightTracker::untrack_processed: removed"
        );
    }

    /// True if a request with the same dedup key is waiting out a backoff.
    pub fn is_awaiting_retry(&self, request: &FeedRequest) -> bool {
        self.awaiting_retry.contains_key(&self.key_of(request))
    }

    /// Mark `request` as awaiting a retry.
    pub fn track_retry(&self, request: &FeedRequest) {
        let entry = self.entry_for(request);
        self.awaiting_retry.insert(entry.key.clone(), entry);
    }

    /// Clear the awaiting-retry entry for `request`'s key.
    pub fn untrack_retried(&self, request: &FeedRequest) {
        self.awaiting_retry.remove(&self.key_of(request));
    }

    /// Entry currently awaiting a response under `request`'s key.
    pub fn get_tracked(&self, request: &FeedRequest) -> Option<TrackedEntry> {
        self.awaiting_response.get(&self.key_of(request)).map(|e| e.value().clone())
    }

    /// True if `request` has been awaiting a response for at least `threshold`.
    pub fn is_stale(&self, request: &FeedRequest, threshold: Duration) -> bool {
        self.get_tracked(request)
            .map(|entry| entry.tracked_since.elapsed() >= threshold)
            .unwrap_or(false)
    }

    /// Number of requests awaiting a response, per priority.
    pub fn count_by_priority(&self) -> BTreeMap<Priority, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.awaiting_response.iter() {
            *counts.entry(entry.priority).or_insert(0) += 1;
        }
        counts
    }

    /// Number of keys awaiting a response.
    pub fn awaiting_response_count(&self) -> usize {
        self.awaiting_response.len()
    }

    /// Number of keys awaiting a retry.
    pub fn awaiting_retry_count(&self) -> usize {
        self.awaiting_retry.len()
    }
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InFlightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightTracker")
            .field("awaiting_response", &self.awaiting_response.len())
            .field("awaiting_retry", &self.awaiting_retry.len())
            .finish()
    }
}

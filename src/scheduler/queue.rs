//! Priority dispatch queue.
//!
//! One shared heap of pending requests ordered by priority, then creation
//! time, then arrival. Enqueue and the "pop while the limiter admits" drain run
//! under the same mutex so two callers can never both dispatch the same head.
//! A background tick re-runs the drain so requests that lost the rate-limit
//! race are picked up without new arrivals. Network calls never run under the
//! lock; each dispatched request gets its own task (see `retry`).

use super::rate_limit::RateLimiter;
use super::retry;
use super::tracker::{DedupKeyFn, InFlightTracker};
use crate::config::{Config, QueueConfig};
use crate::domain::{FeedRequest, OnError, OnSuccess};
use crate::error::{FeedpullError, Result};
use crate::transport::{FeedTransport, PullStatistics};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of `PullQueue::enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Accepted; dispatched now or on a later drain.
    Queued,
    /// Same dedup key already awaiting a response; dropped.
    Duplicate,
    /// The queue has been shut down; dropped.
    Closed,
}

/// A request waiting in the heap together with its callbacks.
pub(crate) struct QueuedRequest {
    pub(crate) request: FeedRequest,
    pub(crate) on_success: OnSuccess,
    pub(crate) on_error: OnError,
    pub(crate) enqueued_at: Instant,
    seq: u64,
}

impl QueuedRequest {
    fn sort_key(&self) -> (u8, chrono::DateTime<chrono::Utc>, u64) {
        (self.request.priority().order(), self.request.created_at(), self.seq)
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; the smallest key must come out first
        other.sort_key().cmp(&self.sort_key())
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedRequest>,
    next_seq: u64,
}

/// Result of `Shared::claim_retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryClaim {
    Claimed,
    KeyBusy,
    RateLimited,
}

/// State shared by the queue handle, the tick task and every dispatched request.
pub(crate) struct Shared {
    state: Mutex<QueueState>,
    pub(crate) limiter: RateLimiter,
    pub(crate) tracker: InFlightTracker,
    pub(crate) stats: PullStatistics,
    pub(crate) transport: Arc<dyn FeedTransport>,
    pub(crate) settings: QueueConfig,
    pub(crate) runtime: Handle,
    pub(crate) shutdown: CancellationToken,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            error!("PullQueue: state mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Re-admit a retry of `request` if no other attempt holds its dedup key.
    ///
    /// The key check, the limiter slot and the tracking happen under the state
    /// lock, so a concurrent `enqueue` of the same key cannot slip in between.
    pub(crate) fn claim_retry(&self, request: &FeedRequest) -> RetryClaim {
        let _state = self.lock_state();
        if self.tracker.is_awaiting_response(request) && !self.tracker.is_stale(request, self.settings.stale_after()) {
            return RetryClaim::KeyBusy;
        }
        if !self.limiter.admit(Instant::now()) {
            return RetryClaim::RateLimited;
        }
        self.tracker.track(request);
        RetryClaim::Claimed
    }

    fn drain(self: &Arc<Self>) {
        let mut state = self.lock_state();
        self.drain_locked(&mut state);
    }

    fn drain_locked(self: &Arc<Self>, state: &mut QueueState) {
        while !state.heap.is_empty() {
            if self.shutdown.is_cancelled() || !self.limiter.admit(Instant::now()) {
                break;
            }
            if let Some(queued) = state.heap.pop() {
                self.dispatch(queued);
            }
        }
    }

    fn dispatch(self: &Arc<Self>, queued: QueuedRequest) {
        let waited = queued.enqueued_at.elapsed();
        if waited > self.settings.queue_wait_warning() {
            warn!(
                request_id = %queued.request.id(),
                url = %queued.request.url_for_logging(),
                waited_secs = waited.as_secs(),
                "Request waited too long in queue"
            );
        }
        debug!(
            request_id = %queued.request.id(),
            priority = %queued.request.priority(),
            "PullQueue::dispatch: dispatching"
        );
        self.runtime.spawn(retry::run_attempts(self.clone(), queued));
    }
}

/// Shared, rate-limited, deduplicating dispatch queue. Cheap to clone.
#[derive(Clone)]
pub struct PullQueue {
    shared: Arc<Shared>,
}

impl PullQueue {
    /// Start a queue on the current tokio runtime.
    pub fn start(config: &Config, transport: Arc<dyn FeedTransport>) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| FeedpullError::NoRuntime)?;
        Ok(Self::start_on(handle, config, transport, None))
    }

    /// Start a queue on `handle`, optionally with a custom dedup key function.
    pub fn start_on(
        handle: Handle,
        config: &Config,
        transport: Arc<dyn FeedTransport>,
        dedup_key: Option<DedupKeyFn>,
    ) -> Self {
        let tracker = match dedup_key {
            Some(f) => InFlightTracker::with_dedup_key(f),
            None => InFlightTracker::new(),
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            limiter: RateLimiter::new(config.rate_limit.effective_limit()),
            tracker,
            stats: PullStatistics::new(),
            transport,
            settings: config.queue.clone(),
            runtime: handle.clone(),
            shutdown: CancellationToken::new(),
        });

        info!(
            requests_per_second = shared.limiter.limit(),
            tick_ms = shared.settings.tick_interval().as_millis() as u64,
            "PullQueue started"
        );

        handle.spawn(run_tick(Arc::downgrade(&shared), shared.settings.clone(), shared.shutdown.clone()));

        Self { shared }
    }

    /// Submit a request. Never fails; duplicates and post-shutdown submissions are dropped.
    pub fn enqueue(&self, request: FeedRequest, on_success: OnSuccess, on_error: OnError) -> Enqueued {
        let mut state = self.shared.lock_state();

        // Checked under the lock; `shutdown` empties the heap under the same lock
        if self.shared.shutdown.is_cancelled() {
            warn!(request_id = %request.id(), "PullQueue::enqueue: queue is shut down, dropping request");
            return Enqueued::Closed;
        }

        let tracker = &self.shared.tracker;
        if tracker.is_awaiting_response(&request) {
            if !tracker.is_stale(&request, self.shared.settings.stale_after()) {
                debug!(
                    request_id = %request.id(),
                    url = %request.url_for_logging(),
                    "PullQueue::enqueue: already awaiting response, dropping duplicate"
                );
                return Enqueued::Duplicate;
            }
            warn!(
                request_id = %request.id(),
                url = %request.url_for_logging(),
                "Request tracked as awaiting response for too long, submitting again"
            );
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        tracker.track(&request);
        debug!(request_id = %request.id(), seq, "PullQueue::enqueue: queued");
        state.heap.push(QueuedRequest {
            request,
            on_success,
            on_error,
            enqueued_at: Instant::now(),
            seq,
        });

        self.shared.drain_locked(&mut state);
        Enqueued::Queued
    }

    /// Dispatch as many queued requests as the limiter admits right now.
    pub fn drain(&self) {
        self.shared.drain();
    }

    /// Requests waiting in the heap (not yet dispatched).
    pub fn pending(&self) -> usize {
        self.shared.lock_state().heap.len()
    }

    /// In-flight bookkeeping shared with every dispatched request.
    pub fn tracker(&self) -> &InFlightTracker {
        &self.shared.tracker
    }

    /// The requests-per-second limiter guarding every dispatch and retry.
    pub fn limiter(&self) -> &RateLimiter {
        &self.shared.limiter
    }

    /// Last success and failure times per feed name.
    pub fn statistics(&self) -> &PullStatistics {
        &self.shared.stats
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }

    /// Token cancelled when the queue shuts down.
    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shared.shutdown
    }

    /// True once `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Stop the tick, drop queued requests, abandon pending retries and shut the transport down.
    ///
    /// Fetches already in flight run to completion and still deliver their callbacks.
    pub async fn shutdown(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        self.shared.shutdown.cancel();

        let dropped: Vec<QueuedRequest> = {
            let mut state = self.shared.lock_state();
            std::mem::take(&mut state.heap).into_vec()
        };
        for queued in &dropped {
            self.shared.tracker.untrack_processed(&queued.request);
        }

        info!(dropped = dropped.len(), "PullQueue shutting down");
        self.shared.transport.shutdown().await;
    }
}

impl std::fmt::Debug for PullQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullQueue")
            .field("pending", &self.pending())
            .field("limit", &self.shared.limiter.limit())
            .field("tracker", &self.shared.tracker)
            .finish()
    }
}

async fn run_tick(shared: Weak<Shared>, settings: QueueConfig, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(settings.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match shared.upgrade() {
                    Some(shared) => shared.drain(),
                    None => break,
                }
            }
        }
    }
    debug!("PullQueue tick stopped");
}

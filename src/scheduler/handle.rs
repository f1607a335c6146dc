//! Cancellable handle for a recurring or bounded schedule.

use crate::domain::FeedRequest;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a schedule enqueues on each firing.
#[derive(Debug, Clone)]
pub enum ScheduleKind {
    /// The same request every interval.
    Fixed(FeedRequest),
    /// The same list of requests every interval.
    FixedGroup(Vec<FeedRequest>),
    /// Requests produced fresh by a supplier on every firing.
    Dynamic,
    /// One request, enqueued `repeats + 1` times then stopped.
    Bounded { request: FeedRequest, repeats: u32 },
}

/// Handle to a running schedule. Clones share the same cancellation state.
#[derive(Debug, Clone)]
pub struct ScheduleHandle<K> {
    key: K,
    interval: Duration,
    kind: ScheduleKind,
    token: CancellationToken,
}

impl<K> ScheduleHandle<K> {
    /// Wrap `token`; the scheduler passes a child of the queue's shutdown token.
    pub(crate) fn new(key: K, interval: Duration, kind: ScheduleKind, token: CancellationToken) -> Self {
        Self {
            key,
            interval,
            kind,
            token,
        }
    }

    /// Key the schedule was registered under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Time between firings.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// What the schedule enqueues on each firing.
    pub fn kind(&self) -> &ScheduleKind {
        &self.kind
    }

    /// Stop future firings. A fetch already dispatched still completes.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled, finished, or stopped by queue shutdown.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the schedule is cancelled or has run to completion.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

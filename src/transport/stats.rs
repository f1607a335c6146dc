//! Last-pull bookkeeping per feed category.

use crate::domain::FeedName;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Time of the last successful and last failed attempt for each feed name.
#[derive(Debug, Default)]
pub struct PullStatistics {
    last_success: DashMap<FeedName, DateTime<Utc>>,
    last_failure: DashMap<FeedName, DateTime<Utc>>,
}

impl PullStatistics {
    /// Empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful pull for `name` at the current time.
    pub fn record_success(&self, name: &FeedName) {
        self.last_success.insert(name.clone(), Utc::now());
    }

    /// Record a failed attempt for `name` at the current time.
    pub fn record_failure(&self, name: &FeedName) {
        self.last_failure.insert(name.clone(), Utc::now());
    }

    /// Time of the last successful pull for `name`.
    pub fn last_success(&self, name: &FeedName) -> Option<DateTime<Utc>> {
        self.last_success.get(name).map(|t| *t)
    }

    /// Time of the last failed attempt for `name`.
    pub fn last_failure(&self, name: &FeedName) -> Option<DateTime<Utc>> {
        self.last_failure.get(name).map(|t| *t)
    }
}

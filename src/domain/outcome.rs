//! Pull outcomes and the callbacks that receive them.

use super::FeedRequest;
use crate::transport::FetchError;
use std::sync::Arc;

/// Bytes fetched for a request.
#[derive(Debug, Clone)]
pub struct PullResult {
    pub request: FeedRequest,
    pub data: Vec<u8>,
}

/// Terminal failure of a request after its retry budget ran out.
#[derive(Debug, Clone)]
pub struct PullFailure {
    pub request: FeedRequest,
    /// Cause of the last attempt.
    pub error: FetchError,
}

/// Called once per successful pull.
pub type OnSuccess = Arc<dyn Fn(PullResult) + Send + Sync>;

/// Called once per request whose retries are exhausted.
pub type OnError = Arc<dyn Fn(PullFailure) + Send + Sync>;

/// Helpers for building callbacks.
pub mod callbacks {
    use super::*;

    /// Wrap a closure as an `OnSuccess` callback.
    pub fn on_success<F>(f: F) -> OnSuccess
    where
        F: Fn(PullResult) + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    /// Wrap a closure as an `OnError` callback.
    pub fn on_error<F>(f: F) -> OnError
    where
        F: Fn(PullFailure) + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    /// Success callback that ignores the result.
    pub fn noop_success() -> OnSuccess {
        Arc::new(|_| {})
    }

    /// Error callback that ignores the failure.
    pub fn noop_error() -> OnError {
        Arc::new(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedRequestConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callbacks_invoke_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let cb = callbacks::on_success(move |result: PullResult| {
            seen.fetch_add(result.data.len(), Ordering::SeqCst);
        });

        let request = FeedRequest::new(FeedRequestConfig::new("f", "http://feeds.test")).unwrap();
        cb(PullResult {
            request,
            data: b"abc".to_vec(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failure_carries_cause() {
        let request = FeedRequest::new(FeedRequestConfig::new("f", "http://feeds.test")).unwrap();
        let failure = PullFailure {
            request,
            error: FetchError::Transport("connection reset".to_string()),
        };
        callbacks::noop_error()(failure.clone());
        assert!(failure.error.to_string().contains("connection reset"));
    }
}

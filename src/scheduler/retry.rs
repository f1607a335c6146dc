//! Per-request attempt loop: fetch, then retry with backoff until success or budget exhaustion.
//!
//! A retry never bypasses the rate limiter. After the backoff delay the loop
//! polls at the tick cadence until the limiter admits it again. A retry also
//! waits while a newer submission for the same dedup key is in flight, so two
//! attempts for one key never overlap.

use super::queue::{QueuedRequest, RetryClaim, Shared};
use crate::domain::{FeedRequest, PullFailure, PullResult};
use crate::transport::FetchError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub(crate) async fn run_attempts(shared: Arc<Shared>, queued: QueuedRequest) {
    let QueuedRequest {
        request,
        on_success,
        on_error,
        enqueued_at,
        ..
    } = queued;

    let mut retries: u32 = 0;
    loop {
        match fetch(&shared, &request).await {
            Ok(data) => {
                shared.tracker.untrack_processed(&request);
                shared.stats.record_success(request.name());
                info!(
                    request_id = %request.id(),
                    url = %request.url_for_logging(),
                    retries,
                    elapsed_secs = enqueued_at.elapsed().as_secs_f64(),
                    "Pulled feed"
                );
                let result = PullResult { request, data };
                if catch_unwind(AssertUnwindSafe(|| on_success(result))).is_err() {
                    error!("on_success callback panicked");
                }
                return;
            }
            Err(cause) => {
                shared.stats.record_failure(request.name());
                shared.tracker.track_retry(&request);
                shared.tracker.untrack_processed(&request);

                if retries >= request.max_retries() {
                    shared.tracker.untrack_retried(&request);
                    warn!(
                        request_id = %request.id(),
                        url = %request.url_for_logging(),
                        attempts = retries + 1,
                        error = %cause,
                        "Giving up on request, retries exhausted"
                    );
                    let failure = PullFailure { request, error: cause };
                    if catch_unwind(AssertUnwindSafe(|| on_error(failure))).is_err() {
                        error!("on_error callback panicked");
                    }
                    return;
                }

                retries += 1;
                let delay = request.backoff().delay(&request, retries);
                if cause.is_timeout() {
                    info!(request_id = %request.id(), retry = retries, delay_ms = delay.as_millis() as u64, error = %cause, "Retrying request");
                } else {
                    warn!(request_id = %request.id(), retry = retries, delay_ms = delay.as_millis() as u64, error = %cause, "Retrying request");
                }

                if !wait_for_admission(&shared, &request, delay).await {
                    shared.tracker.untrack_retried(&request);
                    debug!(request_id = %request.id(), "run_attempts: shutdown while waiting to retry");
                    return;
                }
                shared.tracker.untrack_retried(&request);
            }
        }
    }
}

/// One transport call, bounded by the configured fetch timeout.
///
/// Runs on its own task so a panicking transport still yields exactly one outcome.
async fn fetch(shared: &Arc<Shared>, request: &FeedRequest) -> Result<Vec<u8>, FetchError> {
    let transport = shared.transport.clone();
    let owned = request.clone();
    let mut call = shared.runtime.spawn(async move { transport.fetch(&owned).await });

    let joined = match shared.settings.fetch_timeout() {
        Some(limit) => match tokio::time::timeout(limit, &mut call).await {
            Ok(joined) => joined,
            Err(_) => {
                call.abort();
                return Err(FetchError::Timeout(limit));
            }
        },
        None => call.await,
    };

    joined.unwrap_or_else(|e| {
        error!(request_id = %request.id(), error = %e, "Transport task failed");
        Err(FetchError::Transport(format!("transport task failed: {}", e)))
    })
}

/// Sleep `delay`, then poll every tick until the retry is claimed. False on shutdown.
///
/// On true the request is tracked as awaiting a response again.
async fn wait_for_admission(shared: &Shared, request: &FeedRequest, delay: Duration) -> bool {
    tokio::select! {
        _ = shared.shutdown.cancelled() => return false,
        _ = tokio::time::sleep(delay) => {}
    }

    let tick = shared.settings.tick_interval();
    let mut reported_busy = false;
    loop {
        if shared.shutdown.is_cancelled() {
            return false;
        }
        match shared.claim_retry(request) {
            RetryClaim::Claimed => return true,
            RetryClaim::KeyBusy if !reported_busy => {
                debug!(request_id = %request.id(), "wait_for_admission: key held by a newer submission, waiting");
                reported_busy = true;
            }
            RetryClaim::KeyBusy | RetryClaim::RateLimited => {}
        }
        tokio::select! {
            _ = shared.shutdown.cancelled() => return false,
            _ = tokio::time::sleep(tick) => {}
        }
    }
}

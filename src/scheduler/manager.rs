//! Recurring schedules on top of the pulling queue.
//!
//! Every schedule is a task on the queue's runtime that enqueues on a timer
//! until its handle is cancelled. Handle tokens are children of the queue's
//! shutdown token, so shutting the queue down stops every schedule too.
//! Enqueueing goes through the normal queue path, so a firing whose previous
//! fetch is still in flight is deduplicated.

use super::handle::{ScheduleHandle, ScheduleKind};
use super::queue::{Enqueued, PullQueue};
use crate::domain::{FeedRequest, OnError, OnSuccess};
use crate::error::{FeedpullError, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

// About 30 years, the same cap tokio applies to sleeps
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Produces the requests for one firing of a dynamic schedule.
pub type RequestSupplier = Arc<dyn Fn() -> Result<Vec<FeedRequest>> + Send + Sync>;

/// Builds one-shot, recurring and bounded pulls.
#[derive(Debug, Clone)]
pub struct PullingScheduler {
    queue: PullQueue,
}

impl PullingScheduler {
    /// Scheduler submitting into `queue`.
    pub fn new(queue: PullQueue) -> Self {
        Self { queue }
    }

    /// The queue every schedule enqueues into.
    pub fn queue(&self) -> &PullQueue {
        &self.queue
    }

    /// Enqueue `request` once, immediately.
    pub fn pull_once(&self, request: FeedRequest, on_success: OnSuccess, on_error: OnError) -> Enqueued {
        debug!(request_id = %request.id(), "PullingScheduler::pull_once: called");
        self.queue.enqueue(request, on_success, on_error)
    }

    /// Enqueue `request` every `request.pull_interval()`, first after `initial_delay`.
    pub fn schedule_fixed<K>(
        &self,
        key: K,
        request: FeedRequest,
        on_success: OnSuccess,
        on_error: OnError,
        initial_delay: Duration,
    ) -> Result<ScheduleHandle<K>> {
        let interval = required_interval(&request)?;
        debug!(request_id = %request.id(), interval_ms = interval.as_millis() as u64, "PullingScheduler::schedule_fixed: called");

        let handle = ScheduleHandle::new(key, interval, ScheduleKind::Fixed(request.clone()), self.schedule_token());
        let queue = self.queue.clone();
        self.spawn_recurring(handle.token(), initial_delay, interval, move || {
            queue.enqueue(request.clone(), on_success.clone(), on_error.clone());
        });
        Ok(handle)
    }

    /// Enqueue every request of a static list each `interval`.
    pub fn schedule_fixed_group<K>(
        &self,
        key: K,
        requests: Vec<FeedRequest>,
        on_success: OnSuccess,
        on_error: OnError,
        interval: Duration,
        initial_delay: Duration,
    ) -> Result<ScheduleHandle<K>> {
        check_interval(interval)?;
        debug!(requests = requests.len(), interval_ms = interval.as_millis() as u64, "PullingScheduler::schedule_fixed_group: called");

        let handle = ScheduleHandle::new(key, interval, ScheduleKind::FixedGroup(requests.clone()), self.schedule_token());
        let queue = self.queue.clone();
        self.spawn_recurring(handle.token(), initial_delay, interval, move || {
            for request in &requests {
                queue.enqueue(request.clone(), on_success.clone(), on_error.clone());
            }
        });
        Ok(handle)
    }

    /// Call `supplier` each `interval` and enqueue whatever it returns.
    ///
    /// A failing or panicking supplier contributes nothing for that firing; the schedule keeps running.
    pub fn schedule_dynamic<K>(
        &self,
        key: K,
        supplier: RequestSupplier,
        on_success: OnSuccess,
        on_error: OnError,
        interval: Duration,
        initial_delay: Duration,
    ) -> Result<ScheduleHandle<K>> {
        check_interval(interval)?;
        debug!(interval_ms = interval.as_millis() as u64, "PullingScheduler::schedule_dynamic: called");

        let handle = ScheduleHandle::new(key, interval, ScheduleKind::Dynamic, self.schedule_token());
        let queue = self.queue.clone();
        self.spawn_recurring(handle.token(), initial_delay, interval, move || {
            let requests = match catch_unwind(AssertUnwindSafe(|| supplier())) {
                Ok(Ok(requests)) => requests,
                Ok(Err(e)) => {
                    warn!(error = %e, "Request supplier failed, nothing to enqueue this round");
                    return;
                }
                Err(_) => {
                    error!("Request supplier panicked, nothing to enqueue this round");
                    return;
                }
            };
            for request in requests {
                queue.enqueue(request, on_success.clone(), on_error.clone());
            }
        });
        Ok(handle)
    }

    /// Enqueue `request` after `initial_delay`, then `repeats` more times, one
    /// pull interval apart. The handle reports cancelled once the last enqueue happened.
    pub fn pull_n_times<K>(
        &self,
        key: K,
        request: FeedRequest,
        on_success: OnSuccess,
        on_error: OnError,
        repeats: u32,
        initial_delay: Duration,
    ) -> Result<ScheduleHandle<K>> {
        let interval = required_interval(&request)?;
        debug!(request_id = %request.id(), repeats, "PullingScheduler::pull_n_times: called");

        let handle = ScheduleHandle::new(
            key,
            interval,
            ScheduleKind::Bounded {
                request: request.clone(),
                repeats,
            },
            self.schedule_token(),
        );
        let token = handle.token();
        let queue = self.queue.clone();

        self.queue.runtime().spawn(async move {
            let mut delay = initial_delay;
            for _ in 0..=repeats {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                queue.enqueue(request.clone(), on_success.clone(), on_error.clone());
                delay = interval;
            }
            debug!(request_id = %request.id(), "pull_n_times: all pulls enqueued");
            token.cancel();
        });

        Ok(handle)
    }

    fn schedule_token(&self) -> CancellationToken {
        self.queue.shutdown_token().child_token()
    }

    fn spawn_recurring<F>(&self, token: CancellationToken, initial_delay: Duration, interval: Duration, mut fire: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.queue.runtime().spawn(async move {
            let mut ticker = tokio::time::interval_at(deadline_after(initial_delay), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => fire(),
                }
            }
            debug!("Recurring schedule stopped");
        });
    }
}

/// `now + delay`, saturating to a far-future instant instead of overflowing.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

fn required_interval(request: &FeedRequest) -> Result<Duration> {
    let interval = request
        .pull_interval()
        .ok_or_else(|| FeedpullError::MissingPullInterval(request.basic_info()))?;
    check_interval(interval)?;
    Ok(interval)
}

fn check_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(FeedpullError::InvalidSchedule("interval must be positive".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{FeedRequestConfig, callbacks};
    use crate::transport::{FeedTransport, FetchError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recording {
        urls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn count(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FeedTransport for Recording {
        async fn fetch(&self, request: &FeedRequest) -> std::result::Result<Vec<u8>, FetchError> {
            self.urls.lock().unwrap().push(request.url().to_string());
            Ok(Vec::new())
        }
    }

    fn scheduler() -> (PullingScheduler, Arc<Recording>) {
        let transport = Arc::new(Recording::default());
        let queue = PullQueue::start(&Config::default(), transport.clone()).unwrap();
        (PullingScheduler::new(queue), transport)
    }

    fn recurring(url: &str, every: Duration) -> FeedRequest {
        FeedRequest::new(FeedRequestConfig::new("f", url).with_pull_interval(every)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fixed_fires_every_interval() {
        let (scheduler, transport) = scheduler();
        let handle = scheduler
            .schedule_fixed(
                "fixtures",
                recurring("http://feeds.test/a", Duration::from_secs(10)),
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(handle.interval(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.count(), 0);

        // Fires at 1s, 11s, 21s
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(transport.count(), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fixed_requires_interval() {
        let (scheduler, _) = scheduler();
        let request = FeedRequest::new(FeedRequestConfig::new("f", "http://feeds.test/a")).unwrap();
        let err = scheduler
            .schedule_fixed("k", request, callbacks::noop_success(), callbacks::noop_error(), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, FeedpullError::MissingPullInterval(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fixed_group_enqueues_all() {
        let (scheduler, transport) = scheduler();
        let requests = vec![
            recurring("http://feeds.test/a", Duration::from_secs(5)),
            recurring("http://feeds.test/b", Duration::from_secs(5)),
        ];
        let handle = scheduler
            .schedule_fixed_group(
                "group",
                requests,
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::from_secs(5),
                Duration::ZERO,
            )
            .unwrap();
        assert!(matches!(handle.kind(), ScheduleKind::FixedGroup(reqs) if reqs.len() == 2));

        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(transport.count(), 4);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fixed_group_rejects_zero_interval() {
        let (scheduler, _) = scheduler();
        let err = scheduler
            .schedule_fixed_group(
                "group",
                Vec::new(),
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::ZERO,
                Duration::ZERO,
            )
            .unwrap_err();
        assert!(matches!(err, FeedpullError::InvalidSchedule(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_dynamic_calls_supplier_each_firing() {
        let (scheduler, transport) = scheduler();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let supplier: RequestSupplier = Arc::new(move || -> Result<Vec<FeedRequest>> {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                FeedRequest::new(FeedRequestConfig::new("live", format!("http://feeds.test/live?ts={}", n))).unwrap(),
            ])
        });

        let handle = scheduler
            .schedule_dynamic(
                "live",
                supplier,
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::from_secs(2),
                Duration::ZERO,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(4100)).await;
        handle.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let urls = transport.urls.lock().unwrap().clone();
        assert_eq!(urls.len(), 3);
        assert!(urls[2].ends_with("ts=2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_dynamic_survives_supplier_failures() {
        let (scheduler, transport) = scheduler();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let supplier: RequestSupplier = Arc::new(move || -> Result<Vec<FeedRequest>> {
            match seen.fetch_add(1, Ordering::SeqCst) {
                0 => Err(FeedpullError::Supplier("upstream index unavailable".to_string())),
                1 => panic!("supplier bug"),
                n => Ok(vec![
                    FeedRequest::new(FeedRequestConfig::new("live", format!("http://feeds.test/{}", n))).unwrap(),
                ]),
            }
        });

        let handle = scheduler
            .schedule_dynamic(
                "live",
                supplier,
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::from_secs(1),
                Duration::ZERO,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(transport.count(), 1);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_shutdown_stops_schedules() {
        let (scheduler, transport) = scheduler();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let supplier: RequestSupplier = Arc::new(move || -> Result<Vec<FeedRequest>> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });

        let dynamic = scheduler
            .schedule_dynamic(
                "live",
                supplier,
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::from_secs(1),
                Duration::ZERO,
            )
            .unwrap();
        let bounded = scheduler
            .pull_n_times(
                "bounded",
                recurring("http://feeds.test/n", Duration::from_secs(1)),
                callbacks::noop_success(),
                callbacks::noop_error(),
                100,
                Duration::ZERO,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let pulled = transport.count();

        scheduler.queue().shutdown().await;
        assert!(dynamic.is_cancelled());
        assert!(bounded.is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.count(), pulled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_saturates() {
        let now = Instant::now();
        assert!(deadline_after(Duration::MAX) > now + Duration::from_secs(86400 * 365));
        assert_eq!(deadline_after(Duration::from_secs(5)) - now, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_initial_delay_never_fires() {
        let (scheduler, transport) = scheduler();
        let handle = scheduler
            .schedule_fixed(
                "later",
                recurring("http://feeds.test/a", Duration::from_secs(1)),
                callbacks::noop_success(),
                callbacks::noop_error(),
                Duration::MAX,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(transport.count(), 0);
        assert!(!handle.is_cancelled());
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_once_enqueues_immediately() {
        let (scheduler, transport) = scheduler();
        let request = FeedRequest::new(FeedRequestConfig::new("f", "http://feeds.test/once")).unwrap();
        let outcome = scheduler.pull_once(request, callbacks::noop_success(), callbacks::noop_error());
        assert_eq!(outcome, Enqueued::Queued);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_n_times_is_bounded() {
        let (scheduler, transport) = scheduler();
        let handle = scheduler
            .pull_n_times(
                "bounded",
                recurring("http://feeds.test/n", Duration::from_secs(3)),
                callbacks::noop_success(),
                callbacks::noop_error(),
                2,
                Duration::from_secs(1),
            )
            .unwrap();
        assert!(!handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.count(), 3);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_n_times_cancel_stops_early() {
        let (scheduler, transport) = scheduler();
        let handle = scheduler
            .pull_n_times(
                "bounded",
                recurring("http://feeds.test/n", Duration::from_secs(3)),
                callbacks::noop_success(),
                callbacks::noop_error(),
                10,
                Duration::ZERO,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.count(), 2);
    }
}

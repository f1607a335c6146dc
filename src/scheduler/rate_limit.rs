//! Sliding-window admission control.
//!
//! The limiter answers "may one more request go out right now?". It keeps the
//! time of the last `limit` admissions in a ring; the slot about to be reused
//! holds the admission from one lap ago, and a new admission is allowed only
//! if that one is at least a full window old. This gives at most `limit`
//! admissions in any trailing window without fixed-window edge bursts.

use crate::config::MAX_REQUESTS_PER_SECOND;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the rolling window.
pub const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Ring {
    /// `None` means "free since before the window", the initial burst allowance.
    slots: Vec<Option<Instant>>,
    /// Index of the slot the next admission would take.
    next: usize,
}

/// Requests-per-second limiter shared by the queue and the retry controller.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    ring: Mutex<Ring>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` admissions per second.
    ///
    /// The first `limit` calls are admitted immediately. `limit` is clamped to
    /// `MAX_REQUESTS_PER_SECOND`; a limit of zero rejects everything.
    pub fn new(limit: u32) -> Self {
        let limit = limit.min(MAX_REQUESTS_PER_SECOND);
        Self {
            limit,
            ring: Mutex::new(Ring {
                slots: vec![None; limit as usize],
                next: 0,
            }),
        }
    }

    /// Create a limiter whose ring looks as if every slot was used at `previous`.
    pub fn with_previous(limit: u32, previous: Instant) -> Self {
        let limiter = Self::new(limit);
        if let Ok(mut ring) = limiter.ring.lock() {
            ring.slots.iter_mut().for_each(|slot| *slot = Some(previous));
        }
        limiter
    }

    /// Requests admitted per rolling second.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Try to admit one request at `now`. Only a successful admission mutates state.
    pub fn admit(&self, now: Instant) -> bool {
        if self.limit == 0 {
            return false;
        }

        let mut ring = self.ring.lock().unwrap_or_else(|poisoned| {
            tracing::error!("RateLimiter::admit: ring mutex poisoned, recovering");
            poisoned.into_inner()
        });

        let next = ring.next;
        let free = match ring.slots[next] {
            None => true,
            Some(used_at) => now.saturating_duration_since(used_at) >= WINDOW,
        };

        if free {
            ring.slots[next] = Some(now);
            ring.next = (next + 1) % ring.slots.len();
        }
        free
    }
}

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Default outbound budget: at most 5 request starts in any trailing 1s interval.
pub const MAX_REQUESTS: usize = 5;
pub const WINDOW: Duration = Duration::from_millis(1000);

// Added to overflow waits so a woken caller lands strictly outside the window.
const WAKE_MARGIN: Duration = Duration::from_millis(5);

/// Sliding-window rate limiter shared by every upstream call.
///
/// Holds the timestamps of recent request starts and prunes anything older
/// than the window on every check. The window only bounds aggregate
/// throughput; it does not order or serialize callers.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            stamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait for a request slot, then record the start timestamp.
    ///
    /// Suspends the calling task until fewer than `max_requests` starts fall
    /// within the trailing window; never fails. The check-and-stamp step runs
    /// under the mutex and is re-run after every sleep, so two waiters cannot
    /// both take the last slot.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut stamps = self.stamps.lock().await;
                let now = Instant::now();
                while stamps
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    stamps.pop_front();
                }
                if stamps.len() < self.max_requests {
                    stamps.push_back(now);
                    return;
                }
                let oldest = stamps.front().copied().unwrap_or(now);
                self.window.saturating_sub(now.duration_since(oldest)) + WAKE_MARGIN
            };
            sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MAX_REQUESTS, WINDOW)
    }
}

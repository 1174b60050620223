use std::sync::Arc;
use std::time::Duration;

use hibob_mcp::http::limiter::RateLimiter;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_millis(1000);

// Sorted completion times must never show more than `max` acquisitions
// inside any trailing window.
fn assert_sliding_window(times: &[Instant], max: usize) {
    for (i, start) in times.iter().enumerate() {
        let in_window = times[i..]
            .iter()
            .take_while(|t| t.duration_since(*start) < WINDOW)
            .count();
        assert!(
            in_window <= max,
            "{} acquisitions within {:?} starting at index {}",
            in_window,
            WINDOW,
            i
        );
    }
}

#[tokio::test(start_paused = true)]
async fn sequential_acquires_respect_window() {
    let limiter = RateLimiter::new(5, WINDOW);
    let mut times = Vec::new();
    for _ in 0..12 {
        limiter.acquire().await;
        times.push(Instant::now());
    }
    assert_sliding_window(&times, 5);
    // 12 starts at 5 per second cannot finish inside two windows.
    assert!(times[11].duration_since(times[0]) >= Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn concurrent_acquires_cannot_share_a_slot() {
    let limiter = Arc::new(RateLimiter::new(5, WINDOW));
    let mut handles = Vec::new();
    for _ in 0..12 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            Instant::now()
        }));
    }
    let mut times = Vec::new();
    for handle in handles {
        times.push(handle.await.unwrap());
    }
    times.sort();
    assert_sliding_window(&times, 5);
}

// src/api/rate_limit.rs

//! Sliding-window rate limiting for outbound API calls.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};

/// Sliding-window rate limiter.
///
/// Records the admission time of every call; a new call is admitted as
/// soon as fewer than `quota` admissions fall inside the trailing
/// window. The check and the recording happen under one lock so two
/// concurrent callers can never both claim the last free slot.
pub struct RateLimiter {
    quota: usize,
    window: Duration,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter admitting `quota` calls per `window`. A zero quota is
    /// treated as one so callers cannot stall forever.
    pub fn new(quota: usize, window: Duration) -> Self {
        Self {
            quota: quota.max(1),
            window,
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    /// Window length. The fetcher uses it as the minimum wait after the
    /// remote side answers 429 without a Retry-After.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a slot is free, then record the admission.
    pub async fn acquire(&self) {
        loop {
            let deadline = {
                let mut admissions = self.admissions.lock().await;
                let now = Instant::now();
                while admissions
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.window)
                {
                    admissions.pop_front();
                }
                if admissions.len() < self.quota {
                    admissions.push_back(now);
                    return;
                }
                match admissions.front() {
                    Some(&oldest) => oldest + self.window,
                    None => now,
                }
            };
            // Lock is released while sleeping; the slot is re-contended
            // on wakeup.
            time::sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_quota_without_waiting() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        // Paused time only advances across sleeps, so no sleep happened.
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn delays_past_quota_until_the_window_rolls() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_quota_still_admits() {
        let limiter = RateLimiter::new(0, Duration::from_secs(10));
        limiter.acquire().await;
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_never_exceed_quota_in_any_window() {
        let quota = 3;
        let window = Duration::from_secs(5);
        let limiter = Arc::new(RateLimiter::new(quota, window));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        // Any quota+1 consecutive admissions must span at least one
        // full window, otherwise the limit was breached.
        for run in admitted.windows(quota + 1) {
            assert!(run[quota].duration_since(run[0]) >= window);
        }
    }
}

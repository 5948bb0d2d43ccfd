//! Utility functions and helpers.

pub mod http;
pub mod sanitize;
pub mod shutdown;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::models::RetryConfig;

/// Compute the backoff delay for a zero-based retry attempt.
///
/// Doubles the base delay per attempt up to the configured cap, then adds
/// a small jitter so workers retrying in lockstep spread out.
pub fn retry_delay(attempt: u32, retry: &RetryConfig) -> Duration {
    let scaled = retry.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
    Duration::from_millis(scaled.min(retry.max_delay_ms)) + jitter(retry.jitter_ms)
}

/// Jitter in `0..=max_ms` milliseconds, derived from the clock's subsecond
/// nanos. Not uniform, but plenty to decorrelate retry timing.
pub fn jitter(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    Duration::from_millis(nanos % (max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_ms: 0,
        }
    }

    #[test]
    fn delay_doubles_then_caps() {
        let retry = retry_config();
        assert_eq!(retry_delay(0, &retry), Duration::from_millis(500));
        assert_eq!(retry_delay(1, &retry), Duration::from_millis(1_000));
        assert_eq!(retry_delay(2, &retry), Duration::from_millis(2_000));
        assert_eq!(retry_delay(10, &retry), Duration::from_millis(8_000));
        assert_eq!(retry_delay(63, &retry), Duration::from_millis(8_000));
    }

    #[test]
    fn jitter_stays_bounded() {
        for _ in 0..100 {
            assert!(jitter(250) <= Duration::from_millis(250));
        }
        assert_eq!(jitter(0), Duration::ZERO);
    }
}

//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// A fixed budget of retries for one operation.
///
/// Each call to [`BoundedRetry::next_delay`] consumes one attempt and yields
/// the delay before the next try, or `None` once the budget is spent.
#[derive(Debug, Clone)]
pub struct BoundedRetry {
    attempts: u32,
    max_attempts: u32,
    base_ms: u64,
    max_ms: u64,
}

impl BoundedRetry {
    pub fn new(max_attempts: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_ms,
            max_ms,
        }
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            return None;
        }
        Some(calculate_backoff(self.attempts, self.base_ms, self.max_ms))
    }

    /// Forget earlier failures after progress was made.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn bounded_retry_exhausts() {
        let mut retry = BoundedRetry::new(3, 10, 100);
        assert!(retry.next_delay().is_some());
        assert!(retry.next_delay().is_some());
        assert_eq!(retry.next_delay(), None);
        assert_eq!(retry.next_delay(), None);
    }

    #[test]
    fn bounded_retry_resets_on_progress() {
        let mut retry = BoundedRetry::new(2, 10, 100);
        assert!(retry.next_delay().is_some());
        retry.reset();
        assert!(retry.next_delay().is_some());
        assert_eq!(retry.next_delay(), None);
    }
}

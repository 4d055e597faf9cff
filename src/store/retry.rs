//! Retry policy for conditional writes.
//!
//! Only revision conflicts are retried. Each retry waits an exponentially
//! growing delay, capped at [`MAX_BACKOFF_MS`].

use std::time::Duration;

// ============================================================================
// Backoff Constants and Calculation
// ============================================================================

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay in milliseconds.
pub const RETRY_BACKOFF_BASE_MS: u64 = 250;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 5_000;

/// Multiplier for exponential backoff.
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Exponential backoff for the `retry`-th retry (1-indexed) from `base_ms`.
///
/// # Example
///
/// ```rust
/// use claudestep::store::retry::calculate_backoff;
/// use std::time::Duration;
///
/// assert_eq!(calculate_backoff(250, 1), Duration::from_millis(250));
/// assert_eq!(calculate_backoff(250, 2), Duration::from_millis(500));
/// assert_eq!(calculate_backoff(250, 3), Duration::from_millis(1000));
/// ```
#[must_use]
pub fn calculate_backoff(base_ms: u64, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1);
    let multiplier = BACKOFF_MULTIPLIER.saturating_pow(exponent);
    let delay = base_ms.saturating_mul(multiplier);
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

// ============================================================================
// Retry Policy
// ============================================================================

/// How many times a conflicting write is re-read, recomputed and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: RETRY_BACKOFF_BASE_MS,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// Retries without sleeping.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, 0)
    }

    /// Fail on the first conflict.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::immediate(0)
    }

    /// Whether another attempt is allowed after `retries_done` retries.
    #[must_use]
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Total attempts this policy allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the `retry`-th retry (1-indexed).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        calculate_backoff(self.base_delay_ms, retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(calculate_backoff(250, 10), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(calculate_backoff(250, u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn test_should_retry_counts_retries_not_attempts() {
        let policy = RetryPolicy::immediate(2);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_no_retry() {
        assert!(!RetryPolicy::no_retry().should_retry(0));
    }

    #[test]
    fn test_immediate_never_sleeps() {
        assert_eq!(RetryPolicy::immediate(3).delay(3), Duration::ZERO);
        assert_eq!(RetryPolicy::default().delay(2), Duration::from_millis(500));
    }
}

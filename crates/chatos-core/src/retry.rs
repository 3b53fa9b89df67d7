//! Pure retry/backoff decision logic, factored out of any I/O so it can be
//! unit-tested without a network or clock dependency.
//!
//! The contract is exactly `(error, attempt, aborted) -> Retry(delayMs) |
//! Fail`; callers own the loop that drives a request and consults this
//! function between attempts.

use rand::Rng;

/// The outcome of consulting the retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after sleeping the given number of milliseconds.
    Retry {
        /// Delay before the next attempt, in milliseconds.
        delay_ms: u64,
    },
    /// Give up; surface the error to the caller.
    Fail,
}

/// Describes a failed attempt in enough detail to classify retryability,
/// without coupling this crate to any particular HTTP client's error type.
#[derive(Debug, Clone, Default)]
pub struct AttemptError {
    /// HTTP status code, if the failure came from an HTTP response.
    pub status: Option<u16>,
    /// Lowercased error message, used for substring matching on transport
    /// failure modes that don't carry a status code.
    pub message: String,
}

impl AttemptError {
    /// Build from an arbitrary display-able error and optional status.
    #[must_use]
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            status,
            message: message.into().to_lowercase(),
        }
    }

    fn is_retryable_status(&self) -> bool {
        matches!(self.status, Some(408 | 409 | 429)) || matches!(self.status, Some(s) if (500..=599).contains(&s))
    }

    fn is_retryable_message(&self) -> bool {
        const NEEDLES: [&str; 7] = [
            "timeout",
            "timed out",
            "rate limit",
            "econnreset",
            "socket hang up",
            "enotfound",
            "eai_again",
        ];
        NEEDLES.iter().any(|needle| self.message.contains(needle))
    }
}

/// Retry/backoff policy: bounded attempts, exponential delay with jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up (default 5).
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

impl RetryPolicy {
    /// Construct with an explicit retry budget.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decide whether `attempt` (1-based, the attempt that just failed)
    /// should be retried.
    ///
    /// `aborted` short-circuits to [`RetryDecision::Fail`] regardless of the
    /// error shape — an external cancellation or timeout abort is never
    /// retried.
    #[must_use]
    pub fn decide(&self, error: &AttemptError, attempt: u32, aborted: bool) -> RetryDecision {
        if aborted || attempt >= self.max_retries {
            return RetryDecision::Fail;
        }
        if !error.is_retryable_status() && !error.is_retryable_message() {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry {
            delay_ms: backoff_delay_ms(attempt),
        }
    }
}

/// `min(8000, 500 * 2^(attempt-1))` milliseconds, times a uniform jitter in
/// `[0.5, 1.5]`, rounded to the nearest millisecond.
fn backoff_delay_ms(attempt: u32) -> u64 {
    let base = 500u64.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let capped = base.min(8000);
    let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.5);
    (capped as f64 * jitter).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_on_retryable_status() {
        let policy = RetryPolicy::new(5);
        let err = AttemptError::new("too many requests", Some(429));
        match policy.decide(&err, 1, false) {
            RetryDecision::Retry { delay_ms } => assert!((250..=750).contains(&delay_ms)),
            RetryDecision::Fail => panic!("expected retry"),
        }
    }

    #[test]
    fn retries_on_transient_message() {
        let policy = RetryPolicy::new(5);
        let err = AttemptError::new("ECONNRESET by peer", None);
        assert!(matches!(
            policy.decide(&err, 1, false),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn does_not_retry_non_retryable_status() {
        let policy = RetryPolicy::new(5);
        let err = AttemptError::new("bad request", Some(400));
        assert_eq!(policy.decide(&err, 1, false), RetryDecision::Fail);
    }

    #[test]
    fn does_not_retry_when_aborted() {
        let policy = RetryPolicy::new(5);
        let err = AttemptError::new("too many requests", Some(429));
        assert_eq!(policy.decide(&err, 1, true), RetryDecision::Fail);
    }

    #[test]
    fn stops_at_max_retries() {
        let policy = RetryPolicy::new(3);
        let err = AttemptError::new("too many requests", Some(429));
        assert_eq!(policy.decide(&err, 3, false), RetryDecision::Fail);
    }

    #[test]
    fn delay_bands_increase_with_attempt() {
        // attempt 1 -> base 500 -> [250,750]; attempt 2 -> base 1000 -> [500,1500]
        for _ in 0..20 {
            let d1 = backoff_delay_ms(1);
            assert!((250..=750).contains(&d1), "attempt 1 delay {d1}");
            let d2 = backoff_delay_ms(2);
            assert!((500..=1500).contains(&d2), "attempt 2 delay {d2}");
        }
    }

    #[test]
    fn delay_caps_at_8000_base() {
        // attempt 5 -> base 500*2^4 = 8000 -> capped already at 8000
        let d = backoff_delay_ms(5);
        assert!((4000..=12000).contains(&d));
        // very large attempt should not overflow and stays capped
        let d_big = backoff_delay_ms(63);
        assert!((4000..=12000).contains(&d_big));
    }
}

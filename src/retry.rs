//! Bounded-attempt retry for transport operations.
//!
//! [`RetryPolicy::run`] is the only retry mechanism in the crate: discovery,
//! connect, subscribe and activation all go through it, and teardown
//! deliberately does not.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the configured delay between every attempt.
    #[default]
    Fixed,
    /// Double the configured delay after each failed attempt.
    Exponential,
}

/// A failure annotated with the number of attempts made.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// How many attempts ran before giving up.
    pub attempts: u32,
    /// The last observed failure.
    pub error: E,
}

/// Bounded-attempt retry policy.
///
/// Immutable; one policy instance is shared by reference across all
/// operations in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, at least 1.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    /// Delay schedule.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Creates a fixed-delay policy.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Sets the delay schedule.
    #[must_use]
    pub const fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based), `None` for
    /// no wait.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        match self.backoff {
            Backoff::None => None,
            Backoff::Fixed => Some(self.delay),
            Backoff::Exponential => {
                Some(self.delay.saturating_mul(2u32.saturating_pow(attempt - 1)))
            }
        }
    }

    /// Invokes `operation` up to `max_attempts` times, sleeping per the
    /// schedule between attempts.
    ///
    /// The operation receives the 1-based attempt number. Returns the first
    /// success, or the last failure annotated with the attempt count.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] wrapping the last error once all attempts
    /// fail.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, Exhausted<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= max => {
                    return Err(Exhausted {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) => {
                    tracing::debug!("attempt {attempt}/{max} failed: {error}");
                    if let Some(delay) = self.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn immediate(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO).backoff(Backoff::None)
    }

    #[tokio::test]
    async fn test_first_success_stops_retrying() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Exhausted<&str>> = immediate(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let result = immediate(3)
            .run(|attempt| async move {
                if attempt < 3 { Err("not yet") } else { Ok(attempt) }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_counts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Exhausted<&str>> = immediate(4)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still broken") }
            })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 4);
        assert_eq!(exhausted.error, "still broken");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_clamps_to_one() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
            backoff: Backoff::None,
        };
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("no") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_schedule() {
        let fixed = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(fixed.delay_after(1), Some(Duration::from_millis(100)));
        assert_eq!(fixed.delay_after(5), Some(Duration::from_millis(100)));

        let none = fixed.backoff(Backoff::None);
        assert_eq!(none.delay_after(1), None);

        let exp = fixed.backoff(Backoff::Exponential);
        assert_eq!(exp.delay_after(1), Some(Duration::from_millis(100)));
        assert_eq!(exp.delay_after(2), Some(Duration::from_millis(200)));
        assert_eq!(exp.delay_after(4), Some(Duration::from_millis(800)));
    }
}

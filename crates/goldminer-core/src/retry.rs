//! Retry with exponential backoff.
//!
//! [`execute`] runs an async operation up to `max_retries + 1` times. The
//! first attempt is immediate; retry `n` waits
//! `min(initial_delay * multiplier^(n-1), max_delay)` first. The wait is
//! raced against the [`RunContext`], so a cancelled cycle stops retrying at
//! once and reports [`RetryError::Cancelled`] rather than exhaustion.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::context::{CancelCause, RunContext};

/// Backoff parameters. Builders ignore invalid values and keep the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Zero is ignored.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.initial_delay = delay;
        }
        self
    }

    /// Zero is ignored.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.max_delay = delay;
        }
        self
    }

    /// Non-positive and non-finite values are ignored.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.multiplier = multiplier;
        }
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Total number of calls `execute` may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exp);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos as u64)
    }
}

/// Failure of [`execute`].
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; `last` is the final attempt's error.
    Exhausted { attempts: u32, last: E },
    /// The context finished before the next attempt could run.
    Cancelled {
        attempts: u32,
        cause: CancelCause,
        last: E,
    },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    pub fn cancel_cause(&self) -> Option<CancelCause> {
        match self {
            RetryError::Cancelled { cause, .. } => Some(*cause),
            RetryError::Exhausted { .. } => None,
        }
    }

    pub fn last(&self) -> &E {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::Cancelled { last, .. } => last,
        }
    }

    pub fn into_last(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::Cancelled { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "retry failed after {attempts} attempts: {last}")
            }
            RetryError::Cancelled {
                attempts, cause, ..
            } => write!(f, "retry aborted after {attempts} attempts: {cause}"),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last())
    }
}

/// Run `operation` until it succeeds, retries run out, or `ctx` finishes.
pub async fn execute<T, E, F, Fut>(
    ctx: &RunContext,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempts = 1;
    let mut last = match operation().await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for retry in 1..=config.max_retries {
        let wait = config.backoff(retry);
        debug!(attempt = attempts, error = %last, wait_ms = wait.as_millis() as u64, "retrying");

        if let Err(cause) = ctx.sleep(wait).await {
            return Err(RetryError::Cancelled {
                attempts,
                cause,
                last,
            });
        }

        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => last = e,
        }
    }

    Err(RetryError::Exhausted { attempts, last })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries(), 3);
        assert_eq!(cfg.initial_delay(), Duration::from_secs(1));
        assert_eq!(cfg.max_delay(), Duration::from_secs(30));
        assert_eq!(cfg.multiplier(), 2.0);
        assert_eq!(cfg.max_attempts(), 4);
    }

    #[test]
    fn invalid_builder_values_are_ignored() {
        let cfg = RetryConfig::new()
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
            .with_multiplier(0.0)
            .with_multiplier(-1.5)
            .with_multiplier(f64::NAN);
        assert_eq!(cfg, RetryConfig::default());
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let cfg = RetryConfig::default();
        let waits: Vec<u64> = (1..=7).map(|n| cfg.backoff(n).as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn backoff_with_fractional_multiplier() {
        let cfg = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(1.5);
        assert_eq!(cfg.backoff(2), Duration::from_millis(150));
    }

    #[test]
    fn backoff_never_overflows() {
        let cfg = RetryConfig::new().with_multiplier(10.0);
        assert_eq!(cfg.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_makes_one_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let out: Result<u32, RetryError<String>> =
            execute(&RunContext::background(), &RetryConfig::default(), || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn display_mentions_attempt_count() {
        let err: RetryError<String> = RetryError::Exhausted {
            attempts: 4,
            last: "boom".into(),
        };
        assert_eq!(err.to_string(), "retry failed after 4 attempts: boom");
    }
}

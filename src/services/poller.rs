//! Bounded exponential-backoff polling.
//!
//! Used to await asynchronous decisions from external services. Before every
//! attempt (including the first) the poller sleeps
//! `base_delay * factor^attempt`, so the total wait is bounded by the sum of
//! those delays plus the time spent inside the checks.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Attempt budget and delay curve for [`poll_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
            factor: 1.5,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            factor,
        }
    }

    /// Delay slept before attempt `attempt` (zero-based). A non-finite or
    /// negative factor gives a constant `base_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = if self.factor.is_finite() && self.factor >= 0.0 {
            self.factor
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Upper bound on the time spent sleeping across all attempts.
    pub fn max_total_delay(&self) -> Duration {
        (0..self.max_attempts)
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// What a single check reports.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Pending,
    Ready(T),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PollError {
    #[error("Terminal failure reported: {0}")]
    Failed(String),

    #[error("Still pending after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Status check failed on final attempt: {0}")]
    Check(String),

    #[error("Polling cancelled")]
    Cancelled,
}

/// Repeatedly run `check` until it reports a terminal state or the attempt
/// budget runs out.
///
/// A check that returns `Err` is treated as transient and retried on the next
/// attempt; if the final attempt errors, that error is returned instead of
/// [`PollError::Timeout`]. `check` receives the zero-based attempt index.
pub async fn poll_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, PollError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
    E: Display,
{
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        match check(attempt).await {
            Ok(PollStatus::Ready(value)) => return Ok(value),
            Ok(PollStatus::Failed(reason)) => return Err(PollError::Failed(reason)),
            Ok(PollStatus::Pending) => {
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    "Still pending"
                );
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Status check errored"
                );
                if attempt + 1 == policy.max_attempts {
                    return Err(PollError::Check(e.to_string()));
                }
            }
        }
    }

    Err(PollError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(3, Duration::from_secs(2), 1.5)
    }

    #[test]
    fn test_delay_curve() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_secs(2));
        assert_eq!(p.delay_for(1), Duration::from_secs(3));
        assert_eq!(p.delay_for(2), Duration::from_millis(4500));
        assert_eq!(p.max_total_delay(), Duration::from_millis(9500));
    }

    #[test]
    fn test_factor_below_one_shrinks_delay() {
        let p = BackoffPolicy::new(3, Duration::from_secs(1), 0.5);
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_millis(250));
        assert_eq!(p.max_total_delay(), Duration::from_millis(1750));
    }

    #[test]
    fn test_invalid_factor_falls_back_to_constant_delay() {
        let p = BackoffPolicy::new(3, Duration::from_secs(1), f64::NAN);
        assert_eq!(p.delay_for(2), Duration::from_secs(1));
        let p = BackoffPolicy::new(3, Duration::from_secs(1), -2.0);
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exact_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let counter = calls.clone();
        let result: Result<(), PollError> =
            poll_with_backoff(&policy(), &CancellationToken::new(), |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(PollStatus::Pending)
                }
            })
            .await;

        assert_eq!(assert_err!(result), PollError::Timeout { attempts: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(9500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_returns_immediately() {
        let start = tokio::time::Instant::now();
        let result = poll_with_backoff(&policy(), &CancellationToken::new(), |attempt| async move {
            if attempt == 1 {
                Ok::<_, String>(PollStatus::Ready("done"))
            } else {
                Ok(PollStatus::Pending)
            }
        })
        .await;

        assert_eq!(assert_ok!(result), "done");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), PollError> =
            poll_with_backoff(&policy(), &CancellationToken::new(), |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(PollStatus::Failed("rejected upstream".to_string()))
                }
            })
            .await;

        assert_eq!(result, Err(PollError::Failed("rejected upstream".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_is_retried() {
        let result = poll_with_backoff(&policy(), &CancellationToken::new(), |attempt| async move {
            match attempt {
                0 => Err("connection reset".to_string()),
                _ => Ok(PollStatus::Ready(7)),
            }
        })
        .await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_on_last_attempt_is_reported() {
        let result: Result<(), PollError> =
            poll_with_backoff(&policy(), &CancellationToken::new(), |attempt| async move {
                match attempt {
                    2 => Err("gateway timeout".to_string()),
                    _ => Ok(PollStatus::Pending),
                }
            })
            .await;

        assert_eq!(result, Err(PollError::Check("gateway timeout".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), PollError> = poll_with_backoff(&policy(), &cancel, |_| async {
            Ok::<_, String>(PollStatus::Pending)
        })
        .await;

        assert_eq!(result, Err(PollError::Cancelled));
    }
}

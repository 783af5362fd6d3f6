/// Bounded retry with exponential backoff and cooperative cancellation
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every following retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Outcome of a single attempt, as classified by the action itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, E> {
    Success(T),
    /// Worth another try after the backoff delay
    Retryable(E),
    /// Stops the executor immediately
    Fatal(E),
}

impl<T, E> From<Result<T, E>> for Attempt<T, E> {
    /// Plain results treat every error as retryable
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(error) => Attempt::Retryable(error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
    #[error("Non-retryable failure on attempt {attempts}: {error}")]
    Fatal { attempts: u32, error: E },
    #[error("Cancelled after {attempts} completed attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of attempts that ran to completion
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Fatal { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The error that ended the run, `None` when cancelled
    pub fn into_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::Fatal { error, .. } => Some(error),
            RetryError::Cancelled { .. } => None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Initial attempt plus every allowed retry
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry` (1-indexed): `base_delay * 2^(retry-1)`
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    /// Run `action` until it succeeds, fails fatally, runs out of retries or
    /// `cancel` fires.
    ///
    /// The action receives the zero-based attempt number. Both the action's
    /// future and every backoff sleep are raced against `cancel`; a cancelled
    /// attempt is dropped mid-flight and does not count as completed.
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut action: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: Display,
    {
        let mut completed = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: completed,
                });
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: completed });
                }
                outcome = action(completed) => outcome,
            };
            completed += 1;

            let error = match outcome {
                Attempt::Success(value) => {
                    if completed > 1 {
                        debug!(attempts = completed, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Attempt::Fatal(error) => {
                    warn!(attempt = completed, error = %error, "Non-retryable failure");
                    return Err(RetryError::Fatal {
                        attempts: completed,
                        error,
                    });
                }
                Attempt::Retryable(error) => error,
            };

            if completed > self.max_retries {
                warn!(
                    "Max retries ({}) reached, last error: {}",
                    self.max_retries, error
                );
                return Err(RetryError::Exhausted {
                    attempts: completed,
                    last_error: error,
                });
            }

            let delay = self.backoff(completed);
            warn!(
                "Retry attempt {}/{}, waiting {:?}: {}",
                completed, self.max_retries, delay, error
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: completed });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn policy(max_retries: u32, base_ms: u64) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(base_ms))
    }

    #[test]
    fn test_backoff_doubles_per_retry() {
        let policy = policy(3, 1000);
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(policy(3, 1000).backoff(0), Duration::ZERO);
        let huge = RetryPolicy::new(3, Duration::MAX);
        assert_eq!(huge.backoff(2), Duration::MAX);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = RetryPolicy::default()
            .execute(&cancel, move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Attempt::<_, String>::Success(42) }
            })
            .await;

        assert_eq!(assert_ok!(result), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let cancel = CancellationToken::new();

        let result = policy(3, 10)
            .execute(&cancel, |attempt| async move {
                if attempt < 2 {
                    Attempt::Retryable("temporary error")
                } else {
                    Attempt::Success(attempt)
                }
            })
            .await;

        assert_eq!(assert_ok!(result), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_last_error() {
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = policy(2, 10)
            .execute(&cancel, move |attempt| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Attempt::<(), _>::Retryable(format!("failure {}", attempt)) }
            })
            .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "failure 2");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_timing() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _ = policy(3, 1000)
            .execute(&cancel, move |_| {
                seen_clone.lock().unwrap().push(start.elapsed());
                async { Attempt::<(), _>::Retryable("error") }
            })
            .await;

        let seen = seen.lock().unwrap();
        let gaps: Vec<u128> = seen
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();
        assert_eq!(seen.len(), 4);
        assert_eq!(gaps, vec![1000, 2000, 4000]);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = policy(5, 10)
            .execute(&cancel, move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Attempt::<(), _>::Fatal("bad input") }
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::Fatal {
                attempts: 1,
                error: "bad input"
            })
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let result = policy(3, 1000)
            .execute(&cancel, |_| async { Attempt::<(), _>::Retryable("error") })
            .await;

        let err = assert_err!(result);
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 2);
        assert!(err.into_error().is_none());
    }

    #[tokio::test]
    async fn test_already_cancelled_never_runs_action() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = RetryPolicy::default()
            .execute(&cancel, move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Attempt::<(), &str>::Success(()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_result_converts_to_retryable() {
        let ok: Attempt<i32, &str> = Ok(1).into();
        let err: Attempt<i32, &str> = Err("boom").into();
        assert_eq!(ok, Attempt::Success(1));
        assert_eq!(err, Attempt::Retryable("boom"));
    }
}

//! Retry execution engine

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use crate::context::OperationContext;
use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Builder for configuring a `RetryExecutor`
///
/// # Example
///
/// ```rust
/// use strongbox_core::retry::{RetryExecutorBuilder, TracingObserver};
/// use strongbox_core::types::RetryPolicy;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_policy(RetryPolicy::default())
///     .with_observer(TracingObserver::new("get-object"))
///     .with_jitter(true)
///     .build();
/// assert_eq!(executor.policy().max_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
}

impl Default for RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            jitter: true,
        }
    }
}

impl<P, O> RetryExecutorBuilder<P, O> {
    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the predicate deciding which errors are retried
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutorBuilder<P2, O> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
        }
    }

    /// Enable or disable jitter. Enabled by default.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the executor
    pub fn build(self) -> RetryExecutor<P, O> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }
}

/// A retry executor with configurable policy, predicate and observer
///
/// Use `RetryExecutorBuilder` to create an instance.
#[derive(Debug, Clone)]
pub struct RetryExecutor<P, O> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
}

impl<P, O> RetryExecutor<P, O> {
    /// The policy this executor follows
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    /// Run `op` until it succeeds, the predicate rejects its error, the
    /// attempts run out, or `ctx` is cancelled or expires.
    ///
    /// At least one attempt is always made, even when the policy says zero.
    pub async fn execute<F, Fut, T, E>(
        &self,
        ctx: &OperationContext,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: RetryPredicate<E>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            // The operation is not even started once the context has fired.
            if let Err(reason) = ctx.check() {
                self.observer.on_interrupted(attempt, reason);
                return Err(RetryError::Interrupted { attempt, reason });
            }
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match ctx.run(op()).await {
                Ok(Ok(value)) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Ok(Err(err)) => err,
                Err(reason) => {
                    self.observer.on_interrupted(attempt, reason);
                    return Err(RetryError::Interrupted { attempt, reason });
                }
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_rejected(attempt, &err);
                return Err(RetryError::NonRetryable {
                    attempt,
                    source: err,
                });
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                    total_duration: start.elapsed(),
                });
            }

            let delay = calculate_delay(&self.policy, attempt, self.jitter);
            self.observer.on_attempt_failed(attempt, &err, delay);

            if let Err(reason) = ctx.run(tokio::time::sleep(delay)).await {
                self.observer.on_interrupted(attempt, reason);
                return Err(RetryError::Interrupted { attempt, reason });
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Interrupted;
    use crate::retry::observer::StatsObserver;
    use crate::retry::strategies::ClosurePredicate;
    use crate::types::RetryStrategy;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 2.0,
            initial_delay_ms: 10,
            max_delay_ms: 100,
        }
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let observer = Arc::new(StatsObserver::new());

        let result: Result<&str, RetryError<io::Error>> = RetryExecutorBuilder::new()
            .with_policy(test_policy())
            .with_observer(observer.clone())
            .build()
            .execute(&OperationContext::new(), || async { Ok("success") })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.successes(), 1);
        assert_eq!(observer.failures(), 0);
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let observer = Arc::new(StatsObserver::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = RetryExecutorBuilder::new()
            .with_policy(test_policy())
            .with_observer(observer.clone())
            .with_jitter(false)
            .build()
            .execute(&OperationContext::new(), || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(observer.failures(), 2);
        assert_eq!(observer.successes(), 1);
    }

    #[tokio::test]
    async fn test_exhausted() {
        let observer = Arc::new(StatsObserver::new());

        let result: Result<(), _> = RetryExecutorBuilder::new()
            .with_policy(test_policy())
            .with_observer(observer.clone())
            .build()
            .execute(&OperationContext::new(), || async {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(observer.exhaustions(), 1);
        assert_eq!(observer.failures(), 2);
    }

    #[tokio::test]
    async fn test_predicate_stops_retries() {
        let observer = Arc::new(StatsObserver::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = RetryExecutorBuilder::new()
            .with_policy(test_policy())
            .with_predicate(ClosurePredicate::new(|e: &io::Error| {
                e.kind() != io::ErrorKind::NotFound
            }))
            .with_observer(observer.clone())
            .build()
            .execute(&OperationContext::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(io::Error::new(io::ErrorKind::NotFound, "missing")) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_non_retryable());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(observer.rejections(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let policy = RetryPolicy {
            max_attempts: 0,
            ..test_policy()
        };

        let result: Result<(), _> = RetryExecutorBuilder::new()
            .with_policy(policy)
            .build()
            .execute(&OperationContext::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await;

        assert!(result.unwrap_err().is_exhausted());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_never_calls_operation() {
        let (ctx, handle) = OperationContext::new().cancellable();
        handle.cancel();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), RetryError<&str>> = RetryExecutorBuilder::new()
            .with_policy(test_policy())
            .build()
            .execute(&ctx, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(result.unwrap_err().interruption(), Some(Interrupted::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let observer = Arc::new(StatsObserver::new());
        let (ctx, handle) = OperationContext::new().cancellable();
        let policy = RetryPolicy {
            initial_delay_ms: 60_000,
            max_delay_ms: 60_000,
            ..test_policy()
        };
        let executor = RetryExecutorBuilder::new()
            .with_policy(policy)
            .with_observer(observer.clone())
            .build();

        let task = tokio::spawn(async move {
            executor
                .execute(&ctx, || async { Err::<(), _>("unavailable") })
                .await
        });
        while observer.failures() == 0 {
            tokio::task::yield_now().await;
        }
        handle.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.interruption(), Some(Interrupted::Cancelled));
        assert_eq!(err.attempts(), 1);
        assert_eq!(observer.interruptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_loop() {
        let ctx = OperationContext::new().with_timeout(Duration::from_millis(25));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let policy = RetryPolicy {
            max_attempts: 10,
            ..test_policy()
        };

        let result: Result<(), _> = RetryExecutorBuilder::new()
            .with_policy(policy)
            .with_jitter(false)
            .build()
            .execute(&ctx, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("slow") }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.interruption(), Some(Interrupted::DeadlineExceeded));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}

//! Retry wiring for backend calls
//!
//! Only [`BackendErrorKind::Transient`](crate::BackendErrorKind::Transient)
//! failures are retried. Not-found, authorization and validation failures
//! surface after the first attempt.

use strongbox_core::retry::{RetryExecutor, RetryExecutorBuilder, RetryPredicate, TracingObserver};
use strongbox_core::types::RetryPolicy;

use crate::error::BackendError;

/// Retry predicate accepting transient backend errors only
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientOnly;

impl RetryPredicate<BackendError> for TransientOnly {
    fn should_retry(&self, error: &BackendError) -> bool {
        error.is_transient()
    }
}

/// Executor used by every remote call, logging under `operation`
pub type BackendRetry = RetryExecutor<TransientOnly, TracingObserver>;

/// Build the retry executor for one remote call
pub fn executor(policy: &RetryPolicy, operation: &'static str) -> BackendRetry {
    RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .with_predicate(TransientOnly)
        .with_observer(TracingObserver::new(operation))
        .build()
}

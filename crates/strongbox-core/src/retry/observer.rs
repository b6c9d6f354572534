//! Retry observation and logging

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::Interrupted;

/// Receives callbacks while a retry loop runs
pub trait RetryObserver: Send + Sync {
    /// An attempt is about to start (1-indexed)
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// An attempt failed and another will follow after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration);

    /// The operation succeeded
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// The final permitted attempt failed
    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display);

    /// The predicate refused to retry `error`
    fn on_rejected(&self, attempt: u32, error: &dyn Display) {
        let _ = (attempt, error);
    }

    /// The operation context stopped the loop
    fn on_interrupted(&self, attempt: u32, reason: Interrupted) {
        let _ = (attempt, reason);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_rejected(&self, attempt: u32, error: &dyn Display) {
        (**self).on_rejected(attempt, error)
    }

    fn on_interrupted(&self, attempt: u32, reason: Interrupted) {
        (**self).on_interrupted(attempt, reason)
    }
}

/// Does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {}
}

/// Logs retry events with `tracing`
///
/// - attempt start: TRACE
/// - attempt failed: WARN
/// - success: DEBUG (INFO when it took more than one attempt)
/// - exhausted: ERROR
/// - rejected, interrupted: DEBUG
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: &'static str,
}

impl TracingObserver {
    /// Create an observer that tags events with `operation`
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }

    /// The operation name used in log events
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::trace!(operation = self.operation, attempt, max_attempts, "Starting attempt");
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        tracing::warn!(
            operation = self.operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = self.operation,
                attempt,
                elapsed_ms = total_duration.as_millis() as u64,
                "Operation succeeded after retry"
            );
        } else {
            tracing::debug!(operation = self.operation, "Operation succeeded");
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        tracing::error!(
            operation = self.operation,
            attempts,
            error = %final_error,
            "All retry attempts exhausted"
        );
    }

    fn on_rejected(&self, attempt: u32, error: &dyn Display) {
        tracing::debug!(
            operation = self.operation,
            attempt,
            error = %error,
            "Error is not retryable"
        );
    }

    fn on_interrupted(&self, attempt: u32, reason: Interrupted) {
        tracing::debug!(operation = self.operation, attempt, %reason, "Operation interrupted");
    }
}

/// Counts events; handy in tests
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    rejections: AtomicU32,
    interruptions: AtomicU32,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    pub fn rejections(&self) -> u32 {
        self.rejections.load(Ordering::SeqCst)
    }

    pub fn interruptions(&self) -> u32 {
        self.interruptions.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_rejected(&self, _attempt: u32, _error: &dyn Display) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interrupted(&self, _attempt: u32, _reason: Interrupted) {
        self.interruptions.fetch_add(1, Ordering::SeqCst);
    }
}

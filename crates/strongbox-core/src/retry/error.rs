//! Error type returned by the retry engine

use std::time::Duration;
use thiserror::Error;

use crate::context::Interrupted;

/// Why a retried operation ultimately failed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed with a retryable error
    #[error("retry exhausted after {attempts} attempts over {:.2}s: {source}", .total_duration.as_secs_f64())]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total time spent across all attempts
        total_duration: Duration,
    },

    /// The predicate rejected the error, so no further attempt was made
    #[error("non-retryable error on attempt {attempt}: {source}")]
    NonRetryable {
        /// The attempt that produced the error
        attempt: u32,
        /// The rejected error
        source: E,
    },

    /// The operation context was cancelled or its deadline passed
    #[error("{reason} during attempt {attempt}")]
    Interrupted {
        /// The attempt that was running or about to run
        attempt: u32,
        /// Cancellation or deadline
        reason: Interrupted,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts that were started
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NonRetryable { attempt, .. } => *attempt,
            RetryError::Interrupted { attempt, .. } => *attempt,
        }
    }

    /// Check if all attempts were used up
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Check if the predicate refused to retry
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable { .. })
    }

    /// The interruption reason, if the context stopped the loop
    pub fn interruption(&self) -> Option<Interrupted> {
        match self {
            RetryError::Interrupted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The operation's own error, if an attempt completed with one
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Some(source)
            }
            RetryError::Interrupted { .. } => None,
        }
    }

    /// Split into either the interruption or the operation's error
    pub fn into_outcome(self) -> Result<E, Interrupted> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Ok(source)
            }
            RetryError::Interrupted { reason, .. } => Err(reason),
        }
    }
}

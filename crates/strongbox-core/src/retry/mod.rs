//! Retry execution engine
//!
//! Policy-driven retries for remote calls:
//!
//! - Fixed, exponential and linear backoff with optional jitter
//! - `RetryPredicate` to short-circuit errors that will never succeed
//! - `RetryObserver` callbacks, with a `TracingObserver` for logging
//! - Every attempt and every backoff sleep runs under an
//!   [`OperationContext`](crate::OperationContext), so deadlines and
//!   cancellation stop a retry loop promptly
//!
//! # Example
//!
//! ```rust,no_run
//! use strongbox_core::retry::{RetryError, RetryExecutorBuilder, TracingObserver};
//! use strongbox_core::types::RetryPolicy;
//! use strongbox_core::OperationContext;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let executor = RetryExecutorBuilder::new()
//!         .with_policy(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("fetch"))
//!         .build();
//!
//!     executor
//!         .execute(&OperationContext::new(), || async { Ok("done".to_string()) })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, NeverRetry, RetryPredicate};

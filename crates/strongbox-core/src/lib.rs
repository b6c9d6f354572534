//! Strongbox Core Library
//!
//! Shared building blocks for the strongbox vault crates:
//! - Retry engine with policy-based backoff and pluggable predicates
//! - Operation contexts carrying deadlines and cancellation
//! - Serializable retry policy types

pub mod context;
pub mod retry;
pub mod types;

pub use context::{CancelHandle, Interrupted, OperationContext};

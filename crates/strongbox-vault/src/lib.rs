//! Envelope-encrypted secret vault
//!
//! This crate stores named secrets in S3, each encrypted client-side with a
//! fresh KMS data key:
//! - **Parameter resolution**: bucket and key ARN come from explicit
//!   overrides or from the outputs of a CloudFormation stack
//! - **Envelope encryption**: AES-256-GCM (default) or ChaCha20-Poly1305,
//!   with the record metadata bound as associated data
//! - **Storage**: one private, SSE-S3 encrypted JSON object per secret
//! - **Resilience**: transient failures are retried with backoff, and every
//!   remote call honours the caller's deadline and cancellation
//!
//! The AWS clients live behind the [`StackDescriber`], [`KeyManagement`] and
//! [`ObjectStore`] traits; [`memory`] provides in-process implementations.

pub mod aws;
pub mod config;
pub mod crypto;
pub mod error;
pub mod memory;
pub mod record;
pub mod resolver;
pub mod storage;
pub mod transient;
pub mod value;
pub mod vault;

pub use config::{AmbientSettings, Credentials, EffectiveConfig, StackInfo, VaultOverrides};
pub use crypto::{CryptoEngine, DataKey, KeyManagement};
pub use error::{
    BackendError, BackendErrorKind, ConfigError, CryptoError, PolicyError, Result, StorageError,
    VaultError,
};
pub use record::{Algorithm, EncryptedRecord, RecordMeta};
pub use resolver::{ParameterResolver, StackDescriber, StackOutputs};
pub use storage::{ListPage, ObjectStore, SecretStorage};
pub use value::SecretValue;
pub use vault::Vault;

pub use strongbox_core::{CancelHandle, OperationContext};
pub use strongbox_core::types::{RetryPolicy, RetryStrategy};

//! Error types for strongbox-vault
//!
//! Every collaborator failure is translated into one [`VaultError`] kind.
//! The seam traits report failures as [`BackendError`], which carries just
//! enough classification for retry decisions and translation.

use std::fmt;

use strongbox_core::retry::RetryError;
use strongbox_core::Interrupted;
use thiserror::Error;

/// Result type alias using the vault's error type
pub type Result<T> = std::result::Result<T, VaultError>;

/// The single error type returned by vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation deadline passed
    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
}

/// Parameter resolution failures
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The CloudFormation stack does not exist
    #[error("Stack not found: {stack}")]
    StackNotFound { stack: String },

    /// The stack exists but lacks a required output
    #[error("Stack {stack} has no output named {output}")]
    MissingOutput { stack: String, output: &'static str },

    /// Neither an override nor the ambient environment supplied a region
    #[error("No AWS region configured")]
    MissingRegion,

    /// A resolved parameter is an empty string
    #[error("Resolved {parameter} is empty")]
    EmptyParameter { parameter: &'static str },

    /// Describing the stack failed for a reason other than absence
    #[error("Failed to describe stack {stack}: {source}")]
    StackLookup {
        stack: String,
        #[source]
        source: BackendError,
    },
}

/// Envelope encryption failures
#[derive(Error, Debug)]
pub enum CryptoError {
    /// KMS rejected or could not serve the key
    #[error("KMS key unavailable: {key_arn}: {source}")]
    KeyUnavailable {
        key_arn: String,
        #[source]
        source: BackendError,
    },

    /// The wrapped data key could not be unwrapped, or the record is malformed
    #[error("Decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// AEAD authentication failed
    #[error("Integrity check failed: ciphertext or metadata was modified")]
    IntegrityFailed,

    /// Local encryption failed
    #[error("Encryption failed: {reason}")]
    EncryptionFailed { reason: String },
}

/// Object storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object at the key
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// Connectivity, permission or service failure
    #[error("Storage unavailable for s3://{bucket}/{key}: {source}")]
    Unavailable {
        bucket: String,
        key: String,
        #[source]
        source: BackendError,
    },
}

/// Vault policy violations
#[derive(Error, Debug)]
pub enum PolicyError {
    /// A secret with this name exists and overwrite was not requested
    #[error("Secret already exists: {name}")]
    AlreadyExists { name: String },

    /// The secret name cannot be used
    #[error("Invalid secret name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl VaultError {
    /// Whether the error means the secret is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::Storage(StorageError::NotFound { .. }))
    }

    /// Whether the error came from the caller's context rather than a collaborator
    pub fn is_interrupted(&self) -> bool {
        matches!(self, VaultError::Cancelled | VaultError::DeadlineExceeded)
    }
}

impl From<Interrupted> for VaultError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => VaultError::Cancelled,
            Interrupted::DeadlineExceeded => VaultError::DeadlineExceeded,
        }
    }
}

/// Translate the outcome of a retried backend call
///
/// Interruptions become [`VaultError::Cancelled`] or
/// [`VaultError::DeadlineExceeded`]; a final backend error goes through
/// `translate`.
pub(crate) fn from_retry<F>(err: RetryError<BackendError>, translate: F) -> VaultError
where
    F: FnOnce(BackendError) -> VaultError,
{
    match err.into_outcome() {
        Ok(source) => translate(source),
        Err(reason) => reason.into(),
    }
}

/// Classification of a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Timeouts, dispatch failures, throttling, 5xx responses
    Transient,
    /// The addressed resource does not exist
    NotFound,
    /// Authentication or authorization failure
    Denied,
    /// The request or the resource state is invalid
    Invalid,
    /// Anything else
    Other,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendErrorKind::Transient => "transient",
            BackendErrorKind::NotFound => "not found",
            BackendErrorKind::Denied => "denied",
            BackendErrorKind::Invalid => "invalid",
            BackendErrorKind::Other => "error",
        };
        f.write_str(label)
    }
}

/// Failure reported by a [`StackDescriber`](crate::StackDescriber),
/// [`KeyManagement`](crate::KeyManagement) or [`ObjectStore`](crate::ObjectStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
    code: Option<String>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Denied, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Invalid, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Other, message)
    }

    /// Attach the service error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Service error code, e.g. `AccessDenied` or `ThrottlingException`
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

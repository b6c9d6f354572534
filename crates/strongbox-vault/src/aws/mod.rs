//! AWS backends
//!
//! CloudFormation, KMS and S3 implementations of the vault seams. The SDK's
//! own retry layer is switched off; transient failures are classified here
//! and retried by the vault's policy.

pub mod cloudformation;
pub mod kms;
pub mod s3;

pub use cloudformation::CloudFormationStacks;
pub use kms::KmsKeys;
pub use s3::S3ObjectStore;

use std::error::Error as StdError;
use std::sync::Arc;

use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use strongbox_core::types::RetryPolicy;
use strongbox_core::OperationContext;
use tracing::debug;

use crate::config::{AmbientSettings, Credentials, VaultOverrides};
use crate::error::{BackendError, BackendErrorKind, ConfigError, Result};
use crate::vault::Vault;

/// Name reported by the static credentials provider for overridden keys
const CREDENTIALS_PROVIDER_NAME: &str = "strongbox-override";

/// Region from the default AWS provider chain (environment, profile, IMDS)
pub async fn ambient_settings() -> AmbientSettings {
    let region = RegionProviderChain::default_provider().region().await;
    AmbientSettings {
        region: region.map(|r| r.to_string()),
    }
}

/// Shared SDK configuration for all three clients
pub async fn load_sdk_config(region: &str, credentials: Option<&Credentials>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .retry_config(RetryConfig::disabled());

    if let Some(credentials) = credentials {
        debug!(
            access_key_id = credentials.access_key_id(),
            "Using explicit AWS credentials"
        );
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        ));
    }

    loader.load().await
}

impl Vault {
    /// Resolve parameters and connect to the vault's AWS resources
    ///
    /// No stack, KMS or S3 request is made when the region cannot be
    /// determined. `ctx` bounds resolution only.
    pub async fn from_aws(
        overrides: &VaultOverrides,
        ambient: &AmbientSettings,
        policy: &RetryPolicy,
        ctx: &OperationContext,
    ) -> Result<Self> {
        let region = overrides
            .region()
            .or_else(|| ambient.region())
            .ok_or(ConfigError::MissingRegion)?;
        let sdk_config = load_sdk_config(region, overrides.credentials.as_ref()).await;

        Vault::connect(
            overrides,
            ambient,
            Arc::new(CloudFormationStacks::new(&sdk_config)),
            Arc::new(KmsKeys::new(&sdk_config)),
            Arc::new(S3ObjectStore::new(&sdk_config)),
            policy,
            ctx,
        )
        .await
    }
}

/// Convert an SDK failure into a classified [`BackendError`]
pub(crate) fn classify<E>(err: &SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
{
    let message = DisplayErrorContext(err).to_string();
    let kind = match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => BackendErrorKind::Transient,
        SdkError::ConstructionFailure(_) => BackendErrorKind::Invalid,
        _ => classify_code(
            err.code(),
            err.raw_response().map(|response| response.status().as_u16()),
        ),
    };

    let error = BackendError::new(kind, message);
    match err.code() {
        Some(code) => error.with_code(code),
        None => error,
    }
}

/// Classify by service error code, falling back to the HTTP status
pub(crate) fn classify_code(code: Option<&str>, status: Option<u16>) -> BackendErrorKind {
    match code {
        Some(
            "Throttling"
            | "ThrottlingException"
            | "ThrottledException"
            | "RequestLimitExceeded"
            | "TooManyRequestsException"
            | "SlowDown"
            | "RequestTimeout"
            | "RequestTimeoutException"
            | "InternalError"
            | "InternalFailure"
            | "ServiceUnavailable"
            | "KMSInternalException"
            | "DependencyTimeoutException",
        ) => return BackendErrorKind::Transient,
        Some("NoSuchKey" | "NotFound" | "NotFoundException") => {
            return BackendErrorKind::NotFound
        }
        Some(
            "AccessDenied"
            | "AccessDeniedException"
            | "Forbidden"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "ExpiredTokenException"
            | "UnrecognizedClientException",
        ) => return BackendErrorKind::Denied,
        Some(
            "DisabledException"
            | "KMSInvalidStateException"
            | "InvalidCiphertextException"
            | "IncorrectKeyException"
            | "InvalidKeyUsageException"
            | "ValidationError"
            | "InvalidRequest",
        ) => return BackendErrorKind::Invalid,
        // A missing bucket is a configuration problem, not a missing secret.
        Some("NoSuchBucket") => return BackendErrorKind::Other,
        _ => {}
    }

    match status {
        Some(429) | Some(500..=599) => BackendErrorKind::Transient,
        Some(404) => BackendErrorKind::NotFound,
        Some(401 | 403) => BackendErrorKind::Denied,
        Some(400..=499) => BackendErrorKind::Invalid,
        _ => BackendErrorKind::Other,
    }
}

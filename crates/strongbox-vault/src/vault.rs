//! The vault engine
//!
//! [`Vault`] composes a resolved [`EffectiveConfig`], the [`CryptoEngine`]
//! and [`SecretStorage`] into the five secret operations. Each operation is
//! a strict sequence of remote calls under the caller's
//! [`OperationContext`]; nothing is kept between calls.

use std::fmt;
use std::sync::Arc;

use strongbox_core::types::RetryPolicy;
use strongbox_core::OperationContext;
use tracing::{debug, info};

use crate::config::{AmbientSettings, EffectiveConfig, StackInfo, VaultOverrides};
use crate::crypto::{CryptoEngine, KeyManagement};
use crate::error::{PolicyError, Result};
use crate::record::Algorithm;
use crate::resolver::{ParameterResolver, StackDescriber};
use crate::storage::{ObjectStore, SecretStorage};
use crate::value::SecretValue;

/// Client for one resolved vault
///
/// Cloning is cheap; clones share the backends. Every operation has a
/// `*_with` variant taking the [`OperationContext`] that bounds that one
/// call; the plain form runs without deadline or cancellation.
#[derive(Clone)]
pub struct Vault {
    config: Arc<EffectiveConfig>,
    crypto: CryptoEngine,
    storage: SecretStorage,
}

impl Vault {
    /// Assemble a vault from already resolved parts
    pub fn with_components(
        config: EffectiveConfig,
        crypto: CryptoEngine,
        storage: SecretStorage,
    ) -> Self {
        Self {
            config: Arc::new(config),
            crypto,
            storage,
        }
    }

    /// Resolve parameters, then build a vault over the given backends
    ///
    /// The stack is consulted only for values `overrides` leaves open.
    /// Resolution errors are returned before any KMS or storage call.
    /// `policy` governs the stack lookup and every later KMS and storage
    /// call; `ctx` bounds resolution only.
    pub async fn connect(
        overrides: &VaultOverrides,
        ambient: &AmbientSettings,
        stacks: Arc<dyn StackDescriber>,
        kms: Arc<dyn KeyManagement>,
        store: Arc<dyn ObjectStore>,
        policy: &RetryPolicy,
        ctx: &OperationContext,
    ) -> Result<Self> {
        let config = ParameterResolver::new(stacks)
            .with_retry_policy(policy.clone())
            .resolve(overrides, ambient, ctx)
            .await?;

        Ok(Self::with_components(
            config,
            CryptoEngine::new(kms),
            SecretStorage::new(store),
        )
        .with_retry_policy(policy.clone()))
    }

    /// Retry policy for KMS and storage calls
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.crypto = self.crypto.with_retry_policy(policy.clone());
        self.storage = self.storage.with_retry_policy(policy);
        self
    }

    /// AEAD for newly stored secrets
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.crypto = self.crypto.with_algorithm(algorithm);
        self
    }

    /// The resolved parameters
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn stack_info(&self) -> StackInfo {
        self.config.stack_info()
    }

    /// Encrypt and store `value` under `name`
    ///
    /// Without `overwrite`, an existing secret fails the call with
    /// [`PolicyError::AlreadyExists`] and nothing is written.
    pub async fn store(&self, name: &str, value: &[u8], overwrite: bool) -> Result<()> {
        self.store_with(name, value, overwrite, &OperationContext::new()).await
    }

    /// [`store`](Self::store) under `ctx`
    pub async fn store_with(
        &self,
        name: &str,
        value: &[u8],
        overwrite: bool,
        ctx: &OperationContext,
    ) -> Result<()> {
        validate_name(name)?;
        let key = self.config.full_key(name);
        let bucket = self.config.bucket();

        if !overwrite && self.storage.exists(bucket, &key, ctx).await? {
            debug!(name, "Refusing to overwrite existing secret");
            return Err(PolicyError::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }

        let record = self.crypto.encrypt(value, self.config.key_arn(), ctx).await?;
        self.storage.put(bucket, &key, &record, ctx).await?;

        info!(name, overwrite, "Stored secret");
        Ok(())
    }

    /// Fetch and decrypt the secret called `name`
    pub async fn lookup(&self, name: &str) -> Result<SecretValue> {
        self.lookup_with(name, &OperationContext::new()).await
    }

    /// [`lookup`](Self::lookup) under `ctx`
    pub async fn lookup_with(&self, name: &str, ctx: &OperationContext) -> Result<SecretValue> {
        validate_name(name)?;
        let key = self.config.full_key(name);

        let record = self.storage.get(self.config.bucket(), &key, ctx).await?;
        let plaintext = self
            .crypto
            .decrypt(&record, self.config.key_arn(), ctx)
            .await?;

        debug!(name, "Looked up secret");
        Ok(SecretValue::from_plaintext(plaintext))
    }

    /// Delete `name`. Deleting a missing secret succeeds.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.delete_with(name, &OperationContext::new()).await
    }

    /// [`delete`](Self::delete) under `ctx`
    pub async fn delete_with(&self, name: &str, ctx: &OperationContext) -> Result<()> {
        validate_name(name)?;
        let key = self.config.full_key(name);
        self.storage.delete(self.config.bucket(), &key, ctx).await?;

        info!(name, "Deleted secret");
        Ok(())
    }

    /// Whether `name` is stored. Nothing is decrypted.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.exists_with(name, &OperationContext::new()).await
    }

    /// [`exists`](Self::exists) under `ctx`
    pub async fn exists_with(&self, name: &str, ctx: &OperationContext) -> Result<bool> {
        validate_name(name)?;
        let key = self.config.full_key(name);
        self.storage.exists(self.config.bucket(), &key, ctx).await
    }

    /// Names of all secrets under the prefix, in storage order
    pub async fn all(&self) -> Result<Vec<String>> {
        self.all_with(&OperationContext::new()).await
    }

    /// [`all`](Self::all) under `ctx`
    pub async fn all_with(&self, ctx: &OperationContext) -> Result<Vec<String>> {
        let keys = self
            .storage
            .list(self.config.bucket(), self.config.prefix(), ctx)
            .await?;

        Ok(keys
            .iter()
            .filter_map(|key| self.config.strip_prefix(key))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl fmt::Display for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.config.as_ref(), f)
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("config", &self.config)
            .field("crypto", &self.crypto)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> std::result::Result<(), PolicyError> {
    if name.is_empty() {
        return Err(PolicyError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty",
        });
    }
    Ok(())
}

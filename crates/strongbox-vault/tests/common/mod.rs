//! Common test utilities for strongbox-vault
//!
//! Builds vaults over the in-memory backends with handles kept for
//! inspecting call counts and raw stored objects.

#![allow(dead_code)]

use std::sync::Arc;

use strongbox_vault::config::{BUCKET_OUTPUT, KEY_OUTPUT};
use strongbox_vault::memory::{MemoryKms, MemoryObjectStore, MemoryStacks};
use strongbox_vault::{
    AmbientSettings, EncryptedRecord, OperationContext, Result, RetryPolicy, RetryStrategy, Vault,
    VaultOverrides,
};

pub const BUCKET: &str = "vault-eu-west-1-111122223333";
pub const KEY_ARN: &str = "arn:aws:kms:eu-west-1:111122223333:key/0f1e2d3c";
pub const REGION: &str = "eu-west-1";

/// Short fixed delays so retry tests stay fast
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        strategy: RetryStrategy::FixedDelay,
        backoff_multiplier: 1.0,
        initial_delay_ms: 1,
        max_delay_ms: 5,
    }
}

pub fn ambient() -> AmbientSettings {
    AmbientSettings::new().with_region(REGION)
}

/// In-memory backends behind a vault
pub struct Fixture {
    pub stacks: Arc<MemoryStacks>,
    pub kms: Arc<MemoryKms>,
    pub store: Arc<MemoryObjectStore>,
}

impl Fixture {
    /// Default `vault` stack, one enabled key, empty bucket
    pub fn new() -> Self {
        Self::with_store(MemoryObjectStore::new())
    }

    pub fn with_store(store: MemoryObjectStore) -> Self {
        let stacks = MemoryStacks::new();
        stacks.add_stack("vault", [(BUCKET_OUTPUT, BUCKET), (KEY_OUTPUT, KEY_ARN)]);
        let kms = MemoryKms::new();
        kms.add_key(KEY_ARN);

        Self {
            stacks: Arc::new(stacks),
            kms: Arc::new(kms),
            store: Arc::new(store),
        }
    }

    pub async fn connect(&self, overrides: &VaultOverrides) -> Result<Vault> {
        self.connect_with(overrides, &fast_policy(), &OperationContext::new())
            .await
    }

    pub async fn connect_with(
        &self,
        overrides: &VaultOverrides,
        policy: &RetryPolicy,
        ctx: &OperationContext,
    ) -> Result<Vault> {
        Vault::connect(
            overrides,
            &ambient(),
            self.stacks.clone(),
            self.kms.clone(),
            self.store.clone(),
            policy,
            ctx,
        )
        .await
    }

    /// Vault on the default stack with `prefix`
    pub async fn vault(&self, prefix: &str) -> Vault {
        self.connect(&VaultOverrides::new().with_prefix(prefix))
            .await
            .expect("vault should resolve against the default stack")
    }

    /// The stored record at a fully qualified key
    pub fn record(&self, key: &str) -> EncryptedRecord {
        let bytes = self.store.object(BUCKET, key).expect("object should exist");
        EncryptedRecord::from_bytes(&bytes).expect("object should be a record")
    }

    /// Replace the stored record at a fully qualified key
    pub fn replace_record(&self, key: &str, record: &EncryptedRecord) {
        let bytes = record.to_bytes().expect("record should serialize");
        self.store.put_raw(BUCKET, key, bytes);
    }
}

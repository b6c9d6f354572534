//! Storage backend
//!
//! [`ObjectStore`] is the raw object seam (S3 or in-memory).
//! [`SecretStorage`] layers the record codec, transient retries and error
//! translation on top of it. Keys passed in are fully qualified; the prefix
//! has already been applied.

use std::sync::Arc;

use async_trait::async_trait;
use strongbox_core::types::RetryPolicy;
use strongbox_core::OperationContext;
use tracing::{debug, info};

use crate::error::{from_retry, BackendError, Result, StorageError, VaultError};
use crate::record::EncryptedRecord;
use crate::transient;

/// One page of a key listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Raw object storage addressed by bucket and key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body`, replacing any existing object
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
    ) -> std::result::Result<(), BackendError>;

    /// Read an object. A missing object is a `NotFound` error.
    async fn get_object(&self, bucket: &str, key: &str)
        -> std::result::Result<Vec<u8>, BackendError>;

    /// Whether an object exists, without reading it
    async fn head_object(&self, bucket: &str, key: &str) -> std::result::Result<bool, BackendError>;

    /// Remove an object. Removing a missing object succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> std::result::Result<(), BackendError>;

    /// List keys under `prefix` in storage order, one page at a time
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> std::result::Result<ListPage, BackendError>;
}

/// Encrypted record storage on top of an [`ObjectStore`]
#[derive(Clone)]
pub struct SecretStorage {
    store: Arc<dyn ObjectStore>,
    retry_policy: RetryPolicy,
}

impl SecretStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Write a record, overwriting whatever is at `key`
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        record: &EncryptedRecord,
        ctx: &OperationContext,
    ) -> Result<()> {
        let body = record.to_bytes()?;
        debug!("Uploading secret ({} bytes): s3://{}/{}", body.len(), bucket, key);

        transient::executor(&self.retry_policy, "put-object")
            .execute(ctx, || self.store.put_object(bucket, key, &body))
            .await
            .map_err(|err| from_retry(err, |source| unavailable(bucket, key, source)))?;

        info!("Stored secret at s3://{}/{}", bucket, key);
        Ok(())
    }

    /// Read the record at `key`
    pub async fn get(
        &self,
        bucket: &str,
        key: &str,
        ctx: &OperationContext,
    ) -> Result<EncryptedRecord> {
        debug!("Downloading secret: s3://{}/{}", bucket, key);

        let body = transient::executor(&self.retry_policy, "get-object")
            .execute(ctx, || self.store.get_object(bucket, key))
            .await
            .map_err(|err| {
                from_retry(err, |source| {
                    if source.is_not_found() {
                        StorageError::NotFound {
                            key: key.to_string(),
                        }
                        .into()
                    } else {
                        unavailable(bucket, key, source)
                    }
                })
            })?;

        debug!("Downloaded {} bytes from s3://{}/{}", body.len(), bucket, key);
        Ok(EncryptedRecord::from_bytes(&body)?)
    }

    /// Remove the record at `key`. Succeeds when nothing is there.
    pub async fn delete(&self, bucket: &str, key: &str, ctx: &OperationContext) -> Result<()> {
        debug!("Deleting secret: s3://{}/{}", bucket, key);

        let outcome = transient::executor(&self.retry_policy, "delete-object")
            .execute(ctx, || self.store.delete_object(bucket, key))
            .await;

        if let Err(err) = outcome {
            match err.into_outcome() {
                Ok(source) if source.is_not_found() => {
                    debug!("Secret already absent: s3://{}/{}", bucket, key);
                }
                Ok(source) => return Err(unavailable(bucket, key, source)),
                Err(reason) => return Err(reason.into()),
            }
        }

        info!("Deleted secret: s3://{}/{}", bucket, key);
        Ok(())
    }

    /// Whether a record exists at `key`, without downloading it
    pub async fn exists(&self, bucket: &str, key: &str, ctx: &OperationContext) -> Result<bool> {
        let found = transient::executor(&self.retry_policy, "head-object")
            .execute(ctx, || self.store.head_object(bucket, key))
            .await
            .map_err(|err| from_retry(err, |source| unavailable(bucket, key, source)))?;

        debug!(found, "Checked secret existence: s3://{}/{}", bucket, key);
        Ok(found)
    }

    /// Every key under `prefix` in storage order, across all pages
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        ctx: &OperationContext,
    ) -> Result<Vec<String>> {
        debug!("Listing secrets in s3://{}/{}", bucket, prefix);

        let executor = transient::executor(&self.retry_policy, "list-objects");
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let token = continuation_token.as_deref();
            let page = executor
                .execute(ctx, || self.store.list_objects(bucket, prefix, token))
                .await
                .map_err(|err| from_retry(err, |source| unavailable(bucket, prefix, source)))?;

            pages += 1;
            keys.extend(page.keys);

            match page.next_token {
                Some(next) => continuation_token = Some(next),
                None => break,
            }
        }

        debug!(pages, "Found {} keys", keys.len());
        Ok(keys)
    }
}

impl std::fmt::Debug for SecretStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStorage")
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

fn unavailable(bucket: &str, key: &str, source: BackendError) -> VaultError {
    StorageError::Unavailable {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source,
    }
    .into()
}

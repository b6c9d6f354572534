//! Objects in S3
//!
//! Records are written private with SSE-S3 (AES256) server-side encryption
//! on top of the client-side envelope encryption.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ObjectCannedAcl, ServerSideEncryption};
use aws_sdk_s3::Client;
use tracing::debug;

use super::classify;
use crate::error::BackendError;
use crate::storage::{ListPage, ObjectStore};

/// S3-backed [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .content_type("application/json")
            .acl(ObjectCannedAcl::Private)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BackendError> {
        let response = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Err(BackendError::not_found(format!("No such key: {key}"))
                        .with_code("NoSuchKey"));
                }
                return Err(classify(&e));
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| BackendError::transient(format!("Failed to read response body: {e}")))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, BackendError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    debug!("Object does not exist: s3://{}/{}", bucket, key);
                    Ok(false)
                } else {
                    Err(classify(&e))
                }
            }
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, BackendError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let keys = response
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| object.key)
            .collect();

        let next_token = if response.is_truncated == Some(true) {
            response.next_continuation_token
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }
}

//! Data keys from KMS `GenerateDataKey` and `Decrypt`

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use aws_sdk_kms::Client;
use zeroize::Zeroizing;

use super::classify;
use crate::crypto::{DataKey, KeyManagement};
use crate::error::BackendError;

/// KMS-backed [`KeyManagement`]
#[derive(Debug, Clone)]
pub struct KmsKeys {
    client: Client,
}

impl KmsKeys {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyManagement for KmsKeys {
    async fn generate_data_key(&self, key_arn: &str) -> Result<DataKey, BackendError> {
        let mut response = self
            .client
            .generate_data_key()
            .key_id(key_arn)
            .key_spec(DataKeySpec::Aes256)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let plaintext = response
            .plaintext
            .take()
            .ok_or_else(|| BackendError::other("GenerateDataKey returned no plaintext key"))?;
        let wrapped = response
            .ciphertext_blob
            .take()
            .ok_or_else(|| BackendError::other("GenerateDataKey returned no ciphertext blob"))?;

        Ok(DataKey {
            plaintext: Zeroizing::new(plaintext.into_inner()),
            wrapped: wrapped.into_inner(),
        })
    }

    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        key_arn: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        let mut response = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(wrapped))
            .key_id(key_arn)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        response
            .plaintext
            .take()
            .map(|blob| Zeroizing::new(blob.into_inner()))
            .ok_or_else(|| BackendError::other("Decrypt returned no plaintext key"))
    }
}

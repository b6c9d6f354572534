//! Envelope encryption
//!
//! Encrypt:
//! 1. Ask KMS for a fresh AES-256 data key bound to the vault key
//! 2. Encrypt the value locally with the plaintext data key and a random
//!    96-bit nonce, authenticating the metadata JSON as associated data
//! 3. Keep the KMS-wrapped data key next to the ciphertext
//!
//! Decrypt reverses this: KMS unwraps the data key, then the AEAD
//! authenticates and decrypts. The plaintext data key lives in
//! [`Zeroizing`] memory for the duration of one call and is never logged.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use async_trait::async_trait;
use chacha20poly1305::ChaCha20Poly1305;
use rand::RngCore;
use strongbox_core::types::RetryPolicy;
use strongbox_core::OperationContext;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{from_retry, BackendError, CryptoError, Result};
use crate::record::{Algorithm, EncryptedRecord, RecordMeta};
use crate::transient;

/// Size of the data key in bytes (256 bits)
pub const DATA_KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for both AEADs)
pub const NONCE_SIZE: usize = 12;

/// A data key in plaintext and KMS-wrapped form
pub struct DataKey {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub wrapped: Vec<u8>,
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey")
            .field("plaintext", &"[REDACTED]")
            .field("wrapped", &format_args!("{} bytes", self.wrapped.len()))
            .finish()
    }
}

/// Key-management service issuing and unwrapping data keys
#[async_trait]
pub trait KeyManagement: Send + Sync {
    /// Generate a 256-bit data key under `key_arn`
    async fn generate_data_key(&self, key_arn: &str) -> std::result::Result<DataKey, BackendError>;

    /// Unwrap a data key previously issued under `key_arn`
    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        key_arn: &str,
    ) -> std::result::Result<Zeroizing<Vec<u8>>, BackendError>;
}

/// Encrypts and decrypts secret values with KMS data keys
#[derive(Clone)]
pub struct CryptoEngine {
    kms: Arc<dyn KeyManagement>,
    algorithm: Algorithm,
    retry_policy: RetryPolicy,
}

impl CryptoEngine {
    pub fn new(kms: Arc<dyn KeyManagement>) -> Self {
        Self {
            kms,
            algorithm: Algorithm::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// AEAD used for new records. Decryption follows each record's own tag.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Encrypt `plaintext` under a fresh data key issued for `key_arn`
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        key_arn: &str,
        ctx: &OperationContext,
    ) -> Result<EncryptedRecord> {
        let data_key = transient::executor(&self.retry_policy, "kms-generate-data-key")
            .execute(ctx, || self.kms.generate_data_key(key_arn))
            .await
            .map_err(|err| {
                from_retry(err, |source| {
                    CryptoError::KeyUnavailable {
                        key_arn: key_arn.to_string(),
                        source,
                    }
                    .into()
                })
            })?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);

        let meta = RecordMeta::new(self.algorithm, &nonce).to_json()?;
        let ciphertext = seal(
            self.algorithm,
            &data_key.plaintext,
            &nonce,
            plaintext,
            meta.as_bytes(),
        )?;

        debug!(
            algorithm = %self.algorithm,
            bytes = plaintext.len(),
            "Encrypted secret value"
        );

        Ok(EncryptedRecord {
            wrapped_data_key: data_key.wrapped,
            ciphertext,
            meta,
        })
    }

    /// Authenticate and decrypt `record` using a data key unwrapped under `key_arn`
    pub async fn decrypt(
        &self,
        record: &EncryptedRecord,
        key_arn: &str,
        ctx: &OperationContext,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let meta = RecordMeta::parse(&record.meta)?;
        let nonce = meta.nonce_bytes()?;
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::DecryptionFailed {
                reason: format!(
                    "invalid nonce size: expected {}, got {}",
                    NONCE_SIZE,
                    nonce.len()
                ),
            }
            .into());
        }

        let data_key = transient::executor(&self.retry_policy, "kms-decrypt")
            .execute(ctx, || {
                self.kms
                    .decrypt_data_key(&record.wrapped_data_key, key_arn)
            })
            .await
            .map_err(|err| {
                from_retry(err, |source| {
                    if source.is_transient() {
                        CryptoError::KeyUnavailable {
                            key_arn: key_arn.to_string(),
                            source,
                        }
                        .into()
                    } else {
                        CryptoError::DecryptionFailed {
                            reason: format!("unable to unwrap data key: {source}"),
                        }
                        .into()
                    }
                })
            })?;

        let plaintext = open(
            meta.alg,
            &data_key,
            &nonce,
            &record.ciphertext,
            record.meta.as_bytes(),
        )?;

        debug!(algorithm = %meta.alg, bytes = plaintext.len(), "Decrypted secret value");
        Ok(plaintext)
    }
}

impl std::fmt::Debug for CryptoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoEngine")
            .field("algorithm", &self.algorithm)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

fn seal(
    algorithm: Algorithm,
    key: &[u8],
    nonce: &[u8],
    msg: &[u8],
    aad: &[u8],
) -> std::result::Result<Vec<u8>, CryptoError> {
    if key.len() != DATA_KEY_SIZE {
        return Err(CryptoError::EncryptionFailed {
            reason: format!(
                "data key must be {} bytes, got {}",
                DATA_KEY_SIZE,
                key.len()
            ),
        });
    }

    let payload = Payload { msg, aad };
    let sealed = match algorithm {
        Algorithm::AesGcm => Aes256Gcm::new_from_slice(key)
            .map_err(|e| encryption_failed(&e))?
            .encrypt(aes_gcm::Nonce::from_slice(nonce), payload),
        Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| encryption_failed(&e))?
            .encrypt(chacha20poly1305::Nonce::from_slice(nonce), payload),
    };

    sealed.map_err(|e| encryption_failed(&e))
}

fn open(
    algorithm: Algorithm,
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> std::result::Result<Zeroizing<Vec<u8>>, CryptoError> {
    if key.len() != DATA_KEY_SIZE {
        return Err(CryptoError::DecryptionFailed {
            reason: format!("unwrapped data key has {} bytes", key.len()),
        });
    }

    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let opened = match algorithm {
        Algorithm::AesGcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::IntegrityFailed)?
            .decrypt(aes_gcm::Nonce::from_slice(nonce), payload),
        Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::IntegrityFailed)?
            .decrypt(chacha20poly1305::Nonce::from_slice(nonce), payload),
    };

    opened
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::IntegrityFailed)
}

fn encryption_failed(err: &dyn std::fmt::Display) -> CryptoError {
    CryptoError::EncryptionFailed {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::memory::MemoryKms;
    use strongbox_core::types::RetryStrategy;

    const KEY: &str = "arn:aws:kms:eu-west-1:111122223333:key/test";

    fn engine(kms: &Arc<MemoryKms>) -> CryptoEngine {
        CryptoEngine::new(kms.clone()).with_retry_policy(RetryPolicy {
            strategy: RetryStrategy::None,
            ..RetryPolicy::default()
        })
    }

    fn kms() -> Arc<MemoryKms> {
        let kms = MemoryKms::new();
        kms.add_key(KEY);
        Arc::new(kms)
    }

    #[tokio::test]
    async fn test_round_trip_both_algorithms() {
        let kms = kms();
        let ctx = OperationContext::new();
        for algorithm in [Algorithm::AesGcm, Algorithm::ChaCha20Poly1305] {
            let engine = engine(&kms).with_algorithm(algorithm);
            let record = engine.encrypt(b"hunter2", KEY, &ctx).await.unwrap();

            assert_ne!(record.ciphertext, b"hunter2");
            assert_eq!(record.ciphertext.len(), b"hunter2".len() + 16);
            assert_eq!(RecordMeta::parse(&record.meta).unwrap().alg, algorithm);

            let plaintext = engine.decrypt(&record, KEY, &ctx).await.unwrap();
            assert_eq!(plaintext.as_slice(), b"hunter2");
        }
    }

    #[tokio::test]
    async fn test_decrypt_follows_record_algorithm() {
        let kms = kms();
        let ctx = OperationContext::new();
        let record = engine(&kms)
            .with_algorithm(Algorithm::ChaCha20Poly1305)
            .encrypt(b"value", KEY, &ctx)
            .await
            .unwrap();

        let plaintext = engine(&kms).decrypt(&record, KEY, &ctx).await.unwrap();
        assert_eq!(plaintext.as_slice(), b"value");
    }

    #[tokio::test]
    async fn test_fresh_nonce_and_key_per_record() {
        let kms = kms();
        let ctx = OperationContext::new();
        let engine = engine(&kms);
        let first = engine.encrypt(b"same", KEY, &ctx).await.unwrap();
        let second = engine.encrypt(b"same", KEY, &ctx).await.unwrap();

        assert_ne!(first.meta, second.meta);
        assert_ne!(first.wrapped_data_key, second.wrapped_data_key);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_fails_integrity() {
        let kms = kms();
        let ctx = OperationContext::new();
        let engine = engine(&kms);
        let mut record = engine.encrypt(b"payload", KEY, &ctx).await.unwrap();
        record.ciphertext[0] ^= 0x01;

        let err = engine.decrypt(&record, KEY, &ctx).await.unwrap_err();
        assert!(matches!(err, VaultError::Crypto(CryptoError::IntegrityFailed)));
    }

    #[tokio::test]
    async fn test_tampered_meta_fails_integrity() {
        let kms = kms();
        let ctx = OperationContext::new();
        let engine = engine(&kms);
        let mut record = engine.encrypt(b"payload", KEY, &ctx).await.unwrap();
        record.meta = record.meta.replace("\"version\":1", "\"version\": 1");

        let err = engine.decrypt(&record, KEY, &ctx).await.unwrap_err();
        assert!(matches!(err, VaultError::Crypto(CryptoError::IntegrityFailed)));
    }

    #[tokio::test]
    async fn test_unknown_key_is_unavailable() {
        let kms = kms();
        let err = engine(&kms)
            .encrypt(b"x", "arn:aws:kms:eu-west-1:111122223333:key/missing", &OperationContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Crypto(CryptoError::KeyUnavailable { .. })
        ));
        assert_eq!(kms.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_wrong_key_fails_unwrap() {
        let kms = kms();
        let other = "arn:aws:kms:eu-west-1:111122223333:key/other";
        kms.add_key(other);
        let ctx = OperationContext::new();
        let engine = engine(&kms);
        let record = engine.encrypt(b"x", KEY, &ctx).await.unwrap();

        let err = engine.decrypt(&record, other, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Crypto(CryptoError::DecryptionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_key_fails_unwrap() {
        let kms = kms();
        let ctx = OperationContext::new();
        let engine = engine(&kms);
        let record = engine.encrypt(b"x", KEY, &ctx).await.unwrap();
        kms.disable_key(KEY);

        let err = engine.decrypt(&record, KEY, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Crypto(CryptoError::DecryptionFailed { .. })
        ));
        assert_eq!(kms.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_kms_failure_is_retried() {
        let kms = kms();
        kms.fail_next(2, BackendError::transient("ThrottlingException"));
        let ctx = OperationContext::new();

        let record = engine(&kms).encrypt(b"x", KEY, &ctx).await.unwrap();
        assert_eq!(kms.generate_calls(), 3);
        assert!(!record.wrapped_data_key.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_meta_never_reaches_kms() {
        let kms = kms();
        let record = EncryptedRecord {
            wrapped_data_key: vec![1; 8],
            ciphertext: vec![2; 32],
            meta: "not json".to_string(),
        };

        let err = engine(&kms)
            .decrypt(&record, KEY, &OperationContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Crypto(CryptoError::DecryptionFailed { .. })
        ));
        assert_eq!(kms.decrypt_calls(), 0);
    }
}

//! On-storage representation of a secret
//!
//! A record is one JSON object:
//!
//! ```json
//! {
//!   "wrapped_data_key": "<base64>",
//!   "ciphertext": "<base64, includes the AEAD tag>",
//!   "meta": "{\"alg\":\"AESGCM\",\"nonce\":\"<base64>\",\"version\":1}"
//! }
//! ```
//!
//! `meta` is kept as the exact string that was authenticated as associated
//! data, so any edit to it fails decryption.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Record format version written by this crate
pub const RECORD_VERSION: u32 = 1;

/// AEAD used for the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Algorithm {
    /// AES-256-GCM (default)
    #[default]
    #[serde(rename = "AESGCM")]
    AesGcm,
    /// ChaCha20-Poly1305
    #[serde(rename = "CHACHA20POLY1305")]
    ChaCha20Poly1305,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::AesGcm => write!(f, "AESGCM"),
            Algorithm::ChaCha20Poly1305 => write!(f, "CHACHA20POLY1305"),
        }
    }
}

/// Metadata bound to the ciphertext as associated data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub alg: Algorithm,
    /// Base64 nonce
    pub nonce: String,
    pub version: u32,
}

impl RecordMeta {
    pub fn new(alg: Algorithm, nonce: &[u8]) -> Self {
        Self {
            alg,
            nonce: BASE64.encode(nonce),
            version: RECORD_VERSION,
        }
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::EncryptionFailed {
            reason: format!("failed to serialize record metadata: {e}"),
        })
    }

    /// Parse and validate stored metadata
    pub fn parse(meta: &str) -> Result<Self, CryptoError> {
        let parsed: Self = serde_json::from_str(meta).map_err(|e| malformed(format!("metadata: {e}")))?;
        if parsed.version != RECORD_VERSION {
            return Err(malformed(format!(
                "unsupported record version {}",
                parsed.version
            )));
        }
        Ok(parsed)
    }

    pub fn nonce_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        BASE64
            .decode(&self.nonce)
            .map_err(|e| malformed(format!("nonce: {e}")))
    }
}

/// Wrapped data key, ciphertext and metadata of one secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    #[serde(with = "base64_bytes")]
    pub wrapped_data_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    pub meta: String,
}

impl EncryptedRecord {
    /// Serialize for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        serde_json::to_vec(self).map_err(|e| CryptoError::EncryptionFailed {
            reason: format!("failed to serialize record: {e}"),
        })
    }

    /// Parse a stored object. Anything that is not a record is a decryption failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        serde_json::from_slice(bytes).map_err(|e| malformed(format!("record: {e}")))
    }
}

impl std::fmt::Debug for EncryptedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedRecord")
            .field("wrapped_data_key", &format_args!("{} bytes", self.wrapped_data_key.len()))
            .field("ciphertext", &format_args!("{} bytes", self.ciphertext.len()))
            .field("meta", &self.meta)
            .finish()
    }
}

fn malformed(detail: String) -> CryptoError {
    CryptoError::DecryptionFailed {
        reason: format!("malformed {detail}"),
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

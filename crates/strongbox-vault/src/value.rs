//! Secret values returned by lookup

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// A decrypted secret, zeroed on drop
///
/// Valid UTF-8 plaintext comes back as [`SecretValue::Utf8`], anything else
/// as [`SecretValue::Binary`]. `Debug` and `Display` never show the value.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum SecretValue {
    Utf8(String),
    Binary(Vec<u8>),
}

impl SecretValue {
    /// Classify decrypted bytes, taking them out of their zeroizing buffer
    pub fn from_plaintext(mut plaintext: Zeroizing<Vec<u8>>) -> Self {
        Self::from(std::mem::take(&mut *plaintext))
    }

    /// The raw bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SecretValue::Utf8(s) => s.as_bytes(),
            SecretValue::Binary(b) => b,
        }
    }

    /// The text form, if the value is UTF-8 (use with caution)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SecretValue::Utf8(s) => Some(s),
            SecretValue::Binary(_) => None,
        }
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self, SecretValue::Utf8(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for SecretValue {
    fn from(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => SecretValue::Utf8(text),
            Err(err) => SecretValue::Binary(err.into_bytes()),
        }
    }
}

impl From<String> for SecretValue {
    fn from(text: String) -> Self {
        SecretValue::Utf8(text)
    }
}

impl From<&str> for SecretValue {
    fn from(text: &str) -> Self {
        SecretValue::Utf8(text.to_string())
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::Utf8(_) => write!(f, "SecretValue::Utf8([REDACTED {} bytes])", self.len()),
            SecretValue::Binary(_) => {
                write!(f, "SecretValue::Binary([REDACTED {} bytes])", self.len())
            }
        }
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

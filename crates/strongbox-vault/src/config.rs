//! Vault parameters
//!
//! [`VaultOverrides`] holds what the caller supplied explicitly,
//! [`AmbientSettings`] what the environment supplied, and
//! [`EffectiveConfig`] the flat result of resolving both against a stack.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Stack queried when no stack name is given
pub const DEFAULT_STACK_NAME: &str = "vault";

/// Stack output holding the bucket name
pub const BUCKET_OUTPUT: &str = "vaultBucketName";

/// Stack output holding the KMS key ARN
pub const KEY_OUTPUT: &str = "kmsKeyArn";

/// Static AWS access key pair, zeroed on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret half (use with caution)
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.access_key_id == other.access_key_id
            && self.secret_access_key == other.secret_access_key
    }
}

impl Eq for Credentials {}

/// Explicit parameters supplied by the caller
///
/// Every field is optional. Blank strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct VaultOverrides {
    pub stack_name: Option<String>,
    pub bucket: Option<String>,
    pub key_arn: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub credentials: Option<Credentials>,
}

impl VaultOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = Some(stack_name.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_key_arn(mut self, key_arn: impl Into<String>) -> Self {
        self.key_arn = Some(key_arn.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The stack to query, falling back to [`DEFAULT_STACK_NAME`]
    pub fn stack_name(&self) -> &str {
        present(&self.stack_name).unwrap_or(DEFAULT_STACK_NAME)
    }

    pub fn bucket(&self) -> Option<&str> {
        present(&self.bucket)
    }

    pub fn key_arn(&self) -> Option<&str> {
        present(&self.key_arn)
    }

    pub fn prefix(&self) -> Option<&str> {
        present(&self.prefix)
    }

    pub fn region(&self) -> Option<&str> {
        present(&self.region)
    }
}

/// Parameters the environment provides when no override is given
#[derive(Debug, Clone, Default)]
pub struct AmbientSettings {
    pub region: Option<String>,
}

impl AmbientSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn region(&self) -> Option<&str> {
        present(&self.region)
    }
}

/// Fully resolved vault parameters
///
/// `bucket` and `key_arn` are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    bucket: String,
    key_arn: String,
    region: String,
    prefix: String,
    stack_name: String,
    credentials: Option<Credentials>,
}

impl EffectiveConfig {
    pub(crate) fn new(
        bucket: String,
        key_arn: String,
        region: String,
        prefix: String,
        stack_name: String,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            bucket,
            key_arn,
            region,
            prefix,
            stack_name,
            credentials,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_arn(&self) -> &str {
        &self.key_arn
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Key prefix, either empty or ending in `/`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Where the parameters came from
    pub fn stack_info(&self) -> StackInfo {
        StackInfo {
            stack_name: self.stack_name.clone(),
            bucket: self.bucket.clone(),
            key_arn: self.key_arn.clone(),
        }
    }

    /// Storage key for a secret name
    pub fn full_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Secret name for a storage key, if the key lies under the prefix
    pub fn strip_prefix<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
    }
}

impl fmt::Display for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "region: {}", self.region)?;
        writeln!(f, "{}", self.stack_info())?;
        write!(f, "prefix: {}", self.prefix)
    }
}

/// Stack name, bucket and key of a resolved vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackInfo {
    pub stack_name: String,
    pub bucket: String,
    pub key_arn: String,
}

impl fmt::Display for StackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stack: {}", self.stack_name)?;
        writeln!(f, "bucket: {}", self.bucket)?;
        write!(f, "key: {}", self.key_arn)
    }
}

/// Append `/` to a non-empty prefix that lacks one
pub fn normalize_prefix(prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.ends_with('/') => format!("{prefix}/"),
        Some(prefix) => prefix.to_string(),
        None => String::new(),
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

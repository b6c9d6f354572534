//! Parameter resolution
//!
//! Explicit overrides win. Bucket and key ARN fall back to the outputs of
//! the vault's CloudFormation stack, which is described at most once per
//! resolution and not at all when both are overridden.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use strongbox_core::types::RetryPolicy;
use strongbox_core::OperationContext;
use tracing::{debug, info};

use crate::config::{
    normalize_prefix, AmbientSettings, EffectiveConfig, VaultOverrides, BUCKET_OUTPUT, KEY_OUTPUT,
};
use crate::error::{from_retry, BackendError, ConfigError, Result};
use crate::transient;

/// Output-key to value map of a deployed stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackOutputs {
    outputs: HashMap<String, String>,
}

impl StackOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StackOutputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            outputs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Reads the outputs of a deployed infrastructure stack
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackDescriber: Send + Sync {
    /// Describe `stack`. A missing stack is a `NotFound` error.
    async fn describe_outputs(&self, stack: &str) -> std::result::Result<StackOutputs, BackendError>;
}

/// Turns overrides plus ambient settings into an [`EffectiveConfig`]
#[derive(Clone)]
pub struct ParameterResolver {
    stacks: Arc<dyn StackDescriber>,
    retry_policy: RetryPolicy,
}

impl ParameterResolver {
    pub fn new(stacks: Arc<dyn StackDescriber>) -> Self {
        Self {
            stacks,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Resolve the effective parameters
    ///
    /// Fails without touching storage or KMS when the stack is missing, lacks
    /// an output, or no region is known.
    pub async fn resolve(
        &self,
        overrides: &VaultOverrides,
        ambient: &AmbientSettings,
        ctx: &OperationContext,
    ) -> Result<EffectiveConfig> {
        let stack_name = overrides.stack_name().to_string();

        let region = overrides
            .region()
            .or_else(|| ambient.region())
            .ok_or(ConfigError::MissingRegion)?
            .to_string();

        let (bucket, key_arn) = match (overrides.bucket(), overrides.key_arn()) {
            (Some(bucket), Some(key_arn)) => {
                debug!(stack = %stack_name, "Bucket and key overridden, skipping stack lookup");
                (bucket.to_string(), key_arn.to_string())
            }
            (bucket, key_arn) => {
                let outputs = self.describe(&stack_name, ctx).await?;
                let bucket = match bucket {
                    Some(bucket) => bucket.to_string(),
                    None => required_output(&outputs, &stack_name, BUCKET_OUTPUT)?,
                };
                let key_arn = match key_arn {
                    Some(key_arn) => key_arn.to_string(),
                    None => required_output(&outputs, &stack_name, KEY_OUTPUT)?,
                };
                (bucket, key_arn)
            }
        };

        let prefix = normalize_prefix(overrides.prefix());

        info!(
            stack = %stack_name,
            bucket = %bucket,
            region = %region,
            prefix = %prefix,
            "Resolved vault parameters"
        );

        Ok(EffectiveConfig::new(
            bucket,
            key_arn,
            region,
            prefix,
            stack_name,
            overrides.credentials.clone(),
        ))
    }

    async fn describe(&self, stack: &str, ctx: &OperationContext) -> Result<StackOutputs> {
        debug!(stack, "Describing stack");

        transient::executor(&self.retry_policy, "describe-stack")
            .execute(ctx, || self.stacks.describe_outputs(stack))
            .await
            .map_err(|err| {
                from_retry(err, |source| {
                    if source.is_not_found() {
                        ConfigError::StackNotFound {
                            stack: stack.to_string(),
                        }
                        .into()
                    } else {
                        ConfigError::StackLookup {
                            stack: stack.to_string(),
                            source,
                        }
                        .into()
                    }
                })
            })
    }
}

impl std::fmt::Debug for ParameterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

fn required_output(
    outputs: &StackOutputs,
    stack: &str,
    output: &'static str,
) -> std::result::Result<String, ConfigError> {
    let value = outputs.get(output).ok_or_else(|| ConfigError::MissingOutput {
        stack: stack.to_string(),
        output,
    })?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyParameter { parameter: output });
    }
    Ok(value.to_string())
}

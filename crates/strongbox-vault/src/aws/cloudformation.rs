//! Stack outputs from CloudFormation `DescribeStacks`

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::Client;
use tracing::debug;

use super::classify;
use crate::error::BackendError;
use crate::resolver::{StackDescriber, StackOutputs};

/// CloudFormation-backed [`StackDescriber`]
#[derive(Debug, Clone)]
pub struct CloudFormationStacks {
    client: Client,
}

impl CloudFormationStacks {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackDescriber for CloudFormationStacks {
    async fn describe_outputs(&self, stack: &str) -> Result<StackOutputs, BackendError> {
        let response = self
            .client
            .describe_stacks()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| {
                let error = classify(&e);
                if is_missing_stack(error.code(), error.message()) {
                    BackendError::not_found(format!("Stack with id {stack} does not exist"))
                        .with_code("ValidationError")
                } else {
                    error
                }
            })?;

        let description = response.stacks().first().ok_or_else(|| {
            BackendError::not_found(format!("Stack with id {stack} does not exist"))
        })?;

        let outputs: StackOutputs = description
            .outputs()
            .iter()
            .filter_map(|output| match (output.output_key(), output.output_value()) {
                (Some(key), Some(value)) => Some((key, value)),
                _ => None,
            })
            .collect();

        debug!(stack, outputs = outputs.len(), "Described stack");
        Ok(outputs)
    }
}

/// CloudFormation reports an unknown stack as a `ValidationError`
fn is_missing_stack(code: Option<&str>, message: &str) -> bool {
    code == Some("ValidationError") && message.contains("does not exist")
}

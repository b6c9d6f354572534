//! CLI command implementations

pub mod all;
pub mod delete;
pub mod describe;
pub mod exists;
pub mod lookup;
pub mod store;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use strongbox_vault::aws::ambient_settings;
use strongbox_vault::{AmbientSettings, OperationContext, RetryPolicy, Vault, VaultOverrides};
use tracing::warn;

use crate::cli::VaultArgs;
use crate::output;

/// Context for the whole invocation, cancelled on Ctrl-C
pub fn operation_context(timeout_secs: Option<u64>) -> OperationContext {
    let mut ctx = OperationContext::new();
    if let Some(secs) = timeout_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    let (ctx, handle) = ctx.cancellable();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            handle.cancel();
        }
    });
    ctx
}

/// Resolve the vault parameters and connect to AWS
pub async fn connect(args: &VaultArgs, ctx: &OperationContext, quiet: bool) -> Result<Vault> {
    let spinner = output::spinner("Resolving vault...", quiet);
    let overrides = args.overrides();
    let ambient = ambient_for(&overrides, ambient_settings).await;
    let vault = Vault::from_aws(&overrides, &ambient, &RetryPolicy::default(), ctx).await;
    spinner.finish_and_clear();

    vault.with_context(|| format!("Failed to open vault from stack {}", args.stack))
}

/// Only consults the region chain when no region was given
async fn ambient_for<F, Fut>(overrides: &VaultOverrides, chain: F) -> AmbientSettings
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AmbientSettings>,
{
    if overrides.region().is_some() {
        AmbientSettings::new()
    } else {
        chain().await
    }
}

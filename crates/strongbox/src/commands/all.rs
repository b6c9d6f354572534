use anyhow::{Context, Result};
use strongbox_vault::{OperationContext, Vault};

/// One name per line
pub async fn run(vault: &Vault, ctx: &OperationContext) -> Result<()> {
    let names = vault.all_with(ctx).await.context("Failed to list secrets")?;
    for name in names {
        println!("{name}");
    }
    Ok(())
}

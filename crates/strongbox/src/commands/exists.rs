use anyhow::{Context, Result};
use strongbox_vault::{OperationContext, Vault};

use crate::cli::NameArgs;

/// Prints `true` or `false`
pub async fn run(vault: &Vault, args: NameArgs, ctx: &OperationContext) -> Result<()> {
    let exists = vault
        .exists_with(&args.name, ctx)
        .await
        .with_context(|| format!("Failed to check {}", args.name))?;

    println!("{exists}");
    Ok(())
}

use anyhow::{Context, Result};
use strongbox_vault::{OperationContext, Vault};

use crate::cli::NameArgs;
use crate::output;

pub async fn run(vault: &Vault, args: NameArgs, ctx: &OperationContext, quiet: bool) -> Result<()> {
    vault
        .delete_with(&args.name, ctx)
        .await
        .with_context(|| format!("Failed to delete {}", args.name))?;

    if !quiet {
        output::success(&format!("Deleted {}", args.name));
    }
    Ok(())
}

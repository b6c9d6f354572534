use anyhow::{Context, Result};
use strongbox_vault::{OperationContext, Vault};

use crate::cli::NameArgs;
use crate::output;

pub async fn run(vault: &Vault, args: NameArgs, ctx: &OperationContext) -> Result<()> {
    let value = vault
        .lookup_with(&args.name, ctx)
        .await
        .with_context(|| format!("Failed to look up {}", args.name))?;

    output::secret(&value).context("Failed to write value to stdout")
}

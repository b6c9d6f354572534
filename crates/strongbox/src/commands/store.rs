use anyhow::{Context, Result};
use strongbox_vault::{OperationContext, Vault};

use crate::cli::StoreArgs;
use crate::output;

pub async fn run(
    vault: &Vault,
    args: StoreArgs,
    ctx: &OperationContext,
    quiet: bool,
) -> Result<()> {
    let value = match (&args.value, &args.file) {
        (_, Some(path)) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?,
        (Some(value), None) => value.as_bytes().to_vec(),
        (None, None) => anyhow::bail!("Either a value or --file is required"),
    };

    let spinner = output::spinner("Encrypting and uploading...", quiet);
    let result = vault
        .store_with(&args.name, &value, args.overwrite, ctx)
        .await;
    spinner.finish_and_clear();

    result.with_context(|| format!("Failed to store {}", args.name))?;
    if !quiet {
        output::success(&format!("Stored {} ({} bytes)", args.name, value.len()));
    }
    Ok(())
}

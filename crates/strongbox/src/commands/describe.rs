use anyhow::Result;
use strongbox_vault::Vault;

pub fn run(vault: &Vault) -> Result<()> {
    println!("{vault}");
    Ok(())
}

//! CLI argument parsing with clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use strongbox_vault::config::DEFAULT_STACK_NAME;
use strongbox_vault::{Credentials, VaultOverrides};
use tracing::warn;

/// Strongbox - envelope-encrypted secrets in S3
#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub vault: VaultArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the vault lives and how to reach it
#[derive(Args, Debug)]
pub struct VaultArgs {
    /// CloudFormation stack to look up the bucket and key from
    #[arg(long = "vaultstack", env = "VAULT_STACK", default_value = DEFAULT_STACK_NAME, global = true)]
    pub stack: String,

    /// Prefix to store values under
    #[arg(short, long, env = "VAULT_PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Override the bucket name
    #[arg(short, long, env = "VAULT_BUCKET", global = true)]
    pub bucket: Option<String>,

    /// Override the KMS key ARN
    #[arg(short, long = "key-arn", env = "VAULT_KEY", global = true)]
    pub key_arn: Option<String>,

    /// IAM access key id overriding the ambient credentials
    #[arg(long = "id", global = true)]
    pub access_key_id: Option<String>,

    /// IAM secret access key overriding the ambient credentials
    #[arg(long = "secret", global = true)]
    pub secret_access_key: Option<String>,

    /// Region for the stack, key and bucket
    #[arg(short, long, env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,
}

impl VaultArgs {
    /// Overrides for parameter resolution
    pub fn overrides(&self) -> VaultOverrides {
        VaultOverrides {
            stack_name: Some(self.stack.clone()),
            bucket: self.bucket.clone(),
            key_arn: self.key_arn.clone(),
            prefix: self.prefix.clone(),
            region: self.region.clone(),
            credentials: self.credentials(),
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
            (None, None) => None,
            _ => {
                warn!("Ignoring partial credentials: both --id and --secret are needed");
                None
            }
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store data in the vault
    Store(StoreArgs),

    /// Look up data from the vault
    #[command(visible_alias = "load")]
    Lookup(NameArgs),

    /// Delete data from the vault
    Delete(NameArgs),

    /// Check if the vault contains data
    Exists(NameArgs),

    /// List all names the vault contains
    #[command(visible_alias = "list")]
    All,

    /// Show the resolved vault parameters
    Describe,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Secret name
    pub name: String,

    /// Secret value
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub value: Option<String>,

    /// Read the value from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Overwrite the current value if it already exists
    #[arg(short = 'w', long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Secret name
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_store_with_value() {
        let cli = Cli::try_parse_from(["strongbox", "store", "db", "hunter2", "-w"]).unwrap();
        match cli.command {
            Commands::Store(args) => {
                assert_eq!(args.name, "db");
                assert_eq!(args.value.as_deref(), Some("hunter2"));
                assert!(args.overwrite);
                assert!(args.file.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_store_needs_value_or_file() {
        assert!(Cli::try_parse_from(["strongbox", "store", "db"]).is_err());
        assert!(
            Cli::try_parse_from(["strongbox", "store", "db", "v", "--file", "cert.pem"]).is_err()
        );
        assert!(Cli::try_parse_from(["strongbox", "store", "db", "--file", "cert.pem"]).is_ok());
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::try_parse_from(["strongbox", "load", "db"]).unwrap();
        assert!(matches!(cli.command, Commands::Lookup(ref args) if args.name == "db"));

        let cli = Cli::try_parse_from(["strongbox", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::All));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "strongbox",
            "lookup",
            "db",
            "--vaultstack",
            "team-vault",
            "-b",
            "my-bucket",
            "-k",
            "arn:aws:kms:eu-west-1:1:key/abc",
            "-p",
            "team",
            "-r",
            "eu-west-1",
        ])
        .unwrap();

        let overrides = cli.vault.overrides();
        assert_eq!(overrides.stack_name(), "team-vault");
        assert_eq!(overrides.bucket(), Some("my-bucket"));
        assert_eq!(overrides.key_arn(), Some("arn:aws:kms:eu-west-1:1:key/abc"));
        assert_eq!(overrides.prefix(), Some("team"));
        assert_eq!(overrides.region(), Some("eu-west-1"));
    }

    #[test]
    fn test_credentials_need_both_halves() {
        let cli = Cli::try_parse_from([
            "strongbox",
            "all",
            "--id",
            "AKIAEXAMPLE",
            "--secret",
            "s3cr3t",
        ])
        .unwrap();
        let credentials = cli.vault.overrides().credentials.unwrap();
        assert_eq!(credentials.access_key_id(), "AKIAEXAMPLE");
        assert_eq!(credentials.secret_access_key(), "s3cr3t");
    }

    #[test]
    #[serial]
    fn test_environment_credentials_stay_ambient() {
        // Session credentials must reach the default chain intact.
        std::env::set_var("AWS_ACCESS_KEY_ID", "ASIAEXAMPLE");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "s3cr3t");
        std::env::set_var("AWS_SESSION_TOKEN", "token");

        let cli = Cli::try_parse_from(["strongbox", "all"]).unwrap();

        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        std::env::remove_var("AWS_SESSION_TOKEN");

        assert!(cli.vault.access_key_id.is_none());
        assert!(cli.vault.overrides().credentials.is_none());
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["strongbox", "describe", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}

//! Strongbox CLI - envelope-encrypted secrets in S3
//!
//! This is the main entry point for the strongbox command-line interface.

mod cli;
mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = commands::operation_context(cli.vault.timeout);
    let vault = commands::connect(&cli.vault, &ctx, cli.quiet).await?;

    match cli.command {
        Commands::Store(args) => commands::store::run(&vault, args, &ctx, cli.quiet).await,
        Commands::Lookup(args) => commands::lookup::run(&vault, args, &ctx).await,
        Commands::Delete(args) => commands::delete::run(&vault, args, &ctx, cli.quiet).await,
        Commands::Exists(args) => commands::exists::run(&vault, args, &ctx).await,
        Commands::All => commands::all::run(&vault, &ctx).await,
        Commands::Describe => commands::describe::run(&vault),
    }
}

/// Initialize tracing with appropriate verbosity
///
/// Logs go to stderr so stdout stays clean for secret values.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

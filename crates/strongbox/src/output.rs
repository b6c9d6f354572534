//! Terminal output utilities
//!
//! Status lines and spinners go to stderr. Stdout only carries command
//! results so it can be piped.

use std::io::{self, Write};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use strongbox_vault::SecretValue;

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Create a spinner, hidden when `quiet`
pub fn spinner(msg: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Write a looked-up value to stdout
///
/// Text gets a trailing newline; binary values are written byte for byte.
pub fn secret(value: &SecretValue) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match value {
        SecretValue::Utf8(text) => writeln!(stdout, "{text}")?,
        SecretValue::Binary(bytes) => stdout.write_all(bytes)?,
    }
    stdout.flush()
}

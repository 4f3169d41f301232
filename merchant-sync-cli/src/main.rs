//! merchant-sync: push Odoo website products into Google Merchant Center.
//!
//! # Usage
//!
//! ```text
//! merchant-sync [--dry-run] [--config <path>] [--env-file <path>]
//! merchant-sync [--dry-run] run
//! merchant-sync status [--json] [--failed]
//! merchant-sync reset (--offer <id>... | --all)
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); reports go to stdout.

mod auth;
mod commands;
mod images;
mod merchant;
mod odoo;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{reset::ResetArgs, run::RunArgs, status::StatusArgs, ConfigArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "merchant-sync",
    version,
    about = "Resumable batch sync of Odoo products to the Google Merchant API",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync pass (the default).
    Run,

    /// Summarise the persisted sync state.
    Status(StatusArgs),

    /// Remove entries from the sync state so they count as new again.
    Reset(ResetArgs),
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        None | Some(Commands::Run) => cli.run.run(&cli.config),
        Some(Commands::Status(args)) => args.run(&cli.config),
        Some(Commands::Reset(args)) => args.run(&cli.config),
    }
}

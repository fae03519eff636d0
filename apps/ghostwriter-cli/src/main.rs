//! Ghostwriter CLI binary entry point.
//!
//! Loads `.env`, initializes the tracing subscriber, parses command-line
//! arguments with clap, and dispatches to the selected subcommand via
//! [`Cli::run`].

mod cli;
mod logging;
mod output;
mod tui;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; credentials may come from the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Extract the log context before consuming cli.
    let (work_dir, command) = cli.log_context();

    // Clean old logs (best-effort, before tracing is initialized).
    logging::cleanup_old_logs(&work_dir);

    // Initialize tracing with optional file layer.
    let _guard = logging::init_tracing(&work_dir, command, cli.logs_to_stderr())?;

    cli.run().await
}

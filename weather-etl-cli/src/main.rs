//! Binary crate for the `weather-etl` command-line tool.
//!
//! This crate focuses on:
//! - Being the thin adapter a scheduler invokes once per trigger
//! - Interactive configuration
//! - Logging setup and exit status

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}

//! stak CLI — pluggable content bundler.
//!
//! Collects sources, threads them through a chain of bundlers, and writes
//! the result wherever the profile points.

mod bundlers;
mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

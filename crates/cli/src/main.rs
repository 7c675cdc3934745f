//! Main entry point for the tandem CLI
//!
//! Inspect pairings and configuration files, or run two paired sessions
//! against an in-process loopback hub.

mod cli;
mod loopback;
mod simulate;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

//! Tackle CLI
//!
//! Installs, checks and removes operator add-ons on a Kubernetes cluster.

use clap::Parser;
use tackle_common::telemetry::init_telemetry;

use tackle_cli::{Cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.global.telemetry())?;
    cli.run().await
}

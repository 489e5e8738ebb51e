//! Tackle CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

use crate::config::GlobalArgs;

/// Tackle - install and remove operator add-ons on a Kubernetes cluster
#[derive(Parser, Debug)]
#[command(name = "tackle")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply components and wait for their workloads to become ready
    Install(commands::install::InstallArgs),
    /// Delete components' manifests
    Uninstall(commands::uninstall::UninstallArgs),
    /// Report whether components are installed
    Check(commands::check::CheckArgs),
    /// List the bundled components
    List,
    /// Print a component's rendered manifests
    Render(commands::render::RenderArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Install(args) => commands::install::run(args, &self.global).await,
            Commands::Uninstall(args) => commands::uninstall::run(args, &self.global).await,
            Commands::Check(args) => commands::check::run(args, &self.global).await,
            Commands::List => commands::list::run(&self.global),
            Commands::Render(args) => commands::render::run(args, &self.global).await,
        }
    }
}

//! CLI argument definitions.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::commands::{FetchCmd, LatestCmd, MetaCmd, VersionsCmd};

#[derive(Parser)]
#[command(name = "godex")]
#[command(about = "godex - Go module fetch and documentation extraction")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch a module and extract its units
    Fetch(FetchCmd),

    /// List a module's versions from the proxy
    Versions(VersionsCmd),

    /// Show the raw and cooked latest versions and the latest major
    Latest(LatestCmd),

    /// Resolve unit metadata for an arbitrary import path
    Meta(MetaCmd),
}

impl Command {
    pub async fn execute(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        match self {
            Command::Fetch(cmd) => cmd.run(cancel).await,
            Command::Versions(cmd) => cmd.run(cancel).await,
            Command::Latest(cmd) => cmd.run(cancel).await,
            Command::Meta(cmd) => cmd.run(cancel).await,
        }
    }
}

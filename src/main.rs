//! godex - Go module fetch and documentation extraction.

mod cli;
mod commands;
mod config;
mod datasource;
mod fetch;
mod forkdetect;
mod getters;
mod gomod;
mod latest;
mod licenses;
mod proxy;
mod shedder;
mod source;
mod types;
mod version;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Ctrl-C cancels in-flight proxy I/O and content reads.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let cli = Cli::parse();
    cli.command.execute(&cancel).await
}

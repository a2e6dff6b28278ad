//! Versions command - list a module's versions from the proxy.

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Args)]
pub struct VersionsCmd {
    /// Module path (e.g. golang.org/x/sync)
    pub module: String,

    /// Module proxy base URL
    #[arg(long, env = "GODEX_PROXY_URL")]
    pub proxy: Option<String>,
}

impl VersionsCmd {
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let config = Config::from_env();
        let client = super::proxy_client(self.proxy.as_deref(), &config)?;

        let versions = client
            .versions(&self.module, cancel)
            .await
            .with_context(|| format!("listing versions of {}", self.module))?;

        if versions.is_empty() {
            println!("no versions listed for {}", self.module);
            return Ok(());
        }
        for version in versions {
            println!("{version}");
        }
        Ok(())
    }
}

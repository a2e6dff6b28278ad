//! Latest command - raw/cooked latest and latest-major resolution.

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::latest::LatestResolver;
use crate::types::FetchError;

#[derive(Args)]
pub struct LatestCmd {
    /// Module path (e.g. github.com/gin-gonic/gin)
    pub module: String,

    /// Module proxy base URL
    #[arg(long, env = "GODEX_PROXY_URL")]
    pub proxy: Option<String>,
}

impl LatestCmd {
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let config = Config::from_env();
        let client = super::proxy_client(self.proxy.as_deref(), &config)?;
        let resolver = LatestResolver::new(&client);

        // No external hasGoMod record: let the resolver probe zips.
        let latest = resolver
            .latest_module_versions(
                &self.module,
                |_| Err(FetchError::NotFound("no hasGoMod record".into())),
                cancel,
            )
            .await
            .with_context(|| format!("resolving latest of {}", self.module))?;

        println!("raw:    {}", latest.raw_version);
        println!("cooked: {}", latest.cooked_version);
        if let Some(go_mod) = &latest.go_mod {
            if let Some(deprecated) = &go_mod.deprecated {
                println!("deprecated: {deprecated}");
            }
            if !go_mod.retract.is_empty() {
                println!("retractions: {}", go_mod.retract.len());
            }
        }

        let (major_path, _) = resolver
            .latest_major(&self.module, &self.module, cancel)
            .await
            .with_context(|| format!("resolving latest major of {}", self.module))?;
        println!("major:  {major_path}");

        Ok(())
    }
}

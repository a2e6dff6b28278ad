//! Meta command - resolve unit metadata for an import path.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::datasource::DataSource;
use crate::getters::{ModuleGetter, ProxyGetter};
use crate::types::UNKNOWN_MODULE_PATH;
use crate::version::LATEST_VERSION;

#[derive(Args)]
pub struct MetaCmd {
    /// Import path, not necessarily a module root (e.g. golang.org/x/tools/go/packages)
    pub path: String,

    /// Module path, when known; otherwise candidates are searched
    #[arg(long)]
    pub module: Option<String>,

    /// Version to resolve (defaults to latest)
    #[arg(long)]
    pub version: Option<String>,

    /// Module proxy base URL
    #[arg(long, env = "GODEX_PROXY_URL")]
    pub proxy: Option<String>,
}

impl MetaCmd {
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let config = Config::from_env();
        let client = Arc::new(super::proxy_client(self.proxy.as_deref(), &config)?);
        let ds = DataSource::new(
            vec![ModuleGetter::Proxy(ProxyGetter::new(Arc::clone(&client)))],
            Some(client),
            &config,
            true,
        );

        let module_path = self.module.as_deref().unwrap_or(UNKNOWN_MODULE_PATH);
        let version = self.version.as_deref().unwrap_or(LATEST_VERSION);

        let um = ds
            .get_unit_meta(&self.path, module_path, version, cancel)
            .await
            .with_context(|| format!("resolving {}", self.path))?;

        println!("path:    {}", um.path);
        println!("module:  {}", um.module_path);
        println!("version: {}", um.version);
        if let Some(name) = &um.name {
            println!("package: {name}");
        }

        let latest = ds
            .get_latest_info(&self.path, &um.module_path, Some(um.clone()), cancel)
            .await
            .with_context(|| format!("latest info for {}", self.path))?;
        if !latest.major_module_path.is_empty() {
            println!("latest major: {}", latest.major_module_path);
        }

        Ok(())
    }
}

//! Fetch command - run the extraction pipeline on one module.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::fetch::fetch_module;
use crate::getters::{DirectoryGetter, ModCacheGetter, ModuleGetter, ProxyGetter};
use crate::version::LOCAL_VERSION;

#[derive(Args)]
pub struct FetchCmd {
    /// Module spec: path[@version] (e.g. github.com/gin-gonic/gin@v1.9.1)
    pub module: String,

    /// Serve the module from a local directory instead of the proxy
    #[arg(long, conflicts_with = "modcache")]
    pub dir: Option<PathBuf>,

    /// Serve the module from an on-disk proxy cache (cache/download
    /// layout); without a value, GOPATH's module cache is used
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    pub modcache: Option<Option<PathBuf>>,

    /// Module proxy base URL
    #[arg(long, env = "GODEX_PROXY_URL")]
    pub proxy: Option<String>,

    /// Run license detection instead of assuming redistributability
    #[arg(long)]
    pub licenses: bool,
}

impl FetchCmd {
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let config = Config::from_env();
        let (path, mut version) = super::parse_module_spec(&self.module)?;

        let getter = if let Some(dir) = &self.dir {
            version = LOCAL_VERSION.to_string();
            ModuleGetter::Directory(
                DirectoryGetter::new(dir, &path)
                    .with_context(|| format!("local module at {}", dir.display()))?,
            )
        } else if let Some(cache_dir) = &self.modcache {
            let cache_dir = match cache_dir {
                Some(dir) => dir.clone(),
                None => config
                    .gopath_mod_cache()
                    .context("--modcache without a path needs GOPATH set")?,
            };
            ModuleGetter::ModCache(ModCacheGetter::new(cache_dir))
        } else {
            let client = super::proxy_client(self.proxy.as_deref(), &config)?;
            ModuleGetter::Proxy(ProxyGetter::new(Arc::new(client.with_zip_cache())))
        };

        let result = fetch_module(&path, &version, &getter, !self.licenses, cancel).await;
        if let Some(err) = &result.error {
            if !result.go_mod_path.is_empty() && result.go_mod_path != path {
                println!("go.mod declares: {}", result.go_mod_path);
            }
            return Err(anyhow::Error::new(err.clone())
                .context(format!("fetching {path}@{version}")));
        }

        let module = result
            .module
            .context("fetch produced no module and no error")?;

        println!("{}@{}", module.info.module_path, module.info.version);
        if let Some(time) = module.info.commit_time {
            println!("  committed: {}", time.to_rfc3339());
        }
        println!("  go.mod: {}", if module.info.has_go_mod { "yes" } else { "no" });
        if let Some(source) = &module.info.source_info {
            println!("  source: {}", source.module_url());
        }
        if let Some(deprecated) = &module.info.deprecated {
            println!("  deprecated: {deprecated}");
        }
        if !module.licenses.is_empty() {
            println!("  licenses:");
            for license in &module.licenses {
                println!("    {}", license.metadata.file_path);
            }
        }

        println!("  units:");
        for unit in &module.units {
            let name = unit
                .name
                .as_deref()
                .map(|n| format!(" (package {n})"))
                .unwrap_or_default();
            let readme = if unit.readme.is_some() { " [readme]" } else { "" };
            println!("    {}{name}{readme}", unit.path);
            for doc in &unit.documentation {
                println!(
                    "      {}/{}: {} exported identifiers",
                    doc.goos,
                    doc.goarch,
                    doc.api.len()
                );
            }
        }

        if result.has_incomplete_packages {
            println!("  incomplete packages:");
            for state in &result.package_version_states {
                if !state.status.is_ok() {
                    println!("    {}: {}", state.package_path, state.status);
                }
            }
        }

        Ok(())
    }
}

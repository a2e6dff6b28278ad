//! CLI command implementations.

mod fetch;
mod latest;
mod meta;
mod versions;

pub use fetch::FetchCmd;
pub use latest::LatestCmd;
pub use meta::MetaCmd;
pub use versions::VersionsCmd;

use anyhow::{Context, Result};

use crate::version::{LATEST_VERSION, ensure_prefix};

/// Parse a module spec: path[@version], defaulting to "latest".
pub(crate) fn parse_module_spec(spec: &str) -> Result<(String, String)> {
    match spec.rsplit_once('@') {
        Some((path, version)) => {
            if path.is_empty() || version.is_empty() {
                anyhow::bail!("invalid module spec {spec:?}. Use: path[@version]");
            }
            let version = if version == LATEST_VERSION {
                version.to_string()
            } else {
                ensure_prefix(version)
            };
            Ok((path.to_string(), version))
        }
        None => {
            if spec.is_empty() {
                anyhow::bail!("invalid module spec: empty path");
            }
            Ok((spec.to_string(), LATEST_VERSION.to_string()))
        }
    }
}

/// Build a proxy client for the given or configured base URL.
pub(crate) fn proxy_client(
    proxy: Option<&str>,
    config: &crate::config::Config,
) -> Result<crate::proxy::ProxyClient> {
    let base = proxy.unwrap_or(&config.proxy_url);
    crate::proxy::ProxyClient::new(base).with_context(|| format!("proxy url {base}"))
}

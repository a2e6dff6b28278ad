//! Process configuration.
//!
//! Read once from the environment and injected everywhere; nothing in the
//! crate consults the environment after startup.

const MAX_IN_FLIGHT_ZIP_ENV: &str = "GO_DISCOVERY_MAX_IN_FLIGHT_ZIP_MI";
const MAX_MODULE_ZIP_ENV: &str = "GO_DISCOVERY_MAX_MODULE_ZIP_MI";
const PROXY_URL_ENV: &str = "GODEX_PROXY_URL";
const GOPATH_ENV: &str = "GOPATH";

const DEFAULT_PROXY_URL: &str = "https://proxy.golang.org";

/// Hard upper bound on a single module zip when the environment does not
/// say otherwise.
const DEFAULT_MAX_MODULE_ZIP: u64 = 1 << 30;

const MEBIBYTE: u64 = 1 << 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Cap on concurrent zip bytes in flight. None disables shedding.
    pub max_in_flight_zip_bytes: Option<u64>,
    /// Hard upper bound on any single module zip.
    pub max_module_zip_bytes: u64,
    /// Proxy base URL for the CLI.
    pub proxy_url: String,
    /// GOPATH, for locating the on-disk module cache.
    pub gopath: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            max_in_flight_zip_bytes: mebibytes(std::env::var(MAX_IN_FLIGHT_ZIP_ENV).ok()),
            max_module_zip_bytes: mebibytes(std::env::var(MAX_MODULE_ZIP_ENV).ok())
                .unwrap_or(DEFAULT_MAX_MODULE_ZIP),
            proxy_url: std::env::var(PROXY_URL_ENV).unwrap_or_else(|_| DEFAULT_PROXY_URL.into()),
            gopath: std::env::var(GOPATH_ENV).ok().filter(|p| !p.is_empty()),
        }
    }

    /// The module cache under GOPATH, when one is configured.
    pub fn gopath_mod_cache(&self) -> Option<std::path::PathBuf> {
        self.gopath
            .as_ref()
            .map(|gopath| std::path::Path::new(gopath).join("pkg").join("mod"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_in_flight_zip_bytes: None,
            max_module_zip_bytes: DEFAULT_MAX_MODULE_ZIP,
            proxy_url: DEFAULT_PROXY_URL.into(),
            gopath: None,
        }
    }
}

/// Parse a mebibyte count; absent, unparsable or non-positive means None.
fn mebibytes(value: Option<String>) -> Option<u64> {
    let n: i64 = value?.trim().parse().ok()?;
    if n <= 0 {
        return None;
    }
    Some(n as u64 * MEBIBYTE)
}

//! Module proxy protocol client.
//!
//! Speaks the proxy protocol over HTTP:
//! - `/{module}/@v/list` - newline-separated versions
//! - `/{module}/@v/{version}.info` - version metadata
//! - `/{module}/@v/{version}.mod` - raw go.mod bytes
//! - `/{module}/@v/{version}.zip` - module zip
//! - `/{module}/@latest` - latest version metadata
//!
//! Paths and versions are escaped per the proxy rules (ASCII uppercase
//! becomes `!` + lowercase). Response statuses are classified into the
//! fetch error taxonomy here so higher layers branch on kind only.
//!
//! Every operation takes a cancellation token; cancelling it aborts the
//! in-flight request immediately and surfaces like an expired deadline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::{FetchError, ModuleCoord, Result, VersionInfo};
use crate::version::LATEST_VERSION;

const USER_AGENT: &str = "godex/0.1.0";

/// Per-operation ceiling; expired deadlines surface as ProxyTimedOut.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Header instructing the proxy not to populate uncached modules.
const DISABLE_FETCH_HEADER: &str = "Disable-Module-Fetch";

/// Maximum allowed module path length to prevent DoS
const MAX_MODULE_PATH_LENGTH: usize = 500;

/// Maximum allowed version string length
const MAX_VERSION_LENGTH: usize = 128;

pub struct ProxyClient {
    base_url: String,
    client: Client,
    disable_fetch: bool,
    /// One-shot cache of the most recently downloaded zip, overwritten on
    /// the next distinct coord. Guarded so shared clients stay safe.
    zip_cache: Option<Mutex<Option<(ModuleCoord, Arc<Vec<u8>>)>>>,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        url::Url::parse(base_url)
            .map_err(|e| FetchError::InvalidArgument(format!("proxy url {base_url}: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build http client");

        Ok(ProxyClient {
            base_url: base_url.to_string(),
            client,
            disable_fetch: false,
            zip_cache: None,
        })
    }

    /// Send `Disable-Module-Fetch: true` on every request; uncached modules
    /// then classify as NotFetched instead of NotFound.
    pub fn with_disable_fetch(mut self) -> Self {
        self.disable_fetch = true;
        self
    }

    /// Keep the most recently fetched zip for repeat requests of the same
    /// coord.
    pub fn with_zip_cache(mut self) -> Self {
        self.zip_cache = Some(Mutex::new(None));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and decode the `.info` document for `path@version`. The
    /// version may be "latest".
    pub async fn info(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo> {
        let url = self.escaped_url(module_path, version, "info")?;
        let body = self.get(&url, cancel).await?;
        serde_json::from_slice(&body)
            .map_err(|e| FetchError::Proxy(format!("decoding {url}: {e}")))
    }

    /// The `@latest` endpoint for `path`.
    pub async fn latest_info(
        &self,
        module_path: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo> {
        self.info(module_path, LATEST_VERSION, cancel).await
    }

    /// Raw go.mod bytes for `path@version`.
    pub async fn mod_file(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let url = self.escaped_url(module_path, version, "mod")?;
        self.get(&url, cancel).await
    }

    /// The proxy's `@v/list` lines, in delivery order. May be empty.
    pub async fn versions(
        &self,
        module_path: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        validate_module_path(module_path)?;
        let url = format!("{}/{}/@v/list", self.base_url, escape_path(module_path));
        let body = self.get(&url, cancel).await?;
        let text = String::from_utf8(body)
            .map_err(|e| FetchError::Proxy(format!("decoding {url}: {e}")))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Download the module zip. With the one-shot cache enabled, a repeat
    /// request for the same coord returns the cached bytes.
    pub async fn zip(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<u8>>> {
        let coord = ModuleCoord::new(module_path, version);
        if let Some(cache) = &self.zip_cache {
            let cached = cache.lock().unwrap();
            if let Some((cached_coord, data)) = cached.as_ref() {
                if *cached_coord == coord {
                    debug!(%coord, "zip cache hit");
                    return Ok(Arc::clone(data));
                }
            }
        }

        let url = self.escaped_url(module_path, version, "zip")?;
        debug!(%coord, url, "downloading module zip");
        let data = Arc::new(self.get(&url, cancel).await?);

        if let Some(cache) = &self.zip_cache {
            *cache.lock().unwrap() = Some((coord, Arc::clone(&data)));
        }
        Ok(data)
    }

    /// Size of the module zip from a HEAD request; fails if the server
    /// does not expose a Content-Length.
    pub async fn zip_size(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let url = self.escaped_url(module_path, version, "zip")?;
        let mut request = self.client.head(&url);
        if self.disable_fetch {
            request = request.header(DISABLE_FETCH_HEADER, "true");
        }
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled(&url)),
            response = request.send() => {
                response.map_err(|e| FetchError::from_http(&e, &url))?
            }
        };
        let response = self.classify(response, &url).await?;
        response
            .content_length()
            .ok_or_else(|| FetchError::Proxy(format!("no content-length for {url}")))
    }

    /// Build the endpoint URL for `path@version`. "latest" is only valid
    /// for `.info` lookups, where it maps to the `/@latest` endpoint.
    fn escaped_url(&self, module_path: &str, version: &str, suffix: &str) -> Result<String> {
        validate_module_path(module_path)?;
        let escaped_path = escape_path(module_path);
        if version == LATEST_VERSION {
            if suffix != "info" {
                return Err(FetchError::InvalidArgument(format!(
                    "version {LATEST_VERSION} is only valid for info requests, not .{suffix}"
                )));
            }
            return Ok(format!("{}/{escaped_path}/@latest", self.base_url));
        }
        validate_version(version)?;
        Ok(format!(
            "{}/{escaped_path}/@v/{}.{suffix}",
            self.base_url,
            escape_version(version),
        ))
    }

    /// GET with cancellation: the token aborts both the request and the
    /// body read as soon as it fires.
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if self.disable_fetch {
            request = request.header(DISABLE_FETCH_HEADER, "true");
        }
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
            response = request.send() => {
                response.map_err(|e| FetchError::from_http(&e, url))?
            }
        };
        let response = self.classify(response, url).await?;
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
            bytes = response.bytes() => {
                bytes.map_err(|e| FetchError::from_http(&e, url))?
            }
        };
        Ok(bytes.to_vec())
    }

    /// Map the response status onto the error taxonomy.
    async fn classify(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let line = status_line(status);
        if status.is_server_error() {
            return Err(FetchError::Proxy(format!("{url}: {line}")));
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            let body = response.text().await.unwrap_or_default();
            if body.contains("fetch timed out") {
                return Err(FetchError::ProxyTimedOut(format!("{url}: {body}")));
            }
            if self.disable_fetch {
                return Err(FetchError::NotFetched(format!("{url}: {line}")));
            }
            return Err(FetchError::NotFound(format!("{url}: {line}")));
        }
        Err(FetchError::Proxy(format!("{url}: unexpected status {line}")))
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

fn validate_module_path(module_path: &str) -> Result<()> {
    if module_path.is_empty() {
        return Err(FetchError::InvalidArgument("module path is empty".into()));
    }
    if module_path.len() > MAX_MODULE_PATH_LENGTH {
        return Err(FetchError::InvalidArgument(format!(
            "module path exceeds maximum length of {MAX_MODULE_PATH_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(FetchError::InvalidArgument("version is empty".into()));
    }
    if version.len() > MAX_VERSION_LENGTH {
        return Err(FetchError::InvalidArgument(format!(
            "version exceeds maximum length of {MAX_VERSION_LENGTH} characters"
        )));
    }
    if version.contains("..") || version.contains('/') || version.contains('\\') {
        return Err(FetchError::InvalidArgument(format!(
            "version {version} contains invalid characters"
        )));
    }
    Ok(())
}

/// Escape a module path for a proxy URL: uppercase letters become `!`
/// followed by lowercase, e.g. github.com/BurntSushi -> github.com/!burnt!sushi.
pub fn escape_path(module_path: &str) -> String {
    escape(module_path)
}

/// Versions escape the same way as paths.
pub fn escape_version(version: &str) -> String {
    escape(version)
}

fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    fn client(server: &mockito::Server) -> ProxyClient {
        ProxyClient::new(&server.url()).unwrap()
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(
            escape_path("github.com/BurntSushi/toml"),
            "github.com/!burnt!sushi/toml"
        );
        assert_eq!(escape_path("golang.org/x/sync"), "golang.org/x/sync");
        assert_eq!(escape_version("v1.0.0-RC1"), "v1.0.0-!r!c1");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ProxyClient::new("https://proxy.golang.org///").unwrap();
        assert_eq!(client.base_url(), "https://proxy.golang.org");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ProxyClient::new("not a url").is_err());
    }

    #[test]
    fn test_escaped_url_shape() {
        let client = ProxyClient::new("https://proxy.golang.org").unwrap();
        let url = client
            .escaped_url("github.com/My/Module", "v1.0.0", "info")
            .unwrap();
        assert_eq!(
            url,
            "https://proxy.golang.org/github.com/!my/!module/@v/v1.0.0.info"
        );
        // Exactly one @ in every constructed URL.
        assert_eq!(url.matches('@').count(), 1);

        let latest = client
            .escaped_url("github.com/my/module", "latest", "info")
            .unwrap();
        assert_eq!(
            latest,
            "https://proxy.golang.org/github.com/my/module/@latest"
        );
        assert_eq!(latest.matches('@').count(), 1);
    }

    #[test]
    fn test_latest_only_valid_for_info() {
        let client = ProxyClient::new("https://proxy.golang.org").unwrap();
        for suffix in ["mod", "zip"] {
            let err = client
                .escaped_url("example.com/m", "latest", suffix)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_version_validation() {
        let client = ProxyClient::new("https://proxy.golang.org").unwrap();
        for bad in ["", "v1../escape", "v1/2", "v1\\2"] {
            assert!(client.escaped_url("example.com/m", bad, "info").is_err());
        }
    }

    #[tokio::test]
    async fn test_info() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/basic/@v/v1.1.0.info")
            .with_body(r#"{"Version":"v1.1.0","Time":"2019-04-10T19:08:52Z"}"#)
            .create_async()
            .await;

        let info = client(&server)
            .info("example.com/basic", "v1.1.0", &live())
            .await
            .unwrap();
        assert_eq!(info.version, "v1.1.0");
        assert!(info.time.is_some());
    }

    #[tokio::test]
    async fn test_latest_info() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/basic/@latest")
            .with_body(r#"{"Version":"v1.2.0","Time":"2020-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let info = client(&server)
            .latest_info("example.com/basic", &live())
            .await
            .unwrap();
        assert_eq!(info.version, "v1.2.0");
    }

    #[tokio::test]
    async fn test_versions() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/basic/@v/list")
            .with_body("v1.0.0\nv1.1.0\n")
            .create_async()
            .await;

        let versions = client(&server)
            .versions("example.com/basic", &live())
            .await
            .unwrap();
        assert_eq!(versions, vec!["v1.0.0", "v1.1.0"]);
    }

    #[tokio::test]
    async fn test_versions_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/basic/@v/list")
            .with_body("")
            .create_async()
            .await;

        let versions = client(&server)
            .versions("example.com/basic", &live())
            .await
            .unwrap();
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn test_mod_file() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/basic/@v/v1.0.0.mod")
            .with_body("module example.com/basic\n")
            .create_async()
            .await;

        let bytes = client(&server)
            .mod_file("example.com/basic", "v1.0.0", &live())
            .await
            .unwrap();
        assert_eq!(bytes, b"module example.com/basic\n");
    }

    #[tokio::test]
    async fn test_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/gone/@v/v1.0.0.info")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let err = client(&server)
            .info("example.com/gone", "v1.0.0", &live())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_gone_fetch_timed_out() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/slow/@v/v1.0.0.info")
            .with_status(410)
            .with_body("not found: fetch timed out")
            .create_async()
            .await;

        let err = client(&server)
            .info("example.com/slow", "v1.0.0", &live())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyTimedOut);
    }

    #[tokio::test]
    async fn test_disable_fetch_classifies_not_fetched() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/uncached/@v/v1.0.0.info")
            .match_header(DISABLE_FETCH_HEADER, "true")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap().with_disable_fetch();
        let err = client
            .info("example.com/uncached", "v1.0.0", &live())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFetched);
    }

    #[tokio::test]
    async fn test_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/broken/@v/v1.0.0.info")
            .with_status(502)
            .create_async()
            .await;

        let err = client(&server)
            .info("example.com/broken", "v1.0.0", &live())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyError);
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/odd/@v/v1.0.0.info")
            .with_status(403)
            .create_async()
            .await;

        let err = client(&server)
            .info("example.com/odd", "v1.0.0", &live())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyError);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_request() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/example.com/basic/@v/v1.0.0.info")
            .with_body(r#"{"Version":"v1.0.0","Time":"2020-01-01T00:00:00Z"}"#)
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client(&server)
            .info("example.com/basic", "v1.0.0", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyTimedOut);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_zip_single_entry_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/example.com/basic/@v/v1.0.0.zip")
            .with_body("zipbytes")
            .expect(1)
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap().with_zip_cache();
        let first = client
            .zip("example.com/basic", "v1.0.0", &live())
            .await
            .unwrap();
        let second = client
            .zip("example.com/basic", "v1.0.0", &live())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_zip_cache_overwritten_on_distinct_coord() {
        let mut server = mockito::Server::new_async().await;
        let _m1 = server
            .mock("GET", "/example.com/a/@v/v1.0.0.zip")
            .with_body("aaa")
            .expect(2)
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/example.com/b/@v/v1.0.0.zip")
            .with_body("bbb")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap().with_zip_cache();
        client.zip("example.com/a", "v1.0.0", &live()).await.unwrap();
        client.zip("example.com/b", "v1.0.0", &live()).await.unwrap();
        // The cache only holds the most recent coord.
        client.zip("example.com/a", "v1.0.0", &live()).await.unwrap();
        _m1.assert_async().await;
    }

    #[tokio::test]
    async fn test_zip_size() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("HEAD", "/example.com/basic/@v/v1.0.0.zip")
            .with_header("content-length", "12345")
            .create_async()
            .await;

        let size = client(&server)
            .zip_size("example.com/basic", "v1.0.0", &live())
            .await
            .unwrap();
        assert_eq!(size, 12345);
    }
}

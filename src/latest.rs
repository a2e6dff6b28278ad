//! Latest-version resolution.
//!
//! Raw latest reconciles the proxy's `@v/list` with its `@latest`; cooked
//! latest additionally honours the retract directives in the go.mod at the
//! raw version. Latest-major information comes from probing `/vN` paths
//! on the series.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::getters::{ContentDir, ZipContentDir};
use crate::gomod::GoModFile;
use crate::proxy::ProxyClient;
use crate::types::{FetchError, Result};
use crate::version;

/// Raw and cooked latest versions of one module.
#[derive(Debug, Clone)]
pub struct LatestModuleVersions {
    pub module_path: String,
    /// Latest tagged version on the proxy, regardless of retractions.
    pub raw_version: String,
    /// Raw latest minus retracted versions; equals raw when everything is
    /// retracted.
    pub cooked_version: String,
    /// Parsed go.mod at the raw version.
    pub go_mod: Option<GoModFile>,
}

pub struct LatestResolver<'a> {
    client: &'a ProxyClient,
}

impl<'a> LatestResolver<'a> {
    pub fn new(client: &'a ProxyClient) -> Self {
        LatestResolver { client }
    }

    /// Compute raw and cooked latest for `module_path`.
    ///
    /// `has_go_mod` answers whether a given version's module has a go.mod
    /// file; when it answers NotFound the resolver downloads the zip and
    /// checks itself, memoising for the duration of this call.
    pub async fn latest_module_versions<F>(
        &self,
        module_path: &str,
        has_go_mod: F,
        cancel: &CancellationToken,
    ) -> Result<LatestModuleVersions>
    where
        F: Fn(&str) -> Result<bool>,
    {
        let mut versions = self.client.versions(module_path, cancel).await?;
        match self.client.latest_info(module_path, cancel).await {
            // The @latest version may be a pseudo-version the list omits.
            Ok(info) => {
                if !versions.contains(&info.version) {
                    versions.push(info.version);
                }
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        if versions.is_empty() {
            return Err(FetchError::NotFound(format!(
                "no versions for {module_path}"
            )));
        }

        let tagged: Vec<&str> = versions
            .iter()
            .map(String::as_str)
            .filter(|v| !version::is_pseudo(v))
            .collect();
        let pool: Vec<&str> = if tagged.is_empty() {
            versions.iter().map(String::as_str).collect()
        } else {
            tagged
        };

        let mut memo: HashMap<String, bool> = HashMap::new();
        let raw = self
            .pick_latest(module_path, &pool, &has_go_mod, &mut memo, cancel)
            .await?
            .expect("pool is nonempty")
            .to_string();

        let go_mod = match self.client.mod_file(module_path, &raw, cancel).await {
            Ok(bytes) => Some(GoModFile::parse(&String::from_utf8_lossy(&bytes))),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        let cooked = match &go_mod {
            Some(go_mod) => {
                let unretracted: Vec<&str> = pool
                    .iter()
                    .copied()
                    .filter(|v| !go_mod.retracts(v))
                    .collect();
                self.pick_latest(module_path, &unretracted, &has_go_mod, &mut memo, cancel)
                    .await?
                    .map(String::from)
                    .unwrap_or_else(|| raw.clone())
            }
            None => raw.clone(),
        };

        debug!(module_path, raw = %raw, cooked = %cooked, "resolved latest versions");
        Ok(LatestModuleVersions {
            module_path: module_path.to_string(),
            raw_version: raw,
            cooked_version: cooked,
            go_mod,
        })
    }

    /// The greatest version in `pool`, except that an incompatible
    /// greatest yields to the greatest lower compatible version whose
    /// module carries a go.mod.
    async fn pick_latest<'v, F>(
        &self,
        module_path: &str,
        pool: &[&'v str],
        has_go_mod: &F,
        memo: &mut HashMap<String, bool>,
        cancel: &CancellationToken,
    ) -> Result<Option<&'v str>>
    where
        F: Fn(&str) -> Result<bool>,
    {
        let Some(greatest) = version::max_of(pool.iter().copied()) else {
            return Ok(None);
        };
        if !version::is_incompatible(greatest) {
            return Ok(Some(greatest));
        }
        let mut compatible: Vec<&str> = pool
            .iter()
            .copied()
            .filter(|v| !version::is_incompatible(v))
            .collect();
        compatible.sort_by(|a, b| version::compare(b, a));
        for candidate in compatible {
            if self
                .has_go_mod_checked(module_path, candidate, has_go_mod, memo, cancel)
                .await?
            {
                return Ok(Some(candidate));
            }
        }
        Ok(Some(greatest))
    }

    async fn has_go_mod_checked<F>(
        &self,
        module_path: &str,
        version_str: &str,
        has_go_mod: &F,
        memo: &mut HashMap<String, bool>,
        cancel: &CancellationToken,
    ) -> Result<bool>
    where
        F: Fn(&str) -> Result<bool>,
    {
        if let Some(&known) = memo.get(version_str) {
            return Ok(known);
        }
        let answer = match has_go_mod(version_str) {
            Ok(answer) => answer,
            Err(err) if err.is_not_found() => {
                let data = self.client.zip(module_path, version_str, cancel).await?;
                let prefix = format!("{module_path}@{version_str}/");
                ContentDir::Zip(ZipContentDir::new(data, &prefix)?).contains("go.mod")
            }
            Err(err) => return Err(err),
        };
        memo.insert(version_str.to_string(), answer);
        Ok(answer)
    }

    /// Latest-major resolution for a unit: probe `seriesPath/vN` upward
    /// from the major of the series' own latest, stopping at the first
    /// NotFound. Returns (major module path, major unit path).
    pub async fn latest_major(
        &self,
        full_path: &str,
        module_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        let series = version::series_path(module_path);
        let start = match self.client.latest_info(series, cancel).await {
            Ok(info) => version::major(&info.version).unwrap_or(1),
            Err(err) if err.is_not_found() => 1,
            Err(err) => return Err(err),
        };

        let mut found = None;
        let mut n = (start + 1).max(2);
        loop {
            let candidate = format!("{series}/v{n}");
            match self.client.latest_info(&candidate, cancel).await {
                Ok(_) => {
                    found = Some(candidate);
                    n += 1;
                }
                Err(err) if err.is_not_found() => break,
                Err(err) => return Err(err),
            }
        }

        let major_module_path = found.unwrap_or_else(|| module_path.to_string());
        let suffix = full_path
            .strip_prefix(module_path)
            .unwrap_or("")
            .trim_start_matches('/');
        let major_unit_path = if suffix.is_empty() {
            major_module_path.clone()
        } else {
            format!("{major_module_path}/{suffix}")
        };
        Ok((major_module_path, major_unit_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getters::test_zip;

    fn not_found(_: &str) -> Result<bool> {
        Err(FetchError::NotFound("no record".into()))
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    async fn mock_latest(
        server: &mut mockito::Server,
        path: &str,
        version: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", format!("/{path}/@latest").as_str())
            .with_body(format!(
                r#"{{"Version":"{version}","Time":"2020-01-01T00:00:00Z"}}"#
            ))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_raw_and_cooked_with_retractions() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/example.com/retractions/@v/list")
            .with_body("v1.0.0\nv1.1.0\nv1.2.0\n")
            .create_async()
            .await;
        let _latest = mock_latest(&mut server, "example.com/retractions", "v1.2.0").await;
        let _mod = server
            .mock("GET", "/example.com/retractions/@v/v1.2.0.mod")
            .with_body("module example.com/retractions\n\nretract (\n\tv1.1.0\n\tv1.2.0\n)\n")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let latest = LatestResolver::new(&client)
            .latest_module_versions("example.com/retractions", |_| Ok(true), &live())
            .await
            .unwrap();
        assert_eq!(latest.raw_version, "v1.2.0");
        assert_eq!(latest.cooked_version, "v1.0.0");
    }

    #[tokio::test]
    async fn test_all_retracted_cooks_to_raw() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/example.com/all/@v/list")
            .with_body("v1.0.0\nv1.1.0\n")
            .create_async()
            .await;
        let _latest = mock_latest(&mut server, "example.com/all", "v1.1.0").await;
        let _mod = server
            .mock("GET", "/example.com/all/@v/v1.1.0.mod")
            .with_body("module example.com/all\n\nretract [v1.0.0, v1.1.0]\n")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let latest = LatestResolver::new(&client)
            .latest_module_versions("example.com/all", |_| Ok(true), &live())
            .await
            .unwrap();
        assert_eq!(latest.raw_version, "v1.1.0");
        assert_eq!(latest.cooked_version, "v1.1.0");
    }

    #[tokio::test]
    async fn test_latest_info_unions_with_list() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/example.com/pseudo/@v/list")
            .with_body("")
            .create_async()
            .await;
        let _latest = mock_latest(
            &mut server,
            "example.com/pseudo",
            "v0.0.0-20180101000000-abcdef123456",
        )
        .await;
        let _mod = server
            .mock(
                "GET",
                "/example.com/pseudo/@v/v0.0.0-20180101000000-abcdef123456.mod",
            )
            .with_body("module example.com/pseudo\n")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let latest = LatestResolver::new(&client)
            .latest_module_versions("example.com/pseudo", |_| Ok(true), &live())
            .await
            .unwrap();
        // No tagged versions: the pseudo-version from @latest wins.
        assert_eq!(latest.raw_version, "v0.0.0-20180101000000-abcdef123456");
    }

    #[tokio::test]
    async fn test_incompatible_demoted_when_compatible_has_go_mod() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/example.com/incompat/@v/list")
            .with_body("v1.5.0\nv2.0.0+incompatible\n")
            .create_async()
            .await;
        let _latest = mock_latest(&mut server, "example.com/incompat", "v2.0.0+incompatible").await;
        let _mod = server
            .mock("GET", "/example.com/incompat/@v/v1.5.0.mod")
            .with_body("module example.com/incompat\n")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let latest = LatestResolver::new(&client)
            .latest_module_versions("example.com/incompat", |_| Ok(true), &live())
            .await
            .unwrap();
        assert_eq!(latest.raw_version, "v1.5.0");
    }

    #[tokio::test]
    async fn test_incompatible_kept_when_compatible_lacks_go_mod() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/example.com/old/@v/list")
            .with_body("v1.5.0\nv2.0.0+incompatible\n")
            .create_async()
            .await;
        let _latest = mock_latest(&mut server, "example.com/old", "v2.0.0+incompatible").await;
        // NotFound from the predicate forces a zip probe; the zip has no
        // go.mod at its root.
        let _zip = server
            .mock("GET", "/example.com/old/@v/v1.5.0.zip")
            .with_body(test_zip("example.com/old@v1.5.0/", &[("p.go", "package p\n")]))
            .create_async()
            .await;
        let _mod = server
            .mock("GET", "/example.com/old/@v/v2.0.0+incompatible.mod")
            .with_body("module example.com/old\n")
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let latest = LatestResolver::new(&client)
            .latest_module_versions("example.com/old", not_found, &live())
            .await
            .unwrap();
        assert_eq!(latest.raw_version, "v2.0.0+incompatible");
    }

    #[tokio::test]
    async fn test_latest_major_probes_series() {
        let mut server = mockito::Server::new_async().await;
        let _v1 = mock_latest(&mut server, "foo.com/bar", "v1.1.0").await;
        let _v2 = mock_latest(&mut server, "foo.com/bar/v2", "v2.0.5").await;
        let _v3 = mock_latest(&mut server, "foo.com/bar/v3", "v3.0.1").await;
        let _missing = server
            .mock("GET", "/foo.com/bar/v4/@latest")
            .with_status(404)
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let (major_path, major_unit) = LatestResolver::new(&client)
            .latest_major("foo.com/bar", "foo.com/bar", &live())
            .await
            .unwrap();
        assert_eq!(major_path, "foo.com/bar/v3");
        assert_eq!(major_unit, "foo.com/bar/v3");
    }

    #[tokio::test]
    async fn test_latest_major_keeps_unit_suffix() {
        let mut server = mockito::Server::new_async().await;
        let _v1 = mock_latest(&mut server, "foo.com/bar", "v1.1.0").await;
        let _v2 = mock_latest(&mut server, "foo.com/bar/v2", "v2.0.0").await;
        let _missing = server
            .mock("GET", "/foo.com/bar/v3/@latest")
            .with_status(404)
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let (major_path, major_unit) = LatestResolver::new(&client)
            .latest_major("foo.com/bar/baz", "foo.com/bar", &live())
            .await
            .unwrap();
        assert_eq!(major_path, "foo.com/bar/v2");
        assert_eq!(major_unit, "foo.com/bar/v2/baz");
    }

    #[tokio::test]
    async fn test_latest_major_none_above_v1() {
        let mut server = mockito::Server::new_async().await;
        let _latest = mock_latest(&mut server, "foo.com/solo", "v1.0.0").await;
        let _missing = server
            .mock("GET", "/foo.com/solo/v2/@latest")
            .with_status(404)
            .create_async()
            .await;

        let client = ProxyClient::new(&server.url()).unwrap();
        let (major_path, major_unit) = LatestResolver::new(&client)
            .latest_major("foo.com/solo", "foo.com/solo", &live())
            .await
            .unwrap();
        assert_eq!(major_path, "foo.com/solo");
        assert_eq!(major_unit, "foo.com/solo");
    }
}

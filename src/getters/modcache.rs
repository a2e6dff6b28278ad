//! Module-cache-backed getter.
//!
//! Serves the on-disk layout the go command and proxies share:
//! `cache/download/<escaped-path>/@v/<escaped-version>.{info,mod,zip}`.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::proxy::{escape_path, escape_version};
use crate::types::{FetchError, Result, VersionInfo};
use crate::version::{self, LATEST_VERSION};

use super::contentdir::{ContentDir, ZipContentDir};

pub struct ModCacheGetter {
    /// Cache root; artifacts live under `cache/download` within it.
    dir: PathBuf,
}

impl ModCacheGetter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ModCacheGetter { dir: dir.into() }
    }

    pub fn info(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo> {
        check_cancelled(module_path, cancel)?;
        let version = if version == LATEST_VERSION {
            self.latest_cached_version(module_path)?
        } else {
            version.to_string()
        };
        let data = self.read_artifact(module_path, &version, "info")?;
        serde_json::from_slice(&data).map_err(|e| {
            FetchError::BadModule(format!("decoding {module_path}@{version}.info: {e}"))
        })
    }

    pub fn mod_file(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        check_cancelled(module_path, cancel)?;
        self.read_artifact(module_path, version, "mod")
    }

    pub fn content_dir(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<ContentDir> {
        check_cancelled(module_path, cancel)?;
        // A missing zip is NotFound so a multi-getter datasource can try
        // the next source.
        let data = self.read_artifact(module_path, version, "zip")?;
        let prefix = format!("{module_path}@{version}/");
        Ok(ContentDir::Zip(ZipContentDir::new(data, &prefix)?).with_cancellation(cancel.clone()))
    }

    /// The semantically greatest version with a cached zip.
    fn latest_cached_version(&self, module_path: &str) -> Result<String> {
        let dir = self.versions_dir(module_path);
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| FetchError::from_io(&e, &format!("reading {}", dir.display())))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| FetchError::from_io(&e, &format!("reading {}", dir.display())))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(escaped) = name.strip_suffix(".zip") {
                versions.push(unescape(escaped));
            }
        }
        version::max_of(versions.iter().map(String::as_str))
            .map(String::from)
            .ok_or_else(|| {
                FetchError::NotFound(format!("no cached zips for {module_path} in {}", dir.display()))
            })
    }

    fn read_artifact(&self, module_path: &str, version: &str, suffix: &str) -> Result<Vec<u8>> {
        let path = self
            .versions_dir(module_path)
            .join(format!("{}.{suffix}", escape_version(version)));
        std::fs::read(&path)
            .map_err(|e| FetchError::from_io(&e, &format!("reading {}", path.display())))
    }

    fn versions_dir(&self, module_path: &str) -> PathBuf {
        self.dir
            .join("cache")
            .join("download")
            .join(escape_path(module_path))
            .join("@v")
    }
}

fn check_cancelled(module_path: &str, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(FetchError::cancelled(module_path));
    }
    Ok(())
}

/// Invert proxy escaping: `!x` becomes `X`.
fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut bang = false;
    for c in s.chars() {
        if bang {
            result.push(c.to_ascii_uppercase());
            bang = false;
        } else if c == '!' {
            bang = true;
        } else {
            result.push(c);
        }
    }
    result
}

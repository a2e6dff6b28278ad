//! Directory-backed module getter.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::gomod;
use crate::types::{FetchError, Result, VersionInfo};
use crate::version::LOCAL_VERSION;

use super::contentdir::{ContentDir, DirContentDir};

/// Serves a single on-disk directory as an already-materialised module at
/// the fixed sentinel version `v0.0.0`.
pub struct DirectoryGetter {
    dir: PathBuf,
    module_path: String,
    /// The go.mod contents: read from disk, or synthesised when the
    /// directory has none.
    mod_contents: Vec<u8>,
}

impl DirectoryGetter {
    /// Bind `dir` as the module `default_module_path`. If the directory
    /// contains a go.mod, the path declared there wins.
    pub fn new(dir: impl Into<PathBuf>, default_module_path: &str) -> Result<Self> {
        let dir = dir.into();
        let go_mod = dir.join("go.mod");
        let (module_path, mod_contents) = if go_mod.exists() {
            let contents = std::fs::read(&go_mod)
                .map_err(|e| FetchError::from_io(&e, &format!("reading {}", go_mod.display())))?;
            let text = String::from_utf8_lossy(&contents);
            let path = gomod::module_path(&text).ok_or_else(|| {
                FetchError::BadModule(format!("{} has no module directive", go_mod.display()))
            })?;
            (path, contents)
        } else {
            (
                default_module_path.to_string(),
                format!("module {default_module_path}\n").into_bytes(),
            )
        };
        Ok(DirectoryGetter {
            dir,
            module_path,
            mod_contents,
        })
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn info(&self, module_path: &str, cancel: &CancellationToken) -> Result<VersionInfo> {
        self.check(module_path, cancel)?;
        Ok(VersionInfo {
            version: LOCAL_VERSION.to_string(),
            time: None,
        })
    }

    pub fn mod_file(&self, module_path: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.check(module_path, cancel)?;
        Ok(self.mod_contents.clone())
    }

    pub fn content_dir(
        &self,
        module_path: &str,
        cancel: &CancellationToken,
    ) -> Result<ContentDir> {
        self.check(module_path, cancel)?;
        Ok(ContentDir::Dir(DirContentDir::new(&self.dir)?).with_cancellation(cancel.clone()))
    }

    fn check(&self, module_path: &str, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FetchError::cancelled(module_path));
        }
        if module_path != self.module_path {
            return Err(FetchError::NotFound(format!(
                "module {module_path} not found: directory {} serves {}",
                self.dir.display(),
                self.module_path
            )));
        }
        Ok(())
    }
}

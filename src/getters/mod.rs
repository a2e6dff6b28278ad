//! Module sources.
//!
//! A `ModuleGetter` is a capability set over `info / mod_file / content_dir
//! / source_info`, with variants for the proxy, a local directory, and an
//! on-disk proxy cache. The fetch pipeline sees only this surface; the
//! variants have identical semantics modulo where the bytes come from.
//!
//! Every operation takes the caller's cancellation token; cancellation
//! aborts in-flight I/O rather than merely marking the result.

mod contentdir;
mod directory;
mod modcache;
mod proxy;

pub use contentdir::{ContentDir, DirContentDir, FileMeta, ZipContentDir};
pub use directory::DirectoryGetter;
pub use modcache::ModCacheGetter;
pub use proxy::ProxyGetter;

#[cfg(test)]
pub use contentdir::test_zip;

use tokio_util::sync::CancellationToken;

use crate::source::SourceInfo;
use crate::types::{Result, VersionInfo};

/// Polymorphic source of module artifacts.
pub enum ModuleGetter {
    Proxy(ProxyGetter),
    Directory(DirectoryGetter),
    ModCache(ModCacheGetter),
}

impl ModuleGetter {
    /// Resolve a (possibly symbolic) version to version metadata.
    pub async fn info(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo> {
        match self {
            ModuleGetter::Proxy(g) => g.info(module_path, version, cancel).await,
            ModuleGetter::Directory(g) => g.info(module_path, cancel),
            ModuleGetter::ModCache(g) => g.info(module_path, version, cancel),
        }
    }

    /// Raw go.mod bytes for the resolved version.
    pub async fn mod_file(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        match self {
            ModuleGetter::Proxy(g) => g.mod_file(module_path, version, cancel).await,
            ModuleGetter::Directory(g) => g.mod_file(module_path, cancel),
            ModuleGetter::ModCache(g) => g.mod_file(module_path, version, cancel),
        }
    }

    /// The module's content filesystem, rooted at the module files. The
    /// token is attached to the returned dir so later reads abort too.
    pub async fn content_dir(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<ContentDir> {
        match self {
            ModuleGetter::Proxy(g) => g.content_dir(module_path, version, cancel).await,
            ModuleGetter::Directory(g) => g.content_dir(module_path, cancel),
            ModuleGetter::ModCache(g) => g.content_dir(module_path, version, cancel),
        }
    }

    /// Repository link info; None when no provider applies.
    pub fn source_info(&self, module_path: &str, resolved_version: &str) -> Option<SourceInfo> {
        match self {
            ModuleGetter::Proxy(_) => crate::source::source_info(module_path, resolved_version),
            ModuleGetter::Directory(_) => None,
            ModuleGetter::ModCache(_) => None,
        }
    }
}

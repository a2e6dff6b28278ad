use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::licenses::{License, LicenseMetadata};
use crate::source::SourceInfo;

/// Sentinel directing the datasource to discover the module path by
/// enumerating candidate ancestors of the requested import path.
pub const UNKNOWN_MODULE_PATH: &str = "unknownModulePath";

/// A `(path, version)` pair identifying one module release. Keys every
/// cache, proxy URL and fork-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleCoord {
    pub module_path: String,
    pub version: String,
}

impl ModuleCoord {
    pub fn new(module_path: impl Into<String>, version: impl Into<String>) -> Self {
        ModuleCoord {
            module_path: module_path.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ModuleCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.module_path, self.version)
    }
}

/// The proxy's `.info` document: authoritative resolution of a requested
/// (possibly symbolic) version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Time")]
    pub time: Option<DateTime<Utc>>,
}

/// A fully fetched module release.
#[derive(Debug, Clone)]
pub struct Module {
    pub info: ModuleInfo,
    /// One unit per directory that contains a Go package or is an ancestor
    /// of one, plus the module root. Sorted by path.
    pub units: Vec<Unit>,
    /// Deduplicated full-content license records for the whole module.
    pub licenses: Vec<License>,
}

impl Module {
    /// The unit whose path is exactly `path`, if any.
    pub fn find_unit(&self, path: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.path == path)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub module_path: String,
    /// Resolved, canonical version.
    pub version: String,
    pub commit_time: Option<DateTime<Utc>>,
    pub is_redistributable: bool,
    /// Whether the content filesystem has a go.mod at the module root.
    pub has_go_mod: bool,
    pub source_info: Option<SourceInfo>,
    /// `Deprecated:` comment from the go.mod at the latest version.
    pub deprecated: Option<String>,
    /// Rationale of the retract directive covering this version, if any.
    pub retracted: Option<String>,
}

/// A directory in the module tree: the module root, a Go package, or an
/// ancestor of one.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Import path; equals the module path for the root unit.
    pub path: String,
    /// Go package name, when a package lives here.
    pub name: Option<String>,
    pub imports: Vec<String>,
    /// One entry per build context with a distinct fileset; a single
    /// `all/all` entry when every context selects the same files.
    pub documentation: Vec<Documentation>,
    pub readme: Option<Readme>,
    pub licenses: Vec<LicenseMetadata>,
    pub is_redistributable: bool,
}

/// Synthesised package documentation for one build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub goos: String,
    pub goarch: String,
    /// First sentence of the package comment.
    pub synopsis: String,
    pub imports: Vec<String>,
    pub api: Vec<DocItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocItem {
    pub kind: DeclKind,
    pub name: String,
    pub signature: String,
    pub doc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Func,
    Method,
    Type,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readme {
    /// Path of the file within the module, rooted at the module path.
    pub file_path: String,
    pub contents: String,
}

/// Unit metadata, resolvable without loading documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMeta {
    pub path: String,
    pub module_path: String,
    pub version: String,
    pub name: Option<String>,
    pub is_redistributable: bool,
}

/// Latest-version information for a unit, as served to the frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestInfo {
    pub minor_version: String,
    pub minor_module_path: String,
    /// Assumed true without verification; resolving it would need a fetch
    /// of the latest minor version.
    pub unit_exists_at_minor: bool,
    pub major_module_path: String,
    pub major_unit_path: String,
}

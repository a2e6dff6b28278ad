//! Phase 1: metadata-only walk of the module filesystem.
//!
//! Classifies every file by path alone and bounds the work of package
//! loading before any file content is read. Oversize files and invalid
//! import paths mark their directory incomplete instead of failing the
//! module; too many directories abort the fetch.

use std::collections::BTreeMap;

use crate::getters::{ContentDir, FileMeta};
use crate::types::{FetchError, Result, VersionState};

/// Largest file the pipeline will read.
pub const MAX_FILE_SIZE: u64 = 30 << 20;

/// Bound on distinct package directories per module.
pub const MAX_PACKAGES_PER_MODULE: usize = 10_000;

/// Output of the metadata walk, keyed by directory path relative to the
/// module root ("" is the root itself).
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Go files per directory, in lexical order.
    pub go_files: BTreeMap<String, Vec<FileMeta>>,
    /// Directories that cannot be loaded, with the state to record.
    pub incomplete_dirs: BTreeMap<String, (VersionState, String)>,
}

pub fn walk(contents: &ContentDir, module_path: &str) -> Result<WalkResult> {
    let mut result = WalkResult::default();

    for file in contents.files() {
        if is_ignored(&file.path) || is_vendored(&file.path) {
            continue;
        }
        if !file.path.ends_with(".go") {
            continue;
        }

        let dir = parent_dir(&file.path).to_string();

        if file.size > MAX_FILE_SIZE {
            result.go_files.entry(dir.clone()).or_default();
            result.incomplete_dirs.insert(
                dir,
                (
                    VersionState::MaxFileSizeLimitExceeded,
                    format!(
                        "file {} size {} exceeds max limit {MAX_FILE_SIZE}",
                        file.path, file.size
                    ),
                ),
            );
            continue;
        }

        let import_path = unit_path(module_path, &dir);
        if !valid_import_path(&import_path) {
            result.go_files.entry(dir.clone()).or_default();
            result.incomplete_dirs.insert(
                dir,
                (
                    VersionState::BadImportPath,
                    format!("invalid import path {import_path}"),
                ),
            );
            continue;
        }

        result.go_files.entry(dir).or_default().push(file.clone());

        if result.go_files.len() > MAX_PACKAGES_PER_MODULE {
            return Err(FetchError::ModuleTooLarge(format!(
                "{module_path} has more than {MAX_PACKAGES_PER_MODULE} packages"
            )));
        }
    }

    Ok(result)
}

/// The import path of a directory within the module.
pub fn unit_path(module_path: &str, dir: &str) -> String {
    if dir.is_empty() {
        module_path.to_string()
    } else {
        format!("{module_path}/{dir}")
    }
}

pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Ignored by the Go tool: any path element beginning with "." or equal
/// to "testdata".
fn is_ignored(path: &str) -> bool {
    path.split('/')
        .any(|elem| elem.starts_with('.') || elem == "testdata")
}

/// Vendored: top-level vendor/ or any nested /vendor/ segment.
fn is_vendored(path: &str) -> bool {
    path.starts_with("vendor/") || path.contains("/vendor/")
}

/// Import paths are ASCII-graphic with a small excluded set and no empty
/// elements.
pub fn valid_import_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return false;
    }
    path.chars().all(|c| {
        c.is_ascii_graphic() && !matches!(c, '"' | '\'' | '*' | '<' | '>' | '?' | '`' | '\\' | '{' | '}' | '|' | '[' | ']' | '#' | '^' | ',' | ';' | '!')
    })
}

//! License detection capability.
//!
//! Classification proper is an external concern; the pipeline consumes a
//! `Detector` for redistributability flags and license metadata. The
//! in-repo `FileNameDetector` discovers license files by well-known
//! basenames and reports them unclassified and non-redistributable, which
//! is the conservative default when no classifier is wired in.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::getters::ContentDir;

/// Largest license file the detector will read.
const MAX_LICENSE_SIZE: u64 = 16 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseMetadata {
    /// Detected license identifiers; empty when unclassified.
    pub types: Vec<String>,
    /// File path within the module, relative to the module root.
    pub file_path: String,
}

#[derive(Debug, Clone)]
pub struct License {
    pub metadata: LicenseMetadata,
    pub contents: Vec<u8>,
}

/// What the fetch pipeline needs from a license detector.
pub trait Detector {
    /// All license records discovered in the module.
    fn all_licenses(&self) -> Vec<License>;

    /// Redistributability and applicable license metadata for the
    /// directory at `inner_path` ("" for the module root).
    fn package_info(&self, inner_path: &str) -> (bool, Vec<LicenseMetadata>);
}

/// Basename-driven license file discovery over a content filesystem.
pub struct FileNameDetector<'a> {
    contents: &'a ContentDir,
    /// Relative paths of discovered license files, in lexical order.
    files: Vec<String>,
}

impl<'a> FileNameDetector<'a> {
    pub fn new(contents: &'a ContentDir) -> Self {
        let files = contents
            .files()
            .iter()
            .filter(|f| is_license_file_name(base_name(&f.path)))
            .map(|f| f.path.clone())
            .collect();
        FileNameDetector { contents, files }
    }
}

impl Detector for FileNameDetector<'_> {
    fn all_licenses(&self) -> Vec<License> {
        let mut licenses = Vec::new();
        for path in &self.files {
            match self.contents.read(path, MAX_LICENSE_SIZE) {
                Ok(contents) => licenses.push(License {
                    metadata: LicenseMetadata {
                        types: vec![],
                        file_path: path.clone(),
                    },
                    contents,
                }),
                Err(err) => warn!(path = %path, %err, "skipping unreadable license file"),
            }
        }
        licenses
    }

    fn package_info(&self, inner_path: &str) -> (bool, Vec<LicenseMetadata>) {
        // License files at the directory itself or any ancestor apply.
        let metadata = self
            .files
            .iter()
            .filter(|f| {
                let dir = parent_dir(f);
                dir.is_empty()
                    || inner_path == dir
                    || inner_path.starts_with(&format!("{dir}/"))
            })
            .map(|f| LicenseMetadata {
                types: vec![],
                file_path: f.clone(),
            })
            .collect();
        // Without classification nothing is known to be redistributable.
        (false, metadata)
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn is_license_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    let (stem, ext) = match lower.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (lower.as_str(), ""),
    };
    if !matches!(ext, "" | "md" | "markdown" | "txt") {
        return false;
    }
    matches!(
        stem,
        "license" | "licence" | "copying" | "unlicense" | "license-mit" | "mit-license"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getters::ContentDir;

    fn content_dir(files: &[(&str, &str)]) -> ContentDir {
        ContentDir::from_pairs(files)
    }

    #[test]
    fn test_license_file_names() {
        assert!(is_license_file_name("LICENSE"));
        assert!(is_license_file_name("License.md"));
        assert!(is_license_file_name("COPYING"));
        assert!(is_license_file_name("licence.txt"));
        assert!(!is_license_file_name("LICENSE.go"));
        assert!(!is_license_file_name("main.go"));
        assert!(!is_license_file_name("LICENSES.md"));
    }

    #[test]
    fn test_all_licenses() {
        let cd = content_dir(&[
            ("LICENSE", "MIT text"),
            ("sub/LICENSE.md", "BSD text"),
            ("main.go", "package main"),
        ]);
        let detector = FileNameDetector::new(&cd);
        let licenses = detector.all_licenses();
        assert_eq!(licenses.len(), 2);
        assert_eq!(licenses[0].metadata.file_path, "LICENSE");
        assert_eq!(licenses[0].contents, b"MIT text");
        assert_eq!(licenses[1].metadata.file_path, "sub/LICENSE.md");
    }

    #[test]
    fn test_package_info_ancestors_apply() {
        let cd = content_dir(&[("LICENSE", "x"), ("sub/LICENSE", "y")]);
        let detector = FileNameDetector::new(&cd);

        let (_, root) = detector.package_info("");
        assert_eq!(root.len(), 1);

        let (_, sub) = detector.package_info("sub");
        assert_eq!(sub.len(), 2);

        let (_, deep) = detector.package_info("sub/deep");
        assert_eq!(deep.len(), 2);

        let (_, other) = detector.package_info("other");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].file_path, "LICENSE");
    }
}

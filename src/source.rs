//! Repository link information.
//!
//! Derives repo URL and revision for well-known hosts so units can link to
//! their source. Failures here never affect fetch correctness; unknown
//! hosts simply yield no link.

use serde::{Deserialize, Serialize};

use crate::version;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub repo_url: String,
    pub revision: String,
}

impl SourceInfo {
    pub fn module_url(&self) -> String {
        format!("{}/tree/{}", self.repo_url, self.revision)
    }
}

/// Resolve link info for `module_path@version`. Known hosts are github.com,
/// gitlab.com and bitbucket.org; repositories live at `host/owner/repo`.
pub fn source_info(module_path: &str, resolved_version: &str) -> Option<SourceInfo> {
    let mut parts = module_path.splitn(4, '/');
    let host = parts.next()?;
    if !matches!(host, "github.com" | "gitlab.com" | "bitbucket.org") {
        return None;
    }
    let owner = parts.next()?;
    let repo = parts.next()?;

    Some(SourceInfo {
        repo_url: format!("https://{host}/{owner}/{repo}"),
        revision: revision(resolved_version),
    })
}

/// Tagged versions link by tag; pseudo-versions by the revision they encode.
fn revision(v: &str) -> String {
    if version::is_pseudo(v) {
        if let Some(rev) = v.rsplit('-').next() {
            return rev.to_string();
        }
    }
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github() {
        let info = source_info("github.com/gin-gonic/gin", "v1.9.1").unwrap();
        assert_eq!(info.repo_url, "https://github.com/gin-gonic/gin");
        assert_eq!(info.revision, "v1.9.1");
        assert_eq!(info.module_url(), "https://github.com/gin-gonic/gin/tree/v1.9.1");
    }

    #[test]
    fn test_nested_module_path() {
        let info = source_info("github.com/foo/bar/sub/module", "v1.0.0").unwrap();
        assert_eq!(info.repo_url, "https://github.com/foo/bar");
    }

    #[test]
    fn test_pseudo_version_links_revision() {
        let info = source_info(
            "github.com/foo/bar",
            "v0.0.0-20180101000000-abcdef123456",
        )
        .unwrap();
        assert_eq!(info.revision, "abcdef123456");
    }

    #[test]
    fn test_unknown_host() {
        assert!(source_info("example.com/foo/bar", "v1.0.0").is_none());
        assert!(source_info("github.com/incomplete", "v1.0.0").is_none());
    }
}

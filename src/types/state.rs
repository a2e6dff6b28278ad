use serde::{Deserialize, Serialize};

/// Outcome of loading one candidate package directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    Ok,
    BadImportPath,
    BadPackage,
    MaxFileSizeLimitExceeded,
    BuildContextNotSupported,
    DocumentationTooLarge,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Ok => "ok",
            VersionState::BadImportPath => "bad import path",
            VersionState::BadPackage => "bad package",
            VersionState::MaxFileSizeLimitExceeded => "max file size limit exceeded",
            VersionState::BuildContextNotSupported => "build context not supported",
            VersionState::DocumentationTooLarge => "documentation too large",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, VersionState::Ok)
    }
}

impl std::fmt::Display for VersionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-candidate-package record of how loading went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersionState {
    pub module_path: String,
    pub package_path: String,
    pub version: String,
    pub status: VersionState,
    pub error: Option<String>,
}

impl PackageVersionState {
    pub fn ok(module_path: &str, package_path: &str, version: &str) -> Self {
        PackageVersionState {
            module_path: module_path.to_string(),
            package_path: package_path.to_string(),
            version: version.to_string(),
            status: VersionState::Ok,
            error: None,
        }
    }

    pub fn failed(
        module_path: &str,
        package_path: &str,
        version: &str,
        status: VersionState,
        error: impl Into<String>,
    ) -> Self {
        PackageVersionState {
            module_path: module_path.to_string(),
            package_path: package_path.to_string(),
            version: version.to_string(),
            status,
            error: Some(error.into()),
        }
    }
}

/// True iff any package failed to load completely.
pub fn has_incomplete_packages(states: &[PackageVersionState]) -> bool {
    states.iter().any(|s| !s.status.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_incomplete_packages() {
        let ok = PackageVersionState::ok("m", "m/p", "v1.0.0");
        assert!(!has_incomplete_packages(&[ok.clone()]));

        let bad = PackageVersionState::failed(
            "m",
            "m/q",
            "v1.0.0",
            VersionState::BadPackage,
            "parse error",
        );
        assert!(has_incomplete_packages(&[ok, bad]));
        assert!(!has_incomplete_packages(&[]));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(VersionState::Ok.to_string(), "ok");
        assert_eq!(VersionState::BadPackage.to_string(), "bad package");
        assert!(VersionState::Ok.is_ok());
        assert!(!VersionState::DocumentationTooLarge.is_ok());
    }
}

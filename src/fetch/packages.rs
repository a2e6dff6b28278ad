//! Phase 2: package loading across build contexts.

use std::collections::HashMap;

use tracing::debug;

use crate::getters::{ContentDir, FileMeta};
use crate::types::{Documentation, VersionState};

use super::buildctx::{ALL, BUILD_CONTEXTS, display_rank};
use super::docs::{self, MAX_DOCUMENTATION_SIZE, ParsedGoFile};
use super::walk::MAX_FILE_SIZE;

pub const MAX_IMPORTS_PER_PACKAGE: usize = 1000;

/// A package loaded from one directory.
#[derive(Debug)]
pub struct LoadedPackage {
    pub name: String,
    pub imports: Vec<String>,
    pub documentation: Vec<Documentation>,
}

/// Outcome of loading one directory. A package may be present even for a
/// non-OK status (oversize documentation keeps the package, drops the
/// docs).
#[derive(Debug)]
pub struct PackageResult {
    pub package: Option<LoadedPackage>,
    pub status: VersionState,
    pub error: Option<String>,
}

impl PackageResult {
    fn failed(status: VersionState, error: impl Into<String>) -> Self {
        PackageResult {
            package: None,
            status,
            error: Some(error.into()),
        }
    }
}

/// Load the package in `dir`, trying each build context in order. The
/// first context yielding non-test files decides the package identity;
/// every context with a distinct fileset contributes documentation.
pub fn load_package(dir: &str, files: &[FileMeta], contents: &ContentDir) -> PackageResult {
    // Read every candidate file once; sizes were bounded in phase 1.
    let mut sources: Vec<(String, String)> = Vec::with_capacity(files.len());
    for file in files {
        let base = file.path.rsplit('/').next().unwrap_or(&file.path).to_string();
        match contents.read(&file.path, MAX_FILE_SIZE) {
            Ok(bytes) => sources.push((base, String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) => {
                return PackageResult::failed(
                    VersionState::BadPackage,
                    format!("reading {}: {err}", file.path),
                );
            }
        }
    }
    sources.sort_by(|a, b| a.0.cmp(&b.0));

    let mut parsed: HashMap<String, ParsedGoFile> = HashMap::new();
    let mut package_name: Option<String> = None;
    let mut unit_imports: Vec<String> = Vec::new();
    let mut built: Vec<(Vec<String>, Documentation)> = Vec::new();

    for context in BUILD_CONTEXTS {
        let matched: Vec<&(String, String)> = sources
            .iter()
            .filter(|(name, source)| context.should_build(name, source))
            .collect();
        let non_test: Vec<&(String, String)> = matched
            .iter()
            .copied()
            .filter(|(name, _)| !name.ends_with("_test.go"))
            .collect();
        if non_test.is_empty() {
            continue;
        }

        for (name, source) in &matched {
            if !parsed.contains_key(name.as_str()) {
                match docs::parse_go_file(name, source) {
                    Ok(file) => {
                        parsed.insert(name.clone(), file);
                    }
                    Err(err) => {
                        return PackageResult::failed(VersionState::BadPackage, err.to_string());
                    }
                }
            }
        }

        // Non-test files must agree on a single package name; _test.go
        // files may add a foo_test variant.
        let mut names: Vec<&str> = non_test
            .iter()
            .map(|(name, _)| parsed[name.as_str()].package_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        if names.len() > 1 {
            return PackageResult::failed(
                VersionState::BadPackage,
                format!("multiple packages in {dir:?}: {}", names.join(", ")),
            );
        }
        let name = names[0].to_string();
        for (file_name, _) in matched.iter().filter(|(n, _)| n.ends_with("_test.go")) {
            let test_name = parsed[file_name.as_str()].package_name.as_str();
            if test_name != name && test_name != format!("{name}_test") {
                return PackageResult::failed(
                    VersionState::BadPackage,
                    format!("test file {file_name} declares package {test_name}"),
                );
            }
        }

        let fileset: Vec<String> = non_test.iter().map(|(n, _)| n.clone()).collect();
        let parsed_files: Vec<(&str, &ParsedGoFile)> = non_test
            .iter()
            .map(|(n, _)| (n.as_str(), &parsed[n.as_str()]))
            .collect();
        let doc = docs::synthesize(*context, &parsed_files);

        if doc.imports.len() > MAX_IMPORTS_PER_PACKAGE {
            return PackageResult::failed(
                VersionState::BadPackage,
                format!(
                    "package in {dir:?} imports {} packages, more than the max {MAX_IMPORTS_PER_PACKAGE}",
                    doc.imports.len()
                ),
            );
        }

        if package_name.is_none() {
            package_name = Some(name);
            unit_imports = doc.imports.clone();
        }
        built.push((fileset, doc));
    }

    let Some(name) = package_name else {
        return PackageResult::failed(
            VersionState::BuildContextNotSupported,
            format!("no build context matches the files in {dir:?}"),
        );
    };

    let documentation = dedupe_docs(built);
    debug!(dir, package = %name, docs = documentation.len(), "loaded package");

    if docs::rendered_size(&documentation) > MAX_DOCUMENTATION_SIZE {
        return PackageResult {
            package: Some(LoadedPackage {
                name,
                imports: unit_imports,
                documentation: vec![],
            }),
            status: VersionState::DocumentationTooLarge,
            error: Some(format!(
                "rendered documentation in {dir:?} exceeds {MAX_DOCUMENTATION_SIZE} bytes"
            )),
        };
    }

    PackageResult {
        package: Some(LoadedPackage {
            name,
            imports: unit_imports,
            documentation,
        }),
        status: VersionState::Ok,
        error: None,
    }
}

/// Collapse identical filesets: when every matching context selected the
/// same files, one `all/all` documentation stands for them all. Distinct
/// filesets keep one documentation each, in display order.
fn dedupe_docs(built: Vec<(Vec<String>, Documentation)>) -> Vec<Documentation> {
    if built.is_empty() {
        return vec![];
    }
    let all_same = built.iter().all(|(fs, _)| *fs == built[0].0);
    if all_same {
        let mut doc = built.into_iter().next().map(|(_, d)| d).expect("nonempty");
        doc.goos = ALL.goos.to_string();
        doc.goarch = ALL.goarch.to_string();
        return vec![doc];
    }
    let mut docs: Vec<Documentation> = Vec::new();
    let mut seen: Vec<Vec<String>> = Vec::new();
    for (fileset, doc) in built {
        if seen.contains(&fileset) {
            continue;
        }
        seen.push(fileset);
        docs.push(doc);
    }
    docs.sort_by_key(|d| display_rank(&d.goos, &d.goarch));
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(files: &[(&str, &str)]) -> PackageResult {
        let cd = ContentDir::from_pairs(files);
        let metas: Vec<FileMeta> = cd.files().to_vec();
        load_package("p", &metas, &cd)
    }

    #[test]
    fn test_simple_package() {
        let result = load(&[(
            "p.go",
            "// Package p is plain.\npackage p\n\nimport \"fmt\"\n\n// Hello says hi.\nfunc Hello() { fmt.Println(\"hi\") }\n",
        )]);
        assert_eq!(result.status, VersionState::Ok);
        let package = result.package.unwrap();
        assert_eq!(package.name, "p");
        assert_eq!(package.imports, vec!["fmt"]);
        // Every context selects the same fileset: one all/all doc.
        assert_eq!(package.documentation.len(), 1);
        assert_eq!(package.documentation[0].goos, "all");
        assert_eq!(package.documentation[0].synopsis, "Package p is plain.");
        assert_eq!(package.documentation[0].api.len(), 1);
    }

    #[test]
    fn test_parse_error_is_bad_package() {
        let result = load(&[("broken.go", "package p\nfunc {{{\n")]);
        assert_eq!(result.status, VersionState::BadPackage);
        assert!(result.package.is_none());
    }

    #[test]
    fn test_multiple_package_names() {
        let result = load(&[("a.go", "package a\n"), ("b.go", "package b\n")]);
        assert_eq!(result.status, VersionState::BadPackage);
        assert!(result.error.unwrap().contains("multiple packages"));
    }

    #[test]
    fn test_external_test_package_allowed() {
        let result = load(&[
            ("p.go", "package p\n\nfunc Exported() {}\n"),
            ("p_test.go", "package p_test\n"),
        ]);
        assert_eq!(result.status, VersionState::Ok);
        assert_eq!(result.package.unwrap().name, "p");
    }

    #[test]
    fn test_only_test_files_is_unsupported() {
        let result = load(&[("p_test.go", "package p_test\n")]);
        assert_eq!(result.status, VersionState::BuildContextNotSupported);
        assert!(result.package.is_none());
    }

    #[test]
    fn test_os_specific_filesets_keep_per_context_docs() {
        let result = load(&[
            ("common.go", "package p\n\nfunc Common() {}\n"),
            ("extra_windows.go", "package p\n\nfunc WindowsOnly() {}\n"),
        ]);
        assert_eq!(result.status, VersionState::Ok);
        let package = result.package.unwrap();
        assert!(package.documentation.len() >= 2);
        // Display order: linux before windows.
        assert_eq!(package.documentation[0].goos, "linux");
        let windows = package
            .documentation
            .iter()
            .find(|d| d.goos == "windows")
            .unwrap();
        assert!(windows.api.iter().any(|i| i.name == "WindowsOnly"));
    }

    #[test]
    fn test_constraint_excluded_everywhere() {
        // plan9 is in no supported build context.
        let result = load(&[("p.go", "//go:build plan9\n\npackage p\n\nfunc P() {}\n")]);
        assert_eq!(result.status, VersionState::BuildContextNotSupported);
    }
}

//! The module fetch and extraction pipeline.
//!
//! Given (module path, requested version, getter): resolve the version,
//! validate the go.mod path, walk the content filesystem, extract READMEs,
//! run license detection, and discover and load packages in two phases.
//! Single-package failures are absorbed into per-package states; only
//! resolver failures, path mismatches, malformed archives and oversize
//! modules abort the fetch.

mod buildctx;
mod docs;
mod packages;
mod readme;
mod walk;

pub use buildctx::{ALL, BUILD_CONTEXTS, BuildContext};
pub use packages::MAX_IMPORTS_PER_PACKAGE;
pub use walk::{MAX_FILE_SIZE, MAX_PACKAGES_PER_MODULE, unit_path};

use std::collections::{BTreeMap, BTreeSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::forkdetect;
use crate::getters::ModuleGetter;
use crate::gomod::GoModFile;
use crate::licenses::{Detector, FileNameDetector};
use crate::types::{
    FetchError, Module, ModuleInfo, PackageVersionState, Unit, VersionState,
    has_incomplete_packages,
};

/// Everything a fetch produces. A populated `error` does not preclude a
/// partially-populated result (`go_mod_path` survives an alternative-module
/// rejection); callers inspect both.
#[derive(Debug)]
pub struct FetchResult {
    pub module_path: String,
    pub requested_version: String,
    pub resolved_version: String,
    /// Module path declared by the downloaded go.mod (or the upstream of a
    /// detected fork).
    pub go_mod_path: String,
    pub module: Option<Module>,
    pub package_version_states: Vec<PackageVersionState>,
    pub has_incomplete_packages: bool,
    pub error: Option<FetchError>,
}

impl FetchResult {
    fn new(module_path: &str, requested_version: &str) -> Self {
        FetchResult {
            module_path: module_path.to_string(),
            requested_version: requested_version.to_string(),
            resolved_version: String::new(),
            go_mod_path: String::new(),
            module: None,
            package_version_states: vec![],
            has_incomplete_packages: false,
            error: None,
        }
    }

    fn with_error(mut self, error: FetchError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Fetch and extract one module release through `getter`. Cancelling the
/// token aborts in-flight I/O and fails the fetch with a transient error.
pub async fn fetch_module(
    module_path: &str,
    requested_version: &str,
    getter: &ModuleGetter,
    bypass_license_check: bool,
    cancel: &CancellationToken,
) -> FetchResult {
    let mut result = FetchResult::new(module_path, requested_version);
    info!(module_path, requested_version, "fetching module");

    let version_info = match getter.info(module_path, requested_version, cancel).await {
        Ok(info) => info,
        Err(err) => return result.with_error(err),
    };
    result.resolved_version = version_info.version.clone();
    let resolved = result.resolved_version.clone();

    let mod_bytes = match getter.mod_file(module_path, &resolved, cancel).await {
        Ok(bytes) => bytes,
        Err(err) => return result.with_error(err),
    };
    let go_mod = GoModFile::parse(&String::from_utf8_lossy(&mod_bytes));
    if go_mod.module_path.is_empty() {
        return result.with_error(FetchError::BadModule(format!(
            "go.mod for {module_path}@{resolved} has no module declaration"
        )));
    }
    result.go_mod_path = go_mod.module_path.clone();
    if go_mod.module_path != module_path {
        let declared = go_mod.module_path;
        return result.with_error(FetchError::AlternativeModule {
            message: format!("module was requested as {module_path}"),
            go_mod_path: declared,
        });
    }

    let contents = match getter.content_dir(module_path, &resolved, cancel).await {
        Ok(contents) => contents,
        Err(err) => return result.with_error(err),
    };

    let has_go_mod = contents.contains("go.mod");
    if !has_go_mod {
        // Forks of large upstreams that never adopted modules are not
        // worth extracting; point at the upstream instead.
        match forkdetect::forked_from(&contents, module_path, &resolved) {
            Ok(Some(upstream)) => {
                result.go_mod_path = upstream.clone();
                return result.with_error(FetchError::AlternativeModule {
                    message: format!("{module_path}@{resolved} is a fork of {upstream}"),
                    go_mod_path: upstream,
                });
            }
            Ok(None) => {}
            Err(err) => return result.with_error(err),
        }
    }

    let walked = match walk::walk(&contents, module_path) {
        Ok(walked) => walked,
        Err(err) => return result.with_error(err),
    };

    let readmes = match readme::extract_readmes(&contents) {
        Ok(readmes) => readmes,
        Err(err) => return result.with_error(err),
    };

    let detector = (!bypass_license_check).then(|| FileNameDetector::new(&contents));

    let mut states = Vec::new();
    let mut loaded: BTreeMap<String, packages::LoadedPackage> = BTreeMap::new();
    for (dir, files) in &walked.go_files {
        if cancel.is_cancelled() {
            return result.with_error(FetchError::cancelled(module_path));
        }
        let package_path = unit_path(module_path, dir);
        if let Some((status, message)) = walked.incomplete_dirs.get(dir) {
            states.push(PackageVersionState::failed(
                module_path,
                &package_path,
                &resolved,
                *status,
                message.clone(),
            ));
            continue;
        }
        let package_result = packages::load_package(dir, files, &contents);
        states.push(match package_result.status {
            VersionState::Ok => PackageVersionState::ok(module_path, &package_path, &resolved),
            status => PackageVersionState::failed(
                module_path,
                &package_path,
                &resolved,
                status,
                package_result.error.unwrap_or_default(),
            ),
        });
        if let Some(package) = package_result.package {
            loaded.insert(dir.clone(), package);
        }
    }
    if cancel.is_cancelled() {
        return result.with_error(FetchError::cancelled(module_path));
    }

    let units = assemble_units(
        module_path,
        &walked.go_files,
        &loaded,
        &readmes,
        detector.as_ref(),
    );
    debug!(units = units.len(), states = states.len(), "assembled module");

    let module_licenses = detector
        .as_ref()
        .map(|d| d.all_licenses())
        .unwrap_or_default();
    let is_redistributable = detector.as_ref().map_or(true, |d| d.package_info("").0);

    result.has_incomplete_packages = has_incomplete_packages(&states);
    result.package_version_states = states;
    result.module = Some(Module {
        info: ModuleInfo {
            module_path: module_path.to_string(),
            version: resolved.clone(),
            commit_time: version_info.time,
            is_redistributable,
            has_go_mod,
            source_info: getter.source_info(module_path, &resolved),
            deprecated: None,
            retracted: None,
        },
        units,
        licenses: module_licenses,
    });
    result
}

/// The closure of directories that contain packages or are ancestors of
/// one, plus the module root unconditionally.
fn assemble_units(
    module_path: &str,
    go_dirs: &BTreeMap<String, Vec<crate::getters::FileMeta>>,
    loaded: &BTreeMap<String, packages::LoadedPackage>,
    readmes: &BTreeMap<String, crate::types::Readme>,
    detector: Option<&FileNameDetector<'_>>,
) -> Vec<Unit> {
    let mut unit_dirs: BTreeSet<String> = BTreeSet::new();
    unit_dirs.insert(String::new());
    for dir in go_dirs.keys() {
        let mut current = dir.as_str();
        loop {
            unit_dirs.insert(current.to_string());
            match current.rsplit_once('/') {
                Some((parent, _)) => current = parent,
                None => break,
            }
        }
    }

    unit_dirs
        .into_iter()
        .map(|dir| {
            let (is_redistributable, licenses) =
                detector.map_or((true, vec![]), |d| d.package_info(&dir));
            let package = loaded.get(&dir);
            Unit {
                path: unit_path(module_path, &dir),
                name: package.map(|p| p.name.clone()),
                imports: package.map(|p| p.imports.clone()).unwrap_or_default(),
                documentation: package.map(|p| p.documentation.clone()).unwrap_or_default(),
                readme: readmes.get(&dir).cloned(),
                licenses,
                is_redistributable,
            }
        })
        .collect()
}

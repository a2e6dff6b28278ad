//! The datasource façade.
//!
//! Composes an ordered list of getters behind a bounded LRU of fetch
//! results, resolves arbitrary import paths by enumerating candidate
//! module paths, and synthesises latest-version information via the
//! proxy.
//!
//! Every entry point takes the request's cancellation token and threads
//! it into proxy I/O and content reads; results observed after a
//! cancellation never enter the cache.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::fetch;
use crate::getters::ModuleGetter;
use crate::latest::LatestResolver;
use crate::proxy::ProxyClient;
use crate::shedder::LoadShedder;
use crate::types::{
    ErrorKind, FetchError, LatestInfo, Module, ModuleCoord, Result, UNKNOWN_MODULE_PATH, Unit,
    UnitMeta,
};
use crate::version::{LATEST_VERSION, LOCAL_VERSION};

/// Modules kept in memory.
const MODULE_CACHE_SIZE: usize = 100;

pub struct DataSource {
    /// Tried in order; NotFound moves on to the next.
    getters: Vec<ModuleGetter>,
    /// Enables latest-version resolution and deprecation/retraction
    /// stamping; pure directory-mode datasources have none.
    prox: Option<Arc<ProxyClient>>,
    cache: Mutex<LruCache<ModuleCoord, Result<Arc<Module>>>>,
    shedder: LoadShedder,
    max_module_zip_bytes: u64,
    bypass_license_check: bool,
}

impl DataSource {
    pub fn new(
        getters: Vec<ModuleGetter>,
        prox: Option<Arc<ProxyClient>>,
        config: &Config,
        bypass_license_check: bool,
    ) -> Self {
        DataSource {
            getters,
            prox,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(MODULE_CACHE_SIZE).expect("cache size is nonzero"),
            )),
            shedder: LoadShedder::new(config.max_in_flight_zip_bytes),
            max_module_zip_bytes: config.max_module_zip_bytes,
            bypass_license_check,
        }
    }

    /// Resolve unit metadata for `path`. When the module path is unknown,
    /// candidate module paths are tried longest-prefix first so the most
    /// specific module wins.
    pub async fn get_unit_meta(
        &self,
        path: &str,
        requested_module_path: &str,
        requested_version: &str,
        cancel: &CancellationToken,
    ) -> Result<UnitMeta> {
        let candidates: Vec<String> = if requested_module_path == UNKNOWN_MODULE_PATH {
            candidate_module_paths(path)
        } else {
            vec![requested_module_path.to_string()]
        };

        for module_path in candidates {
            match self.get_module(&module_path, requested_version, cancel).await {
                Ok(module) => {
                    if let Some(unit) = module.find_unit(path) {
                        return Ok(UnitMeta {
                            path: path.to_string(),
                            module_path: module.info.module_path.clone(),
                            version: module.info.version.clone(),
                            name: unit.name.clone(),
                            is_redistributable: unit.is_redistributable,
                        });
                    }
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Err(FetchError::NotFound(format!("unit {path} not found")))
    }

    /// Load the full unit for previously-resolved metadata.
    pub async fn get_unit(&self, um: &UnitMeta, cancel: &CancellationToken) -> Result<Unit> {
        let module = self.get_module(&um.module_path, &um.version, cancel).await?;
        module
            .find_unit(&um.path)
            .cloned()
            .ok_or_else(|| {
                FetchError::NotFound(format!("unit {} in {}", um.path, um.module_path))
            })
    }

    /// Latest-version information for a unit. Empty without a proxy
    /// client.
    pub async fn get_latest_info(
        &self,
        unit_path: &str,
        module_path: &str,
        known_unit_meta: Option<UnitMeta>,
        cancel: &CancellationToken,
    ) -> Result<LatestInfo> {
        debug!(unit_path, module_path, "resolving latest info");
        let Some(prox) = &self.prox else {
            return Ok(LatestInfo::default());
        };

        let um = match known_unit_meta {
            Some(um) => um,
            None => {
                self.get_unit_meta(unit_path, UNKNOWN_MODULE_PATH, LATEST_VERSION, cancel)
                    .await?
            }
        };

        let resolver = LatestResolver::new(prox);
        let (major_module_path, major_unit_path) = resolver
            .latest_major(unit_path, &um.module_path, cancel)
            .await?;

        Ok(LatestInfo {
            minor_version: um.version,
            minor_module_path: um.module_path,
            // Deliberate shortcut: verifying would need a fetch of the
            // latest minor version.
            unit_exists_at_minor: true,
            major_module_path,
            major_unit_path,
        })
    }

    /// Fetch a module through the getters, memoising the result.
    pub async fn get_module(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<Module>> {
        if let Some(cached) = self.cache_get(module_path, version) {
            debug!(module_path, version, "module cache hit");
            return cached;
        }

        for getter in &self.getters {
            let _load_guard = match self.admit_zip(getter, module_path, version, cancel).await {
                Ok(guard) => guard,
                Err(err) => {
                    // An oversize zip is a property of the coordinate; a
                    // shed rejection clears with load and must not stick.
                    if err.kind() == ErrorKind::ModuleTooLarge {
                        self.cache_put(module_path, version, &Err(err.clone()));
                    }
                    return Err(err);
                }
            };

            let result = fetch::fetch_module(
                module_path,
                version,
                getter,
                self.bypass_license_check,
                cancel,
            )
            .await;
            match result.error {
                Some(err) if err.is_not_found() => continue,
                Some(err) => {
                    // Timeouts and cancellations never enter the cache so
                    // a retry can re-enter the pipeline.
                    if !err.is_transient() {
                        self.cache_put(module_path, version, &Err(err.clone()));
                    }
                    return Err(err);
                }
                None => {
                    let mut module = result.module.ok_or_else(|| {
                        FetchError::BadModule(format!(
                            "fetch of {module_path}@{version} produced no module"
                        ))
                    })?;
                    self.stamp_latest(&mut module, cancel).await;
                    if cancel.is_cancelled() {
                        return Err(FetchError::cancelled(module_path));
                    }
                    let module = Arc::new(module);
                    self.cache_put(module_path, version, &Ok(Arc::clone(&module)));
                    return Ok(module);
                }
            }
        }

        let err = FetchError::NotFound(format!("module {module_path}@{version} not found"));
        if !cancel.is_cancelled() {
            self.cache_put(module_path, version, &Err(err.clone()));
        }
        Err(err)
    }

    /// Advisory shedding around proxy zip downloads. The guard returns
    /// the admitted bytes when the fetch finishes, on every exit path.
    async fn admit_zip(
        &self,
        getter: &ModuleGetter,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<crate::shedder::LoadGuard>> {
        let ModuleGetter::Proxy(proxy_getter) = getter else {
            return Ok(None);
        };
        if !self.shedder.enabled() && self.max_module_zip_bytes == u64::MAX {
            return Ok(None);
        }
        let size = match proxy_getter.zip_size(module_path, version, cancel).await {
            Ok(size) => size,
            Err(err) => {
                // Shedding is advisory; proceed unshed if the proxy will
                // not reveal the size.
                warn!(module_path, version, %err, "zip size unavailable");
                return Ok(None);
            }
        };
        if size > self.max_module_zip_bytes {
            return Err(FetchError::ModuleTooLarge(format!(
                "zip size {size} exceeds the limit {}",
                self.max_module_zip_bytes
            )));
        }
        let (shed, guard) = self.shedder.decide(size);
        if shed {
            return Err(FetchError::Proxy(format!(
                "shedding load: {size} zip bytes would exceed the in-flight cap"
            )));
        }
        Ok(Some(guard))
    }

    /// Populate deprecation and retraction from the go.mod at the raw
    /// latest version. Failures are logged, never fatal.
    async fn stamp_latest(&self, module: &mut Module, cancel: &CancellationToken) {
        let Some(prox) = &self.prox else { return };
        let resolver = LatestResolver::new(prox);
        let latest = resolver
            .latest_module_versions(
                &module.info.module_path,
                |_| Err(FetchError::NotFound("no hasGoMod record".into())),
                cancel,
            )
            .await;
        match latest {
            Ok(latest) => {
                if let Some(go_mod) = latest.go_mod {
                    module.info.deprecated = go_mod.deprecated.clone();
                    module.info.retracted = go_mod
                        .retract
                        .iter()
                        .find(|r| r.contains(&module.info.version))
                        .map(|r| r.rationale.clone().unwrap_or_default());
                }
            }
            Err(err) => {
                warn!(module_path = %module.info.module_path, %err, "latest version lookup failed");
            }
        }
    }

    fn cache_get(&self, module_path: &str, version: &str) -> Option<Result<Arc<Module>>> {
        let mut cache = self.cache.lock().unwrap();
        let coord = ModuleCoord::new(module_path, version);
        if let Some(entry) = cache.get(&coord) {
            return Some(entry.clone());
        }
        // Local-directory modules are cached under the LocalVersion
        // sentinel; a concrete version lookup falls back to it.
        if version != LOCAL_VERSION {
            let local = ModuleCoord::new(module_path, LOCAL_VERSION);
            if let Some(entry) = cache.get(&local) {
                return Some(entry.clone());
            }
        }
        None
    }

    fn cache_put(&self, module_path: &str, version: &str, entry: &Result<Arc<Module>>) {
        let mut cache = self.cache.lock().unwrap();
        cache.put(ModuleCoord::new(module_path, version), entry.clone());
    }
}

/// Candidate module paths for an import path, most specific first.
fn candidate_module_paths(path: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut current = path;
    loop {
        candidates.push(current.to_string());
        match current.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => current = parent,
            _ => break,
        }
    }
    candidates
}

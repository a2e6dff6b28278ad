//! Proxy-backed module getter.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::proxy::ProxyClient;
use crate::types::{Result, VersionInfo};

use super::contentdir::{ContentDir, ZipContentDir};

/// Serves module artifacts from a module proxy. The zip is exposed as a
/// filesystem sub-view at the `<path>@<version>/` prefix real zips carry.
pub struct ProxyGetter {
    client: Arc<ProxyClient>,
}

impl ProxyGetter {
    pub fn new(client: Arc<ProxyClient>) -> Self {
        ProxyGetter { client }
    }

    pub async fn info(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo> {
        self.client.info(module_path, version, cancel).await
    }

    pub async fn mod_file(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        self.client.mod_file(module_path, version, cancel).await
    }

    pub async fn content_dir(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<ContentDir> {
        let data = self.client.zip(module_path, version, cancel).await?;
        let prefix = format!("{module_path}@{version}/");
        Ok(ContentDir::Zip(ZipContentDir::new(data, &prefix)?).with_cancellation(cancel.clone()))
    }

    /// Zip size via HEAD, for load-shedding decisions.
    pub async fn zip_size(
        &self,
        module_path: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        self.client.zip_size(module_path, version, cancel).await
    }
}

use tracing::{debug, info};

use super::manifest::VersionCatalog;
use super::version_file::VersionMetadata;
use crate::core::cache::CacheKey;
use crate::core::downloader::{ConditionalFetcher, RemoteSource};
use crate::core::error::{EngineError, EngineResult};

/// Resolves a version id to its parsed metadata through the conditional fetcher.
#[derive(Clone)]
pub struct ManifestResolver {
    fetcher: ConditionalFetcher,
    catalog_url: String,
}

impl ManifestResolver {
    pub fn new(fetcher: ConditionalFetcher, catalog_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            catalog_url: catalog_url.into(),
        }
    }

    /// Fetch (or revalidate) and parse the version catalog.
    pub async fn catalog(&self) -> EngineResult<VersionCatalog> {
        let source = RemoteSource::validated(&self.catalog_url);
        let (outcome, raw) = self
            .fetcher
            .fetch_bytes(&source, &CacheKey::version_manifest())
            .await?;
        let catalog = VersionCatalog::parse(&raw)?;
        debug!(
            status = ?outcome.status,
            versions = catalog.versions.len(),
            "loaded version catalog"
        );
        Ok(catalog)
    }

    /// Resolve `id` by exact match against the catalog.
    pub async fn resolve_version(&self, id: &str) -> EngineResult<VersionMetadata> {
        let catalog = self.catalog().await?;
        self.resolve_in(&catalog, id).await
    }

    /// Resolve the catalog's current release.
    pub async fn latest_release(&self) -> EngineResult<VersionMetadata> {
        let catalog = self.catalog().await?;
        let id = catalog.latest_release()?.to_owned();
        self.resolve_in(&catalog, &id).await
    }

    /// Resolve the catalog's current snapshot.
    pub async fn latest_snapshot(&self) -> EngineResult<VersionMetadata> {
        let catalog = self.catalog().await?;
        let id = catalog.latest_snapshot()?.to_owned();
        self.resolve_in(&catalog, &id).await
    }

    async fn resolve_in(&self, catalog: &VersionCatalog, id: &str) -> EngineResult<VersionMetadata> {
        let entry = catalog
            .find_version(id)
            .ok_or_else(|| EngineError::UnknownVersion(id.to_string()))?;

        let source = RemoteSource::validated(&entry.url).with_sha1(entry.sha1.clone());
        let (outcome, raw) = self
            .fetcher
            .fetch_bytes(&source, &CacheKey::version_metadata(id)?)
            .await?;
        let metadata = VersionMetadata::parse(&raw)?;

        if metadata.id != id {
            return Err(EngineError::malformed(format!("version metadata {id}"), "id"));
        }

        info!(version = id, status = ?outcome.status, "resolved version metadata");
        Ok(metadata)
    }
}

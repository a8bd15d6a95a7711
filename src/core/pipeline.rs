use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::assets::{AssetGrabber, AssetIndex, AssetReport};
use crate::core::cache::{CacheKey, CacheStore};
use crate::core::downloader::{ConditionalFetcher, FetchOutcome, Validation};
use crate::core::error::{EngineError, EngineResult};
use crate::core::http::build_http_client;
use crate::core::jar::{self, MergeOutcome, MergePolicy, ProvenanceManifest, ServerAllowList, SplitOutcome};
use crate::core::state::EngineConfig;
use crate::core::version::{ArtifactDescriptor, ManifestResolver, VersionMetadata};

/// Everything needed to build a version: metadata, both jars, the asset index.
#[derive(Debug, Clone)]
pub struct PreparedVersion {
    pub metadata: VersionMetadata,
    pub client: FetchOutcome,
    /// `None` for versions that never shipped a server jar.
    pub server: Option<FetchOutcome>,
    pub asset_index: AssetIndex,
}

/// Caller-facing entry point. Each operation takes explicit inputs and
/// returns a value or a typed error; sequencing is left to the caller.
pub struct Engine {
    config: EngineConfig,
    fetcher: ConditionalFetcher,
    resolver: ManifestResolver,
    grabber: AssetGrabber,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let client = build_http_client(&config)
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;
        let store = CacheStore::new(&config.cache_root);
        let fetcher = ConditionalFetcher::new(client, store, &config);
        let resolver = ManifestResolver::new(fetcher.clone(), &config.version_manifest_url);
        let grabber = AssetGrabber::new(fetcher.clone(), &config.resources_url)
            .with_concurrency(config.concurrency);

        info!(cache_root = %config.cache_root.display(), "engine ready");
        Ok(Self {
            config,
            fetcher,
            resolver,
            grabber,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        self.fetcher.store()
    }

    /// Default destination for asset objects: `<cache_root>/assets`.
    pub fn assets_root(&self) -> PathBuf {
        self.config.cache_root.join("assets")
    }

    // ── Resolution ──

    pub async fn resolve_version(&self, id: &str) -> EngineResult<VersionMetadata> {
        self.resolver.resolve_version(id).await
    }

    pub async fn latest_release(&self) -> EngineResult<VersionMetadata> {
        self.resolver.latest_release().await
    }

    pub async fn latest_snapshot(&self) -> EngineResult<VersionMetadata> {
        self.resolver.latest_snapshot().await
    }

    // ── Downloads ──

    /// Fetch a hash-pinned artifact into the cache under `key`.
    pub async fn fetch_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        key: &CacheKey,
    ) -> EngineResult<FetchOutcome> {
        self.fetcher
            .fetch(&descriptor.source(Validation::HashOnly), key)
            .await
    }

    pub async fn fetch_client(&self, metadata: &VersionMetadata) -> EngineResult<FetchOutcome> {
        let key = CacheKey::client_jar(&metadata.id)?;
        self.fetch_artifact(&metadata.client, &key).await
    }

    pub async fn fetch_server(&self, metadata: &VersionMetadata) -> EngineResult<FetchOutcome> {
        let key = CacheKey::server_jar(&metadata.id)?;
        self.fetch_artifact(metadata.server()?, &key).await
    }

    pub async fn fetch_asset_index(&self, metadata: &VersionMetadata) -> EngineResult<AssetIndex> {
        AssetIndex::fetch(&self.fetcher, &metadata.asset_index).await
    }

    /// Download every object of `index` under `dest`. Failures are reported,
    /// unless `strict_assets` is set, in which case any failure is an error.
    pub async fn grab_assets(&self, index: &AssetIndex, dest: &Path) -> EngineResult<AssetReport> {
        let report = self.grabber.grab(index, dest).await?;
        if self.config.strict_assets {
            return report.into_strict();
        }
        if !report.is_complete() {
            warn!(failed = report.failed.len(), "continuing with missing assets");
        }
        Ok(report)
    }

    /// Resolve `id`, then fetch both jars and the asset index concurrently.
    pub async fn prepare_version(&self, id: &str) -> EngineResult<PreparedVersion> {
        let metadata = self.resolve_version(id).await?;

        let server = async {
            if metadata.server.is_some() {
                self.fetch_server(&metadata).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (client, server, asset_index) = tokio::try_join!(
            self.fetch_client(&metadata),
            server,
            self.fetch_asset_index(&metadata),
        )?;

        info!(version = id, "version prepared");
        Ok(PreparedVersion {
            metadata,
            client,
            server,
            asset_index,
        })
    }

    // ── Jars ──

    pub async fn merge_jars(
        &self,
        client: &Path,
        server: &Path,
        policy: MergePolicy,
        output: &Path,
    ) -> EngineResult<MergeOutcome> {
        let (client, server, output) = (client.to_path_buf(), server.to_path_buf(), output.to_path_buf());
        tokio::task::spawn_blocking(move || jar::merge(&client, &server, &policy, &output)).await?
    }

    pub async fn split_jars(
        &self,
        combined: &Path,
        provenance: &ProvenanceManifest,
        client_out: &Path,
        server_out: &Path,
    ) -> EngineResult<SplitOutcome> {
        let combined = combined.to_path_buf();
        let provenance = provenance.clone();
        let (client_out, server_out) = (client_out.to_path_buf(), server_out.to_path_buf());
        tokio::task::spawn_blocking(move || jar::split(&combined, &provenance, &client_out, &server_out))
            .await?
    }

    pub async fn extract_server_classes(
        &self,
        server: &Path,
        allow: &ServerAllowList,
        output: &Path,
    ) -> EngineResult<PathBuf> {
        let (server, output) = (server.to_path_buf(), output.to_path_buf());
        let allow = allow.clone();
        tokio::task::spawn_blocking(move || jar::extract_server_classes(&server, &allow, &output))
            .await?
    }

    // ── Lifecycle ──

    /// Stop dispatching work and abort in-flight transfers. Affects every
    /// clone of this engine's fetcher.
    pub fn cancel(&self) {
        self.fetcher.cancellation().cancel();
    }

    pub async fn clear_cache(&self) -> EngineResult<()> {
        info!(root = %self.config.cache_root.display(), "clearing cache");
        self.fetcher.store().clear().await
    }
}

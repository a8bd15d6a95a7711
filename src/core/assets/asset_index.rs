use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::core::cache::CacheKey;
use crate::core::downloader::{ConditionalFetcher, Validation};
use crate::core::error::{EngineError, EngineResult};
use crate::core::version::AssetIndexDescriptor;

/// Top-level asset index JSON structure.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
    /// Legacy indexes that are laid out by logical path instead of by hash.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// Path relative to an assets root: `objects/<hh>/<hash>`.
    pub fn key(&self) -> EngineResult<CacheKey> {
        CacheKey::object(&self.hash)
    }

    /// Download location under the conventional `<base>/<hh>/<hash>` layout.
    pub fn url(&self, resources_url: &str) -> String {
        let hash = self.hash.to_ascii_lowercase();
        let prefix = hash.get(..2).unwrap_or(&hash);
        format!("{}/{}/{}", resources_url.trim_end_matches('/'), prefix, hash)
    }
}

impl AssetIndex {
    pub fn parse(raw: &[u8]) -> EngineResult<Self> {
        serde_json::from_slice(raw).map_err(|e| EngineError::malformed("asset index", e.to_string()))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
        Self::parse(&raw)
    }

    /// Fetch (or revalidate) the index described by version metadata into
    /// `assets/indexes/<id>.json` and parse it.
    pub async fn fetch(
        fetcher: &ConditionalFetcher,
        descriptor: &AssetIndexDescriptor,
    ) -> EngineResult<Self> {
        let source = descriptor.artifact.source(Validation::Validator);
        let key = CacheKey::asset_index(&descriptor.id)?;
        let (outcome, raw) = fetcher.fetch_bytes(&source, &key).await?;
        let index = Self::parse(&raw)?;
        info!(
            index = %descriptor.id,
            status = ?outcome.status,
            objects = index.objects.len(),
            "loaded asset index"
        );
        Ok(index)
    }

    /// Sum of object sizes, counting shared content once.
    pub fn unique_size(&self) -> u64 {
        let mut seen = BTreeMap::new();
        for obj in self.objects.values() {
            seen.entry(obj.hash.to_ascii_lowercase()).or_insert(obj.size);
        }
        seen.values().sum()
    }
}

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, EngineResult};

/// Relative, `/`-separated location of an artifact inside a cache root.
///
/// Keys are derived from artifact identity (version id, content hash, index
/// id) so the same artifact always lands on the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> EngineResult<Self> {
        let raw = raw.into().replace('\\', "/");
        if raw.is_empty() || raw.starts_with('/') || raw.ends_with('/') {
            return Err(EngineError::InvalidCacheKey(raw));
        }
        if raw
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(EngineError::InvalidCacheKey(raw));
        }
        if raw.contains(':') {
            return Err(EngineError::InvalidCacheKey(raw));
        }
        Ok(Self(raw))
    }

    // ── Layout ──────────────────────────────────────────

    pub fn version_manifest() -> Self {
        Self("versions/version_manifest_v2.json".into())
    }

    pub fn version_metadata(id: &str) -> EngineResult<Self> {
        Self::new(format!("versions/{id}/{id}.json"))
    }

    pub fn client_jar(id: &str) -> EngineResult<Self> {
        Self::new(format!("versions/{id}/{id}-client.jar"))
    }

    pub fn server_jar(id: &str) -> EngineResult<Self> {
        Self::new(format!("versions/{id}/{id}-server.jar"))
    }

    pub fn asset_index(index_id: &str) -> EngineResult<Self> {
        Self::new(format!("assets/indexes/{index_id}.json"))
    }

    /// Content-addressed object key: `assets/objects/<first two hex>/<hash>`.
    pub fn asset_object(hash: &str) -> EngineResult<Self> {
        Self::object(hash).and_then(|rel| Self::new(format!("assets/{rel}")))
    }

    /// `objects/<hh>/<hash>`, the asset layout relative to an assets root.
    pub fn object(hash: &str) -> EngineResult<Self> {
        let hash = hash.to_ascii_lowercase();
        if hash.len() < 2 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::InvalidCacheKey(format!("object hash {hash}")));
        }
        Ok(Self(format!("objects/{}/{}", &hash[..2], hash)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a cache root.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, p| acc.join(p))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

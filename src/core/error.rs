use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Central error type for the engine.
/// Every module returns `Result<T, EngineError>`.
///
/// The type is `Clone` so that one in-flight download can hand the same
/// outcome to every caller waiting on it; foreign error sources are kept
/// behind an `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    // ── Network ─────────────────────────────────────────
    #[error("fetch of {url} failed after {attempts} attempt(s): {message}")]
    Network {
        url: String,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    // ── Integrity ───────────────────────────────────────
    #[error("content integrity failure for {artifact}: expected {expected}, got {actual}")]
    ContentIntegrity {
        artifact: String,
        expected: String,
        actual: String,
    },

    // ── Metadata ────────────────────────────────────────
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    #[error("malformed metadata in {document}: missing or invalid field `{field}`")]
    MalformedMetadata { document: String, field: String },

    // ── Cache ───────────────────────────────────────────
    #[error("invalid cache key: {0}")]
    InvalidCacheKey(String),

    // ── Assets ──────────────────────────────────────────
    #[error("{failed} asset object(s) failed, first: {first}")]
    PartialAssetFailure { failed: usize, first: String },

    // ── Jars ────────────────────────────────────────────
    #[error("merge conflict on {} path(s): {}", .paths.len(), .paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    #[error("no provenance record for archive entry {path}")]
    MissingProvenance { path: String },

    #[error("provenance checksum mismatch for {path}: manifest says {expected}, archive has {actual}")]
    ProvenanceMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("duplicate entry {path} in {archive:?}")]
    DuplicateEntry { archive: PathBuf, path: String },

    #[error("Zip error: {0}")]
    Zip(Arc<zip::result::ZipError>),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    // ── Runtime ─────────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    Task(String),
}

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn malformed(document: impl Into<String>, field: impl Into<String>) -> Self {
        EngineError::MalformedMetadata {
            document: document.into(),
            field: field.into(),
        }
    }

    /// Whether the conditional fetcher may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Network { .. })
    }
}

impl From<std::io::Error> for EngineError {
    fn from(source: std::io::Error) -> Self {
        EngineError::io(PathBuf::new(), source)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(source: serde_json::Error) -> Self {
        EngineError::Json(Arc::new(source))
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(source: zip::result::ZipError) -> Self {
        EngineError::Zip(Arc::new(source))
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(source: tokio::task::JoinError) -> Self {
        EngineError::Task(source.to_string())
    }
}

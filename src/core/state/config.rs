use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{EngineError, EngineResult};

const APP_DIR_NAME: &str = "jarsmith";
const APP_USER_AGENT: &str = concat!("jarsmith/", env!("CARGO_PKG_VERSION"));

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Retry settings for network attempts made by the conditional fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per transfer, first one included.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Fraction of the computed delay added or removed at random (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Engine configuration. Passed explicitly to [`crate::core::pipeline::Engine::new`];
/// nothing in the crate reads a process-wide location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the persistent cache (versions and assets areas live below it).
    pub cache_root: PathBuf,
    pub version_manifest_url: String,
    pub resources_url: String,
    /// Size of the worker pool used for parallel fetches.
    pub concurrency: usize,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Per-attempt timeout covering request and body transfer.
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    /// Treat any failed asset object as a fatal error.
    pub strict_assets: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            version_manifest_url: VERSION_MANIFEST_URL.to_string(),
            resources_url: RESOURCES_URL.to_string(),
            concurrency: 8,
            user_agent: APP_USER_AGENT.to_string(),
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
            retry: RetryConfig::default(),
            strict_assets: false,
        }
    }
}

impl EngineConfig {
    /// Config rooted at `cache_root`, everything else default.
    pub fn with_cache_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| EngineError::io(path, e))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.concurrency == 0 {
            return Err(EngineError::Config("concurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(EngineError::Config("retry.jitter must be within 0..=1".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{ "cache_root": "/tmp/cache", "concurrency": 2, "retry": { "max_attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.cache_root, PathBuf::from("/tmp/cache"));
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_backoff_ms, 250);
        assert_eq!(cfg.version_manifest_url, VERSION_MANIFEST_URL);
        assert!(!cfg.strict_assets);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cfg = EngineConfig {
            concurrency: 0,
            ..EngineConfig::with_cache_root("/tmp")
        };
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let cfg = EngineConfig {
            strict_assets: true,
            ..EngineConfig::with_cache_root(dir.path())
        };
        cfg.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
    }
}

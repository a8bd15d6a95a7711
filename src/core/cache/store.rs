use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use super::key::CacheKey;
use crate::core::digest::sha1_hex;
use crate::core::error::{EngineError, EngineResult};

const SIDECAR_SUFFIX: &str = ".cache.json";

/// A published cache entry: content on disk plus the metadata that validated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    /// Server-issued freshness token (ETag), if the source supports one.
    pub validator: Option<String>,
    /// SHA-1 of the content, verified before the entry was published.
    pub sha1: String,
    pub size: u64,
    pub validated_at: DateTime<Utc>,
}

/// On-disk sidecar stored next to every published content file.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    validator: Option<String>,
    sha1: String,
    size: u64,
    validated_at: DateTime<Utc>,
}

/// Durable key → content store rooted at a directory.
///
/// Writes go through [`CacheStore::stage`] and [`StagedEntry::commit`]: the
/// content is flushed to a temporary file in the destination directory and
/// only renamed over the final name once complete, so an interrupted write
/// never becomes visible. Reads take no locks.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        key.resolve(&self.root)
    }

    /// Look up a published entry. Entries whose content file or sidecar is
    /// missing or unreadable are reported as absent.
    pub async fn get(&self, key: &CacheKey) -> EngineResult<Option<CacheEntry>> {
        let path = self.path_for(key);
        let sidecar_path = sidecar_path(&path);

        let raw = match tokio::fs::read(&sidecar_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::io(sidecar_path, e)),
        };
        let sidecar: Sidecar = match serde_json::from_slice(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %key, error = %e, "unreadable cache sidecar, treating as absent");
                return Ok(None);
            }
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::io(path, e)),
        }

        Ok(Some(CacheEntry {
            key: key.clone(),
            path,
            validator: sidecar.validator,
            sha1: sidecar.sha1,
            size: sidecar.size,
            validated_at: sidecar.validated_at,
        }))
    }

    /// Read the published content of an entry.
    pub async fn read(&self, entry: &CacheEntry) -> EngineResult<Vec<u8>> {
        tokio::fs::read(&entry.path)
            .await
            .map_err(|e| EngineError::io(&entry.path, e))
    }

    /// SHA-1 of whatever currently sits at the entry's content path.
    pub async fn content_sha1(&self, entry: &CacheEntry) -> EngineResult<String> {
        let bytes = self.read(entry).await?;
        Ok(tokio::task::spawn_blocking(move || sha1_hex(&bytes)).await?)
    }

    /// Write `content` to a temporary file beside the key's final location.
    /// Nothing is visible under the key until [`StagedEntry::commit`].
    pub async fn stage(&self, key: &CacheKey, content: Vec<u8>) -> EngineResult<StagedEntry> {
        let path = self.path_for(key);
        let key = key.clone();

        tokio::task::spawn_blocking(move || {
            let parent = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&parent).map_err(|e| EngineError::io(&parent, e))?;

            let mut temp = NamedTempFile::new_in(&parent).map_err(|e| EngineError::io(&parent, e))?;
            temp.write_all(&content)
                .and_then(|_| temp.as_file().sync_all())
                .map_err(|e| EngineError::io(temp.path(), e))?;

            trace!(key = %key, bytes = content.len(), "staged cache content");
            Ok(StagedEntry {
                key,
                path,
                temp,
                size: content.len() as u64,
            })
        })
        .await?
    }

    /// Stage and commit in one step.
    pub async fn put(
        &self,
        key: &CacheKey,
        content: Vec<u8>,
        validator: Option<String>,
        sha1: String,
    ) -> EngineResult<CacheEntry> {
        self.stage(key, content).await?.commit(validator, sha1).await
    }

    /// Record a successful revalidation without touching the content.
    pub async fn refresh(&self, entry: &CacheEntry) -> EngineResult<CacheEntry> {
        let mut refreshed = entry.clone();
        refreshed.validated_at = Utc::now();
        let sidecar = Sidecar {
            validator: refreshed.validator.clone(),
            sha1: refreshed.sha1.clone(),
            size: refreshed.size,
            validated_at: refreshed.validated_at,
        };
        let path = refreshed.path.clone();
        tokio::task::spawn_blocking(move || write_sidecar(&path, &sidecar)).await??;
        Ok(refreshed)
    }

    /// Remove an entry. The sidecar goes first so a half-removed entry is
    /// never reported as present.
    pub async fn invalidate(&self, key: &CacheKey) -> EngineResult<()> {
        let path = self.path_for(key);
        remove_if_exists(&sidecar_path(&path)).await?;
        remove_if_exists(&path).await?;
        debug!(key = %key, "invalidated cache entry");
        Ok(())
    }

    /// Delete everything under the cache root.
    pub async fn clear(&self) -> EngineResult<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                debug!(root = %self.root.display(), "cleared cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::io(&self.root, e)),
        }
    }
}

/// Content written to a temporary file, not yet published.
/// Dropping it deletes the temporary file.
#[derive(Debug)]
pub struct StagedEntry {
    key: CacheKey,
    path: PathBuf,
    temp: NamedTempFile,
    size: u64,
}

impl StagedEntry {
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Publish the staged content under its key.
    ///
    /// Order: drop the old sidecar, rename the content into place, then
    /// publish the new sidecar. At no point does a sidecar describe bytes it
    /// was not written for.
    pub async fn commit(self, validator: Option<String>, sha1: String) -> EngineResult<CacheEntry> {
        let StagedEntry {
            key,
            path,
            temp,
            size,
        } = self;

        tokio::task::spawn_blocking(move || {
            let sidecar_file = sidecar_path(&path);
            match std::fs::remove_file(&sidecar_file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(EngineError::io(sidecar_file, e)),
            }

            temp.persist(&path)
                .map_err(|e| EngineError::io(&path, e.error))?;

            let validated_at = Utc::now();
            write_sidecar(
                &path,
                &Sidecar {
                    validator: validator.clone(),
                    sha1: sha1.clone(),
                    size,
                    validated_at,
                },
            )?;

            debug!(key = %key, size, "published cache entry");
            Ok(CacheEntry {
                key,
                path,
                validator,
                sha1,
                size,
                validated_at,
            })
        })
        .await?
    }
}

fn sidecar_path(content: &Path) -> PathBuf {
    let mut name: OsString = content.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn write_sidecar(content: &Path, sidecar: &Sidecar) -> EngineResult<()> {
    let target = sidecar_path(content);
    let parent = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let json = serde_json::to_vec_pretty(sidecar)?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(|e| EngineError::io(&parent, e))?;
    temp.write_all(&json)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| EngineError::io(temp.path(), e))?;
    temp.persist(&target)
        .map_err(|e| EngineError::io(&target, e.error))?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> EngineResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::io(path, e)),
    }
}

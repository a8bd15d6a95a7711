use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::entry::OriginTag;
use crate::core::error::{EngineError, EngineResult};

pub const PROVENANCE_FORMAT: u32 = 1;
const PROVENANCE_SUFFIX: &str = ".provenance.json";

/// Origin and checksum recorded for one combined-archive entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub origin: OriginTag,
    /// SHA-256 of the bytes written to the combined archive.
    pub checksum: String,
}

/// Side-channel manifest mapping combined-archive paths to their origin.
/// Zip has no field for it, so it is persisted next to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceManifest {
    pub format: u32,
    pub entries: BTreeMap<String, ProvenanceRecord>,
}

impl Default for ProvenanceManifest {
    fn default() -> Self {
        Self {
            format: PROVENANCE_FORMAT,
            entries: BTreeMap::new(),
        }
    }
}

impl ProvenanceManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, origin: OriginTag, checksum: impl Into<String>) {
        self.entries.insert(
            path.into(),
            ProvenanceRecord {
                origin,
                checksum: checksum.into(),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&ProvenanceRecord> {
        self.entries.get(path)
    }

    pub fn origin(&self, path: &str) -> Option<OriginTag> {
        self.get(path).map(|r| r.origin)
    }

    pub fn count(&self, origin: OriginTag) -> usize {
        self.entries.values().filter(|r| r.origin == origin).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Conventional location for the manifest of `combined`: `<combined>.provenance.json`.
    pub fn path_for(combined: &Path) -> PathBuf {
        let mut name: OsString = combined.as_os_str().to_owned();
        name.push(PROVENANCE_SUFFIX);
        PathBuf::from(name)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
        let manifest: ProvenanceManifest = serde_json::from_slice(&raw)?;
        if manifest.format != PROVENANCE_FORMAT {
            return Err(EngineError::malformed(
                format!("provenance manifest {}", path.display()),
                "format",
            ));
        }
        Ok(manifest)
    }

    /// Atomically write the manifest as pretty JSON.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(|e| EngineError::io(&parent, e))?;

        let json = serde_json::to_vec_pretty(self)?;
        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| EngineError::io(&parent, e))?;
        temp.write_all(&json)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| EngineError::io(path, e))?;
        temp.persist(path)
            .map_err(|e| EngineError::io(path, e.error))?;
        Ok(())
    }
}

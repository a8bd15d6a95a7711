// ─── Version Catalog ───
// The top-level document listing every published version (version_manifest_v2).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::{EngineError, EngineResult};

const DOCUMENT: &str = "version catalog";
const ENTRY_FIELDS: [&str; 5] = ["id", "type", "url", "time", "releaseTime"];

/// Top-level version catalog.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    /// Absent in catalogs that only list versions.
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
    #[serde(other)]
    Unknown,
}

/// A single entry in the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    /// Location of the per-version metadata document.
    pub url: String,
    pub time: DateTime<Utc>,
    pub release_time: DateTime<Utc>,
    /// SHA-1 of the metadata document (v2 catalogs only).
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionCatalog {
    /// Parse a catalog. A missing or ill-typed field is reported by its
    /// dotted path, e.g. `versions.3.url` or `latest.release`.
    pub fn parse(raw: &[u8]) -> EngineResult<Self> {
        let doc: Value = serde_json::from_slice(raw)
            .map_err(|_| EngineError::malformed(DOCUMENT, "<document>"))?;

        let entries = doc
            .get("versions")
            .and_then(Value::as_array)
            .ok_or_else(|| EngineError::malformed(DOCUMENT, "versions"))?;

        let mut versions = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if let Some(field) = ENTRY_FIELDS
                .iter()
                .find(|field| !entry.get(**field).is_some_and(Value::is_string))
            {
                return Err(EngineError::malformed(DOCUMENT, format!("versions.{i}.{field}")));
            }
            let parsed: VersionEntry = serde_json::from_value(entry.clone())
                .map_err(|_| EngineError::malformed(DOCUMENT, format!("versions.{i}")))?;
            versions.push(parsed);
        }

        let latest = match doc.get("latest") {
            None | Some(Value::Null) => None,
            Some(latest) => Some(LatestVersions {
                release: latest_field(latest, "release")?,
                snapshot: latest_field(latest, "snapshot")?,
            }),
        };

        Ok(Self { latest, versions })
    }

    /// Id the catalog names as the current release.
    pub fn latest_release(&self) -> EngineResult<&str> {
        self.latest
            .as_ref()
            .map(|l| l.release.as_str())
            .ok_or_else(|| EngineError::malformed(DOCUMENT, "latest.release"))
    }

    /// Id the catalog names as the current snapshot.
    pub fn latest_snapshot(&self) -> EngineResult<&str> {
        self.latest
            .as_ref()
            .map(|l| l.snapshot.as_str())
            .ok_or_else(|| EngineError::malformed(DOCUMENT, "latest.snapshot"))
    }

    /// Exact-id lookup (e.g. "1.12.2").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// All release versions, newest first as published.
    pub fn releases(&self) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| v.version_type == VersionType::Release)
            .collect()
    }
}

fn latest_field(latest: &Value, name: &str) -> EngineResult<String> {
    latest
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| EngineError::malformed(DOCUMENT, format!("latest.{name}")))
}

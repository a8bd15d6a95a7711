// ─── Version Metadata ───
// Parses the per-version document: client/server downloads and the asset index.

use serde_json::Value;

use crate::core::downloader::{RemoteSource, Validation};
use crate::core::error::{EngineError, EngineResult};

/// Remote location plus the hash and size that validate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

impl ArtifactDescriptor {
    pub fn source(&self, validation: Validation) -> RemoteSource {
        RemoteSource {
            url: self.url.clone(),
            sha1: Some(self.sha1.clone()),
            size: Some(self.size),
            validation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetIndexDescriptor {
    pub id: String,
    pub artifact: ArtifactDescriptor,
    /// Sum of all object sizes, when the publisher states it.
    pub total_size: Option<u64>,
}

/// A parsed per-version metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMetadata {
    pub id: String,
    pub client: ArtifactDescriptor,
    /// Absent for versions that never shipped a server.
    pub server: Option<ArtifactDescriptor>,
    pub asset_index: AssetIndexDescriptor,
}

impl VersionMetadata {
    /// Parse a metadata document. A missing or ill-typed required field is
    /// reported by its dotted path, e.g. `downloads.client.sha1`.
    pub fn parse(raw: &[u8]) -> EngineResult<Self> {
        let doc: Value = serde_json::from_slice(raw)
            .map_err(|e| EngineError::malformed("version metadata", format!("<document>: {e}")))?;

        let id = require_str(&doc, "id", "version metadata")?;
        let document = format!("version metadata {id}");

        let client = require_descriptor(&doc, "downloads.client", &document)?;
        let server = match lookup(&doc, "downloads.server") {
            None | Some(Value::Null) => None,
            Some(_) => Some(require_descriptor(&doc, "downloads.server", &document)?),
        };

        let asset_index = AssetIndexDescriptor {
            id: require_str(&doc, "assetIndex.id", &document)?,
            artifact: require_descriptor(&doc, "assetIndex", &document)?,
            total_size: lookup(&doc, "assetIndex.totalSize").and_then(Value::as_u64),
        };

        Ok(Self {
            id,
            client,
            server,
            asset_index,
        })
    }

    /// The server download, or a metadata error naming it.
    pub fn server(&self) -> EngineResult<&ArtifactDescriptor> {
        self.server.as_ref().ok_or_else(|| {
            EngineError::malformed(format!("version metadata {}", self.id), "downloads.server")
        })
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, part| node.get(part))
}

fn require_str(doc: &Value, path: &str, document: &str) -> EngineResult<String> {
    lookup(doc, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| EngineError::malformed(document, path))
}

fn require_u64(doc: &Value, path: &str, document: &str) -> EngineResult<u64> {
    lookup(doc, path)
        .and_then(Value::as_u64)
        .ok_or_else(|| EngineError::malformed(document, path))
}

fn require_descriptor(doc: &Value, path: &str, document: &str) -> EngineResult<ArtifactDescriptor> {
    if !lookup(doc, path).is_some_and(Value::is_object) {
        return Err(EngineError::malformed(document, path));
    }
    Ok(ArtifactDescriptor {
        url: require_str(doc, &format!("{path}.url"), document)?,
        sha1: require_str(doc, &format!("{path}.sha1"), document)?,
        size: require_u64(doc, &format!("{path}.size"), document)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "1.12.2",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {
                "id": "1.12",
                "sha1": "1584b57c1d0f5e5e4d3e1b2f0d8f9b0d1e7c2a3b",
                "size": 170285,
                "totalSize": 148003410,
                "url": "https://example.com/indexes/1.12.json"
            },
            "downloads": {
                "client": {
                    "sha1": "0f275bc1547d01fa5f56ba34bdc87d981ee12daf",
                    "size": 10180113,
                    "url": "https://example.com/client.jar"
                },
                "server": {
                    "sha1": "886945bfb2b978778c3a0288fd7fab09d315b25f",
                    "size": 30222121,
                    "url": "https://example.com/server.jar"
                }
            }
        })
    }

    fn parse(doc: &Value) -> EngineResult<VersionMetadata> {
        VersionMetadata::parse(doc.to_string().as_bytes())
    }

    fn missing_field(err: EngineError) -> String {
        match err {
            EngineError::MalformedMetadata { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_downloads_and_asset_index() {
        let meta = parse(&sample()).unwrap();
        assert_eq!(meta.id, "1.12.2");
        assert_eq!(meta.client.size, 10180113);
        assert_eq!(meta.server().unwrap().url, "https://example.com/server.jar");
        assert_eq!(meta.asset_index.id, "1.12");
        assert_eq!(meta.asset_index.artifact.size, 170285);
        assert_eq!(meta.asset_index.total_size, Some(148003410));

        let source = meta.client.source(Validation::HashOnly);
        assert_eq!(source.sha1.as_deref(), Some("0f275bc1547d01fa5f56ba34bdc87d981ee12daf"));
        assert_eq!(source.size, Some(10180113));
    }

    #[test]
    fn names_the_missing_field() {
        let mut doc = sample();
        doc["downloads"]["client"]
            .as_object_mut()
            .unwrap()
            .remove("sha1");
        assert_eq!(missing_field(parse(&doc).unwrap_err()), "downloads.client.sha1");

        let mut doc = sample();
        doc.as_object_mut().unwrap().remove("assetIndex");
        assert_eq!(missing_field(parse(&doc).unwrap_err()), "assetIndex.id");

        let mut doc = sample();
        doc["downloads"]["client"]["size"] = json!("big");
        assert_eq!(missing_field(parse(&doc).unwrap_err()), "downloads.client.size");

        let mut doc = sample();
        doc.as_object_mut().unwrap().remove("id");
        assert_eq!(missing_field(parse(&doc).unwrap_err()), "id");
    }

    #[test]
    fn server_is_optional_until_requested() {
        let mut doc = sample();
        doc["downloads"].as_object_mut().unwrap().remove("server");
        let meta = parse(&doc).unwrap();
        assert!(meta.server.is_none());
        assert_eq!(missing_field(meta.server().unwrap_err()), "downloads.server");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            VersionMetadata::parse(b"<html>"),
            Err(EngineError::MalformedMetadata { .. })
        ));
    }
}

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::entry::{read_archive, write_archive, ArchiveEntry};
use super::provenance::ProvenanceManifest;
use crate::core::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub client: PathBuf,
    pub server: PathBuf,
    pub client_entries: usize,
    pub server_entries: usize,
}

/// Route every entry of `combined` to the client and/or server output using
/// its provenance record. An entry without a record is fatal; nothing is
/// written in that case.
pub fn split(
    combined: &Path,
    provenance: &ProvenanceManifest,
    client_out: &Path,
    server_out: &Path,
) -> EngineResult<SplitOutcome> {
    info!(combined = %combined.display(), "splitting jar");
    let entries = read_archive(combined)?;

    let (client, server) = route_entries(&entries, provenance)?;

    let client_path = write_archive(client_out, client.iter().copied())?;
    let server_path = write_archive(server_out, server.iter().copied())?;

    info!(
        client = client.len(),
        server = server.len(),
        "split jar"
    );
    Ok(SplitOutcome {
        client: client_path,
        server: server_path,
        client_entries: client.len(),
        server_entries: server.len(),
    })
}

/// Partition entries by origin, checking each against its recorded checksum.
pub fn route_entries<'a>(
    entries: &'a [ArchiveEntry],
    provenance: &ProvenanceManifest,
) -> EngineResult<(Vec<&'a ArchiveEntry>, Vec<&'a ArchiveEntry>)> {
    let mut client = Vec::new();
    let mut server = Vec::new();
    let mut seen = BTreeSet::new();

    for entry in entries {
        let record = provenance
            .get(&entry.path)
            .ok_or_else(|| EngineError::MissingProvenance {
                path: entry.path.clone(),
            })?;
        if !record.checksum.eq_ignore_ascii_case(&entry.checksum) {
            return Err(EngineError::ProvenanceMismatch {
                path: entry.path.clone(),
                expected: record.checksum.clone(),
                actual: entry.checksum.clone(),
            });
        }
        seen.insert(entry.path.as_str());

        if record.origin.in_client() {
            client.push(entry);
        }
        if record.origin.in_server() {
            server.push(entry);
        }
    }

    let orphaned = provenance
        .entries
        .keys()
        .filter(|path| !seen.contains(path.as_str()))
        .count();
    if orphaned > 0 {
        warn!(orphaned, "provenance lists entries absent from the combined jar");
    }

    Ok((client, server))
}

/// Prefixes kept when stripping bundled libraries from a server jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAllowList {
    pub prefixes: Vec<String>,
    /// Keep files at the archive root (e.g. `version.json`, `log4j2.xml`).
    pub keep_root_files: bool,
}

impl Default for ServerAllowList {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "net/minecraft/".into(),
                "com/mojang/".into(),
                "assets/".into(),
                "data/".into(),
                "META-INF/MANIFEST.MF".into(),
            ],
            keep_root_files: true,
        }
    }
}

impl ServerAllowList {
    pub fn allows(&self, entry: &ArchiveEntry) -> bool {
        if self.keep_root_files && !entry.is_dir && !entry.path.contains('/') {
            return true;
        }
        if self.prefixes.iter().any(|p| entry.path.starts_with(p.as_str())) {
            return true;
        }
        // Parent directories of an allowed prefix, such as `net/`.
        entry.is_dir
            && self
                .prefixes
                .iter()
                .any(|p| p.starts_with(entry.path.as_str()))
    }
}

/// Copy only the game's own entries from a vanilla server jar into `output`.
pub fn extract_server_classes(
    server: &Path,
    allow: &ServerAllowList,
    output: &Path,
) -> EngineResult<PathBuf> {
    let entries = read_archive(server)?;
    let total = entries.len();
    let kept: Vec<&ArchiveEntry> = entries.iter().filter(|e| allow.allows(e)).collect();
    debug!(
        server = %server.display(),
        kept = kept.len(),
        dropped = total - kept.len(),
        "filtered server jar"
    );
    write_archive(output, kept)
}

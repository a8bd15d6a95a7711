use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::entry::{read_archive, write_archive, ArchiveEntry, OriginTag};
use super::policy::{ConflictStrategy, MergePolicy};
use super::provenance::ProvenanceManifest;
use crate::core::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub client_only: usize,
    pub server_only: usize,
    pub common: usize,
    /// Paths present on both sides with different bytes, resolved by policy.
    pub conflicts_resolved: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub combined: PathBuf,
    pub provenance_path: PathBuf,
    pub provenance: ProvenanceManifest,
    pub stats: MergeStats,
}

/// Result of merging two in-memory entry sets, before anything is written.
#[derive(Debug, Clone)]
pub struct MergedEntries {
    pub entries: Vec<ArchiveEntry>,
    pub provenance: ProvenanceManifest,
    pub stats: MergeStats,
}

/// Merge the client and server jars into `output` and persist the
/// provenance manifest beside it.
///
/// Under [`ConflictStrategy::FailOnDifference`] every differing path is
/// reported and neither file is created.
pub fn merge(
    client: &Path,
    server: &Path,
    policy: &MergePolicy,
    output: &Path,
) -> EngineResult<MergeOutcome> {
    info!(
        client = %client.display(),
        server = %server.display(),
        policy = ?policy.conflict,
        "merging jars"
    );

    let client_entries = index_entries(client, read_archive(client)?, policy)?;
    let server_entries = index_entries(server, read_archive(server)?, policy)?;
    let merged = merge_indexed(client_entries, server_entries, policy)?;

    let combined = write_archive(output, &merged.entries)?;
    let provenance_path = ProvenanceManifest::path_for(&combined);
    merged.provenance.save(&provenance_path)?;

    info!(
        combined = %combined.display(),
        client_only = merged.stats.client_only,
        server_only = merged.stats.server_only,
        common = merged.stats.common,
        "merged jars"
    );

    Ok(MergeOutcome {
        combined,
        provenance_path,
        provenance: merged.provenance,
        stats: merged.stats,
    })
}

/// Merge two entry lists without touching the filesystem.
pub fn merge_entries(
    client: Vec<ArchiveEntry>,
    server: Vec<ArchiveEntry>,
    policy: &MergePolicy,
) -> EngineResult<MergedEntries> {
    let client = index_entries(Path::new("client"), client, policy)?;
    let server = index_entries(Path::new("server"), server, policy)?;
    merge_indexed(client, server, policy)
}

/// Key entries by their policy match key. Two entries of one archive that
/// only collide under that key are a duplicate; directories collapse.
fn index_entries(
    archive: &Path,
    entries: Vec<ArchiveEntry>,
    policy: &MergePolicy,
) -> EngineResult<BTreeMap<String, ArchiveEntry>> {
    let mut indexed: BTreeMap<String, ArchiveEntry> = BTreeMap::new();
    for entry in entries {
        let key = policy.match_key(&entry.path);
        if let Some(existing) = indexed.get(&key) {
            if existing.is_dir && entry.is_dir {
                continue;
            }
            return Err(EngineError::DuplicateEntry {
                archive: archive.to_path_buf(),
                path: entry.path,
            });
        }
        indexed.insert(key, entry);
    }
    Ok(indexed)
}

fn merge_indexed(
    mut client: BTreeMap<String, ArchiveEntry>,
    mut server: BTreeMap<String, ArchiveEntry>,
    policy: &MergePolicy,
) -> EngineResult<MergedEntries> {
    let mut stats = MergeStats::default();
    let mut conflicts = Vec::new();
    let mut chosen: Vec<(ArchiveEntry, OriginTag)> = Vec::with_capacity(client.len() + server.len());

    let keys: Vec<String> = client.keys().chain(server.keys()).cloned().collect();
    for key in keys {
        let (c, s) = (client.remove(&key), server.remove(&key));
        match (c, s) {
            (Some(c), None) => {
                stats.client_only += 1;
                chosen.push((c, OriginTag::ClientOnly));
            }
            (None, Some(s)) => {
                stats.server_only += 1;
                chosen.push((s, OriginTag::ServerOnly));
            }
            (Some(c), Some(s)) if c.same_content(&s) => {
                stats.common += 1;
                chosen.push((c, OriginTag::Common));
            }
            (Some(c), Some(s)) => match policy.conflict {
                ConflictStrategy::PreferClient => {
                    debug!(path = %c.path, "conflict resolved in favour of client");
                    stats.conflicts_resolved += 1;
                    stats.client_only += 1;
                    chosen.push((c, OriginTag::ClientOnly));
                }
                ConflictStrategy::PreferServer => {
                    debug!(path = %s.path, "conflict resolved in favour of server");
                    stats.conflicts_resolved += 1;
                    stats.server_only += 1;
                    chosen.push((s, OriginTag::ServerOnly));
                }
                ConflictStrategy::FailOnDifference => conflicts.push(c.path),
            },
            // Already consumed through the other map.
            (None, None) => {}
        }
    }

    if !conflicts.is_empty() {
        conflicts.sort();
        warn!(count = conflicts.len(), "merge aborted on differing entries");
        return Err(EngineError::MergeConflict { paths: conflicts });
    }

    chosen.sort_by(|a, b| a.0.path.cmp(&b.0.path));
    let mut provenance = ProvenanceManifest::new();
    for (entry, origin) in &chosen {
        provenance.insert(entry.path.clone(), *origin, entry.checksum.clone());
    }

    Ok(MergedEntries {
        entries: chosen.into_iter().map(|(entry, _)| entry).collect(),
        provenance,
        stats,
    })
}

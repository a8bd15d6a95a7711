// ─── Jar Merge / Split ───
// Combines client and server jars with a provenance manifest and routes the
// combined jar back into per-side archives.

pub mod entry;
pub mod merge;
pub mod policy;
pub mod provenance;
pub mod split;

pub use entry::{normalize_path, read_archive, write_archive, ArchiveEntry, OriginTag};
pub use merge::{merge, merge_entries, MergeOutcome, MergeStats, MergedEntries};
pub use policy::{ConflictStrategy, MergePolicy};
pub use provenance::{ProvenanceManifest, ProvenanceRecord};
pub use split::{extract_server_classes, route_entries, split, ServerAllowList, SplitOutcome};

use serde::{Deserialize, Serialize};

/// What to do when both archives carry a path with different bytes.
///
/// There is deliberately no default: callers pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Keep the client bytes; the entry is recorded as client-only.
    PreferClient,
    /// Keep the server bytes; the entry is recorded as server-only.
    PreferServer,
    /// Abort the merge, listing every differing path.
    FailOnDifference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    pub conflict: ConflictStrategy,
    /// When false, paths differing only by ASCII case are the same entry.
    pub case_sensitive: bool,
}

impl MergePolicy {
    pub fn new(conflict: ConflictStrategy) -> Self {
        Self {
            conflict,
            case_sensitive: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Key under which a normalized path is matched across archives.
    pub fn match_key(&self, path: &str) -> String {
        if self.case_sensitive {
            path.to_string()
        } else {
            path.to_ascii_lowercase()
        }
    }
}

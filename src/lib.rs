pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{EngineError, EngineResult};
pub use crate::core::jar::{ConflictStrategy, MergePolicy, OriginTag, ProvenanceManifest};
pub use crate::core::pipeline::{Engine, PreparedVersion};
pub use crate::core::state::{EngineConfig, RetryConfig};

/// Install the fmt subscriber, filtered by `RUST_LOG` or `info,jarsmith=debug`.
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jarsmith=debug")),
        )
        .try_init();
}

pub mod inflight;
pub mod key;
pub mod store;

pub use inflight::InFlight;
pub use key::CacheKey;
pub use store::{CacheEntry, CacheStore, StagedEntry};

pub mod client;
pub mod retry;
pub mod source;

pub use client::{ConditionalFetcher, FetchOutcome, FetchStatus};
pub use retry::RetryPolicy;
pub use source::{RemoteSource, Validation};

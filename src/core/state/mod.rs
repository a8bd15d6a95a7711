pub mod config;

pub use config::{EngineConfig, RetryConfig};

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::state::EngineConfig;

/// Builds the shared HTTP client.
///
/// Bodies are requested with `identity` encoding so that the bytes hashed are
/// the bytes the server advertises in its descriptors.
pub fn build_http_client(config: &EngineConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(default_headers)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.concurrency)
        .build()
}

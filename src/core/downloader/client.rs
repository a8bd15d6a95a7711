use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use super::source::{RemoteSource, Validation};
use crate::core::cache::{CacheEntry, CacheKey, CacheStore, InFlight};
use crate::core::digest::{same_digest, sha1_hex};
use crate::core::error::{EngineError, EngineResult};
use crate::core::state::EngineConfig;

/// Transfers allowed per fetch when the body fails hash verification.
const INTEGRITY_ATTEMPTS: u32 = 2;

/// How a fetch was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Local content matched the expected hash; no request was made.
    Cached,
    /// The server confirmed the recorded validator (`304`); no body transferred.
    NotModified,
    /// A body was transferred, verified and published.
    Downloaded,
}

/// A verified local artifact.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub entry: CacheEntry,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn path(&self) -> &std::path::Path {
        &self.entry.path
    }

    pub fn transferred(&self) -> bool {
        self.status == FetchStatus::Downloaded
    }
}

enum Transfer {
    NotModified,
    Body { bytes: Vec<u8>, etag: Option<String> },
}

/// Conditional, hash-verified downloader backed by a [`CacheStore`].
///
/// At most one transfer per cache location is in flight at a time; callers
/// asking for the same key while a transfer runs share its outcome.
#[derive(Clone)]
pub struct ConditionalFetcher {
    client: Client,
    store: CacheStore,
    retry: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
    inflight: Arc<InFlight<EngineResult<FetchOutcome>>>,
}

impl ConditionalFetcher {
    pub fn new(client: Client, store: CacheStore, config: &EngineConfig) -> Self {
        Self {
            client,
            store,
            retry: RetryPolicy::from(&config.retry),
            timeout: config.request_timeout(),
            cancel: CancellationToken::new(),
            inflight: Arc::new(InFlight::new()),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Same client, policy, cancellation and in-flight table, different cache root.
    pub fn rooted_at(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            store: CacheStore::new(root),
            ..self.clone()
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Make `key` hold a verified copy of `source` and return it.
    pub async fn fetch(&self, source: &RemoteSource, key: &CacheKey) -> EngineResult<FetchOutcome> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if let Some(hit) = self.cached_hit(source, key).await? {
            return Ok(hit);
        }

        let slot = self.store.path_for(key).to_string_lossy().into_owned();
        self.inflight
            .run(&slot, || self.fetch_exclusive(source, key))
            .await
    }

    /// Fetch and return the content bytes.
    pub async fn fetch_bytes(
        &self,
        source: &RemoteSource,
        key: &CacheKey,
    ) -> EngineResult<(FetchOutcome, Vec<u8>)> {
        let outcome = self.fetch(source, key).await?;
        let bytes = self.store.read(&outcome.entry).await?;
        Ok((outcome, bytes))
    }

    /// A cached entry is usable without the network when its content still
    /// hashes to what the source declares.
    async fn cached_hit(
        &self,
        source: &RemoteSource,
        key: &CacheKey,
    ) -> EngineResult<Option<FetchOutcome>> {
        let Some(expected) = source.sha1.as_deref() else {
            return Ok(None);
        };
        let Some(entry) = self.store.get(key).await? else {
            return Ok(None);
        };
        if !same_digest(&entry.sha1, expected) || source.size.is_some_and(|s| s != entry.size) {
            debug!(key = %key, "cached entry describes a different artifact");
            return Ok(None);
        }

        let actual = self.store.content_sha1(&entry).await?;
        if !same_digest(&actual, expected) {
            warn!(key = %key, expected, actual = %actual, "cached content is corrupted, refetching");
            return Ok(None);
        }

        debug!(key = %key, "cache hit");
        Ok(Some(FetchOutcome {
            entry,
            status: FetchStatus::Cached,
        }))
    }

    async fn fetch_exclusive(
        &self,
        source: &RemoteSource,
        key: &CacheKey,
    ) -> EngineResult<FetchOutcome> {
        // Another caller may have published while we waited for the slot.
        if let Some(hit) = self.cached_hit(source, key).await? {
            return Ok(hit);
        }

        let existing = self.store.get(key).await?;
        let mut validator = match (source.validation, &existing) {
            (Validation::Validator, Some(entry)) => self.usable_validator(source, entry).await?,
            _ => None,
        };

        let mut mismatch = (String::new(), String::new());
        for attempt in 1..=INTEGRITY_ATTEMPTS {
            match self.transfer(source, validator.as_deref()).await? {
                Transfer::NotModified => {
                    if let Some(entry) = &existing {
                        debug!(key = %key, url = %source.url, "not modified");
                        let entry = self.store.refresh(entry).await?;
                        return Ok(FetchOutcome {
                            entry,
                            status: FetchStatus::NotModified,
                        });
                    }
                }
                Transfer::Body { bytes, etag } => {
                    let size = bytes.len() as u64;
                    let (actual, bytes) =
                        tokio::task::spawn_blocking(move || (sha1_hex(&bytes), bytes)).await?;

                    let hash_ok = source
                        .sha1
                        .as_deref()
                        .map_or(true, |expected| same_digest(expected, &actual));
                    let size_ok = source.size.map_or(true, |expected| expected == size);

                    if hash_ok && size_ok {
                        let validator = match source.validation {
                            Validation::Validator => etag,
                            Validation::HashOnly => None,
                        };
                        let entry = self
                            .store
                            .stage(key, bytes)
                            .await?
                            .commit(validator, actual)
                            .await?;
                        info!(key = %key, size, "downloaded {}", source.url);
                        return Ok(FetchOutcome {
                            entry,
                            status: FetchStatus::Downloaded,
                        });
                    }

                    warn!(
                        key = %key,
                        attempt,
                        expected = source.sha1.as_deref().unwrap_or("-"),
                        actual = %actual,
                        size,
                        "downloaded content failed verification"
                    );
                    mismatch = match (&source.sha1, source.size) {
                        (Some(expected), _) if !hash_ok => (expected.clone(), actual),
                        (_, Some(expected)) => (format!("{expected} bytes"), format!("{size} bytes")),
                        _ => (String::from("-"), actual),
                    };
                }
            }
            // Force a full body on the next attempt.
            validator = None;
        }

        let (expected, actual) = mismatch;
        Err(EngineError::ContentIntegrity {
            artifact: format!("{} ({})", key, source.url),
            expected,
            actual,
        })
    }

    /// The recorded validator, if the content it vouches for is still intact
    /// and still what the source describes.
    async fn usable_validator(
        &self,
        source: &RemoteSource,
        entry: &CacheEntry,
    ) -> EngineResult<Option<String>> {
        let Some(validator) = entry.validator.clone() else {
            return Ok(None);
        };
        if source
            .sha1
            .as_deref()
            .is_some_and(|expected| !same_digest(expected, &entry.sha1))
        {
            return Ok(None);
        }
        let actual = self.store.content_sha1(entry).await?;
        if !same_digest(&actual, &entry.sha1) {
            warn!(key = %entry.key, "cached content no longer matches its validator");
            return Ok(None);
        }
        Ok(Some(validator))
    }

    /// One logical transfer with bounded retries for network failures.
    async fn transfer(&self, source: &RemoteSource, validator: Option<&str>) -> EngineResult<Transfer> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt_once(source, validator).await {
                Ok(transfer) => return Ok(transfer),
                Err(EngineError::Network {
                    url,
                    status,
                    message,
                    ..
                }) => {
                    if attempt >= self.retry.max_attempts() {
                        return Err(EngineError::Network {
                            url,
                            attempts: attempt,
                            status,
                            message,
                        });
                    }
                    let delay = self.retry.backoff(attempt - 1);
                    warn!(url = %url, attempt, ?delay, "{message}, retrying");
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt_once(&self, source: &RemoteSource, validator: Option<&str>) -> EngineResult<Transfer> {
        let url = source.url.as_str();
        let mut request = self.client.get(url);
        if let Some(validator) = validator {
            request = request.header(IF_NONE_MATCH, validator);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| network_error(url, None, e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_MODIFIED && validator.is_some() {
                return Ok(Transfer::NotModified);
            }
            if !status.is_success() {
                return Err(network_error(url, Some(status.as_u16()), format!("HTTP {status}")));
            }

            let etag = response
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let bytes = response
                .bytes()
                .await
                .map_err(|e| network_error(url, Some(status.as_u16()), e.to_string()))?;
            Ok(Transfer::Body {
                bytes: bytes.to_vec(),
                etag,
            })
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            result = tokio::time::timeout(self.timeout, exchange) => match result {
                Ok(result) => result,
                Err(_) => Err(network_error(
                    url,
                    None,
                    format!("timed out after {:?}", self.timeout),
                )),
            },
        }
    }
}

fn network_error(url: &str, status: Option<u16>, message: String) -> EngineError {
    EngineError::Network {
        url: url.to_string(),
        attempts: 1,
        status,
        message,
    }
}

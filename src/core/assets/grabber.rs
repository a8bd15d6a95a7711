use std::collections::BTreeMap;
use std::path::Path;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::asset_index::{AssetIndex, AssetObject};
use crate::core::downloader::{ConditionalFetcher, FetchOutcome, FetchStatus, RemoteSource};
use crate::core::error::{EngineError, EngineResult};

/// Outcome of a batch asset download. Failures are collected, not raised.
#[derive(Debug, Default)]
pub struct AssetReport {
    /// Unique objects transferred.
    pub downloaded: usize,
    /// Unique objects already present and hash-valid.
    pub skipped: usize,
    /// One record per logical asset path whose object could not be fetched.
    pub failed: Vec<(String, EngineError)>,
}

impl AssetReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn any failure into an error, for callers that cannot tolerate gaps.
    pub fn into_strict(self) -> EngineResult<Self> {
        match self.failed.first() {
            None => Ok(self),
            Some((path, err)) => Err(EngineError::PartialAssetFailure {
                failed: self.failed.len(),
                first: format!("{path}: {err}"),
            }),
        }
    }
}

/// Downloads the objects referenced by an asset index with bounded parallelism.
pub struct AssetGrabber {
    fetcher: ConditionalFetcher,
    resources_url: String,
    concurrency: usize,
}

impl AssetGrabber {
    pub fn new(fetcher: ConditionalFetcher, resources_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            resources_url: resources_url.into(),
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Materialize every object of `index` under `dest_root/objects/<hh>/<hash>`.
    ///
    /// Objects are keyed by hash, so content shared by several logical paths
    /// is fetched once. Cancellation stops dispatch, aborts in-flight
    /// transfers and returns [`EngineError::Cancelled`].
    pub async fn grab(&self, index: &AssetIndex, dest_root: &Path) -> EngineResult<AssetReport> {
        let fetcher = self.fetcher.rooted_at(dest_root);
        let cancel = fetcher.cancellation().clone();

        let mut by_hash: BTreeMap<String, (AssetObject, Vec<String>)> = BTreeMap::new();
        for (path, obj) in &index.objects {
            by_hash
                .entry(obj.hash.to_ascii_lowercase())
                .or_insert_with(|| (obj.clone(), Vec::new()))
                .1
                .push(path.clone());
        }

        info!(
            "Grabbing {} asset objects ({} logical paths), concurrency={}",
            by_hash.len(),
            index.objects.len(),
            self.concurrency
        );

        let results: Vec<(Vec<String>, EngineResult<FetchOutcome>)> = stream::iter(by_hash.into_values())
            .take_until(cancel.cancelled())
            .map(|(obj, paths)| {
                let fetcher = &fetcher;
                async move {
                    let result = self.fetch_object(fetcher, &obj).await;
                    (paths, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            warn!("asset download cancelled");
            return Err(EngineError::Cancelled);
        }

        let mut report = AssetReport::default();
        for (paths, result) in results {
            match result {
                Ok(outcome) => match outcome.status {
                    FetchStatus::Downloaded => report.downloaded += 1,
                    FetchStatus::Cached | FetchStatus::NotModified => report.skipped += 1,
                },
                Err(e) => {
                    debug!(error = %e, "asset object failed");
                    for path in paths {
                        report.failed.push((path, e.clone()));
                    }
                }
            }
        }
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));

        if report.failed.is_empty() {
            info!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                "asset objects ready"
            );
        } else {
            warn!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                failed = report.failed.len(),
                "{} asset downloads failed",
                report.failed.len()
            );
        }
        Ok(report)
    }

    async fn fetch_object(
        &self,
        fetcher: &ConditionalFetcher,
        obj: &AssetObject,
    ) -> EngineResult<FetchOutcome> {
        let key = obj.key()?;
        let source = RemoteSource::hashed(
            obj.url(&self.resources_url),
            obj.hash.to_ascii_lowercase(),
            Some(obj.size),
        );
        fetcher.fetch(&source, &key).await
    }
}

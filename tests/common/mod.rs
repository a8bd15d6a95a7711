#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use jarsmith::core::cache::CacheStore;
use jarsmith::core::downloader::ConditionalFetcher;
use jarsmith::core::http::build_http_client;
use jarsmith::EngineConfig;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Config rooted at `root` with millisecond backoff so retry tests stay fast.
pub fn test_config(root: &Path) -> EngineConfig {
    let mut config = EngineConfig::with_cache_root(root);
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config.request_timeout_secs = 5;
    config
}

pub fn test_fetcher(root: &Path) -> ConditionalFetcher {
    fetcher_with(&test_config(root))
}

pub fn fetcher_with(config: &EngineConfig) -> ConditionalFetcher {
    let client = build_http_client(config).unwrap();
    ConditionalFetcher::new(client, CacheStore::new(&config.cache_root), config)
}

/// Write a jar at `path` containing the given files in the given order.
pub fn build_jar(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Sorted entry paths of a jar.
pub fn jar_paths(path: &Path) -> Vec<String> {
    jarsmith::core::jar::read_archive(path)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect()
}

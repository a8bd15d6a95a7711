//! Asset grabber batches against a mock resources server.

mod common;

use std::collections::{BTreeMap, HashMap};

use jarsmith::core::assets::{AssetGrabber, AssetIndex, AssetObject};
use jarsmith::core::cache::{CacheKey, CacheStore};
use jarsmith::core::digest::sha1_hex;
use jarsmith::EngineError;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::test_fetcher;

/// Serves `/<hh>/<hash>` from a fixed table; anything else is a 404.
struct ObjectResponder {
    objects: HashMap<String, Vec<u8>>,
}

impl Respond for ObjectResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match self.objects.get(request.url.path()) {
            Some(body) => ResponseTemplate::new(200).set_body_bytes(body.clone()),
            None => ResponseTemplate::new(404),
        }
    }
}

fn object_path(hash: &str) -> String {
    format!("/{}/{}", &hash[..2], hash)
}

fn index_of(objects: &[(String, Vec<u8>)]) -> AssetIndex {
    let objects: BTreeMap<String, AssetObject> = objects
        .iter()
        .map(|(name, body)| {
            (
                name.clone(),
                AssetObject {
                    hash: sha1_hex(body),
                    size: body.len() as u64,
                },
            )
        })
        .collect();
    AssetIndex {
        objects,
        is_virtual: false,
        map_to_resources: false,
    }
}

#[tokio::test]
async fn test_present_objects_are_skipped() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let assets_dir = TempDir::new().unwrap();

    let objects: Vec<(String, Vec<u8>)> = (0..100)
        .map(|i| (format!("minecraft/sounds/{i}.ogg"), format!("sound {i}").into_bytes()))
        .collect();
    let index = index_of(&objects);

    // 40 objects are already materialized and hash-valid.
    let store = CacheStore::new(assets_dir.path());
    for (_, body) in objects.iter().take(40) {
        let hash = sha1_hex(body);
        store
            .put(&CacheKey::object(&hash).unwrap(), body.clone(), None, hash)
            .await
            .unwrap();
    }

    let table = objects
        .iter()
        .map(|(_, body)| (object_path(&sha1_hex(body)), body.clone()))
        .collect();
    Mock::given(method("GET"))
        .respond_with(ObjectResponder { objects: table })
        .expect(60)
        .mount(&mock_server)
        .await;

    let grabber = AssetGrabber::new(test_fetcher(cache_dir.path()), mock_server.uri());
    let report = grabber.grab(&index, assets_dir.path()).await.unwrap();

    assert_eq!(report.downloaded, 60);
    assert_eq!(report.skipped, 40);
    assert!(report.failed.is_empty());

    for (_, body) in &objects {
        let hash = sha1_hex(body);
        let on_disk = assets_dir
            .path()
            .join("objects")
            .join(&hash[..2])
            .join(&hash);
        assert_eq!(std::fs::read(on_disk).unwrap(), *body);
    }

    mock_server.verify().await;
}

#[tokio::test]
async fn test_shared_content_is_fetched_once() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let assets_dir = TempDir::new().unwrap();

    let icon = b"icon".to_vec();
    let objects = vec![
        ("icons/icon_16x16.png".to_string(), icon.clone()),
        ("minecraft/icons/icon_16x16.png".to_string(), icon.clone()),
    ];

    Mock::given(method("GET"))
        .respond_with(ObjectResponder {
            objects: HashMap::from([(object_path(&sha1_hex(&icon)), icon)]),
        })
        .expect(1)
        .mount(&mock_server)
        .await;

    let grabber = AssetGrabber::new(test_fetcher(cache_dir.path()), mock_server.uri());
    let report = grabber
        .grab(&index_of(&objects), assets_dir.path())
        .await
        .unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.skipped, 0);

    mock_server.verify().await;
}

#[tokio::test]
async fn test_failures_are_collected_per_logical_path() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let assets_dir = TempDir::new().unwrap();

    let good = b"present".to_vec();
    let missing = b"missing upstream".to_vec();
    let objects = vec![
        ("a/good.json".to_string(), good.clone()),
        ("b/missing.ogg".to_string(), missing.clone()),
        ("c/missing-alias.ogg".to_string(), missing),
    ];

    Mock::given(method("GET"))
        .respond_with(ObjectResponder {
            objects: HashMap::from([(object_path(&sha1_hex(&good)), good)]),
        })
        .mount(&mock_server)
        .await;

    let grabber = AssetGrabber::new(test_fetcher(cache_dir.path()), mock_server.uri())
        .with_concurrency(2);
    let report = grabber
        .grab(&index_of(&objects), assets_dir.path())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    let failed: Vec<_> = report.failed.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(failed, vec!["b/missing.ogg", "c/missing-alias.ogg"]);
    assert!(matches!(
        report.failed[0].1,
        EngineError::Network {
            status: Some(404),
            ..
        }
    ));

    assert!(matches!(
        report.into_strict(),
        Err(EngineError::PartialAssetFailure { failed: 2, .. })
    ));
}

#[tokio::test]
async fn test_cancelled_batch_reports_cancellation() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let assets_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(cache_dir.path());
    fetcher.cancellation().cancel();
    let grabber = AssetGrabber::new(fetcher, mock_server.uri());

    let objects = vec![("x".to_string(), b"x".to_vec())];
    let err = grabber
        .grab(&index_of(&objects), assets_dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));

    mock_server.verify().await;
}

//! Version resolution and the full prepare → merge → split flow through `Engine`.

mod common;

use jarsmith::core::digest::sha1_hex;
use jarsmith::core::jar::{ProvenanceManifest, ServerAllowList};
use jarsmith::{ConflictStrategy, Engine, EngineError, MergePolicy, OriginTag};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{build_jar, jar_paths, test_config};

struct Upstream {
    client_jar: Vec<u8>,
    server_jar: Vec<u8>,
}

fn sample_jars(dir: &std::path::Path) -> Upstream {
    let client = dir.join("upstream-client.jar");
    let server = dir.join("upstream-server.jar");
    build_jar(
        &client,
        &[
            ("net/minecraft/client/Main.class", b"client main"),
            ("net/minecraft/world/Block.class", b"shared block"),
            ("assets/minecraft/lang/en_us.json", b"{}"),
        ],
    );
    build_jar(
        &server,
        &[
            ("net/minecraft/world/Block.class", b"shared block"),
            ("net/minecraft/server/Main.class", b"server main"),
            ("io/netty/Channel.class", b"bundled library"),
            ("version.json", b"{\"id\":\"1.20.1\"}"),
        ],
    );
    Upstream {
        client_jar: std::fs::read(client).unwrap(),
        server_jar: std::fs::read(server).unwrap(),
    }
}

/// Mount a catalog listing 1.20.1 (plus a broken 1.0) and everything it references.
async fn mount_upstream(mock_server: &MockServer, upstream: &Upstream) {
    let base = mock_server.uri();
    let icon = b"icon bytes".to_vec();
    let icon_hash = sha1_hex(&icon);

    let asset_index = serde_json::to_vec(&json!({
        "objects": {
            "icons/icon_16x16.png": { "hash": icon_hash, "size": icon.len() },
            "minecraft/icons/icon_16x16.png": { "hash": icon_hash, "size": icon.len() }
        }
    }))
    .unwrap();

    let metadata = serde_json::to_vec(&json!({
        "id": "1.20.1",
        "assetIndex": {
            "id": "5",
            "sha1": sha1_hex(&asset_index),
            "size": asset_index.len(),
            "url": format!("{base}/indexes/5.json")
        },
        "downloads": {
            "client": {
                "sha1": sha1_hex(&upstream.client_jar),
                "size": upstream.client_jar.len(),
                "url": format!("{base}/client.jar")
            },
            "server": {
                "sha1": sha1_hex(&upstream.server_jar),
                "size": upstream.server_jar.len(),
                "url": format!("{base}/server.jar")
            }
        }
    }))
    .unwrap();

    let broken = serde_json::to_vec(&json!({
        "id": "1.0",
        "downloads": { "client": { "url": format!("{base}/old.jar"), "size": 1 } }
    }))
    .unwrap();

    let catalog = json!({
        "latest": { "release": "1.20.1", "snapshot": "1.20.1" },
        "versions": [
            {
                "id": "1.20.1",
                "type": "release",
                "url": format!("{base}/v1/1.20.1.json"),
                "time": "2023-06-12T13:25:51+00:00",
                "releaseTime": "2023-06-12T13:25:51+00:00",
                "sha1": sha1_hex(&metadata)
            },
            {
                "id": "1.0",
                "type": "release",
                "url": format!("{base}/v1/1.0.json"),
                "time": "2011-11-17T22:00:00+00:00",
                "releaseTime": "2011-11-17T22:00:00+00:00"
            }
        ]
    });

    let routes: Vec<(&str, Vec<u8>)> = vec![
        ("/mc/version_manifest_v2.json", serde_json::to_vec(&catalog).unwrap()),
        ("/v1/1.20.1.json", metadata),
        ("/v1/1.0.json", broken),
        ("/indexes/5.json", asset_index),
        ("/client.jar", upstream.client_jar.clone()),
        ("/server.jar", upstream.server_jar.clone()),
    ];

    for (route, body) in routes {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(mock_server)
            .await;
    }

    let icon_route = format!("/resources/{}/{}", &icon_hash[..2], icon_hash);
    Mock::given(method("GET"))
        .and(path(icon_route.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(icon))
        .mount(mock_server)
        .await;
}

fn engine_for(mock_server: &MockServer, cache_root: &std::path::Path) -> Engine {
    let mut config = test_config(cache_root);
    config.version_manifest_url = format!("{}/mc/version_manifest_v2.json", mock_server.uri());
    config.resources_url = format!("{}/resources", mock_server.uri());
    Engine::new(config).unwrap()
}

#[tokio::test]
async fn test_unknown_version_is_fatal() {
    let mock_server = MockServer::start().await;
    let scratch = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    mount_upstream(&mock_server, &sample_jars(scratch.path())).await;

    let engine = engine_for(&mock_server, cache.path());
    match engine.resolve_version("9.9.9").await.unwrap_err() {
        EngineError::UnknownVersion(id) => assert_eq!(id, "9.9.9"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_metadata_names_the_field() {
    let mock_server = MockServer::start().await;
    let scratch = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    mount_upstream(&mock_server, &sample_jars(scratch.path())).await;

    let engine = engine_for(&mock_server, cache.path());
    match engine.resolve_version("1.0").await.unwrap_err() {
        EngineError::MalformedMetadata { field, .. } => {
            assert_eq!(field, "downloads.client.sha1")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_latest_release_resolves() {
    let mock_server = MockServer::start().await;
    let scratch = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    mount_upstream(&mock_server, &sample_jars(scratch.path())).await;

    let engine = engine_for(&mock_server, cache.path());
    let metadata = engine.latest_release().await.unwrap();
    assert_eq!(metadata.id, "1.20.1");
    assert_eq!(metadata.asset_index.id, "5");
    assert!(cache
        .path()
        .join("versions/1.20.1/1.20.1.json")
        .exists());
}

#[tokio::test]
async fn test_prepare_merge_and_split() {
    let mock_server = MockServer::start().await;
    let scratch = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let upstream = sample_jars(scratch.path());
    mount_upstream(&mock_server, &upstream).await;

    let engine = engine_for(&mock_server, cache.path());
    let prepared = engine.prepare_version("1.20.1").await.unwrap();
    let server = prepared.server.as_ref().unwrap();
    assert_eq!(std::fs::read(prepared.client.path()).unwrap(), upstream.client_jar);
    assert_eq!(std::fs::read(server.path()).unwrap(), upstream.server_jar);

    let report = engine
        .grab_assets(&prepared.asset_index, &engine.assets_root())
        .await
        .unwrap();
    assert_eq!(report.downloaded, 1);
    assert!(report.is_complete());

    let combined = scratch.path().join("out/merged.jar");
    let merged = engine
        .merge_jars(
            prepared.client.path(),
            server.path(),
            MergePolicy::new(ConflictStrategy::FailOnDifference),
            &combined,
        )
        .await
        .unwrap();
    assert_eq!(merged.stats.common, 1);
    assert_eq!(
        merged.provenance.origin("net/minecraft/world/Block.class"),
        Some(OriginTag::Common)
    );
    assert_eq!(
        merged.provenance.origin("io/netty/Channel.class"),
        Some(OriginTag::ServerOnly)
    );

    let provenance = ProvenanceManifest::load(&merged.provenance_path).unwrap();
    let split = engine
        .split_jars(
            &combined,
            &provenance,
            &scratch.path().join("out/client.jar"),
            &scratch.path().join("out/server.jar"),
        )
        .await
        .unwrap();
    assert_eq!(jar_paths(&split.client), jar_paths(prepared.client.path()));
    assert_eq!(jar_paths(&split.server), jar_paths(server.path()));

    let slim = engine
        .extract_server_classes(
            server.path(),
            &ServerAllowList::default(),
            &scratch.path().join("out/server-slim.jar"),
        )
        .await
        .unwrap();
    assert_eq!(
        jar_paths(&slim),
        vec![
            "net/minecraft/server/Main.class",
            "net/minecraft/world/Block.class",
            "version.json"
        ]
    );

    mock_server.verify().await;
}

#[tokio::test]
async fn test_clear_cache_removes_everything() {
    let mock_server = MockServer::start().await;
    let scratch = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    mount_upstream(&mock_server, &sample_jars(scratch.path())).await;

    let engine = engine_for(&mock_server, cache.path());
    engine.resolve_version("1.20.1").await.unwrap();
    assert!(engine.store().root().exists());

    engine.clear_cache().await.unwrap();
    assert!(!engine.store().root().exists());
}

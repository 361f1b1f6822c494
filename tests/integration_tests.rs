//! Integration tests for the HTTP server over a file-backed cache.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use kv_shard_cache::config::Config;
use kv_shard_cache::server::{build_router, AppState};
use kv_shard_cache::{CacheBuilder, FileGateway, Gateway};

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn start_server(seed: &[(&str, &str)]) -> TestServer {
    let dir = TempDir::new().unwrap();
    let gateway = FileGateway::new(dir.path()).await.unwrap();
    for (key, value) in seed {
        gateway
            .persist(&key.to_string(), &value.to_string(), 0)
            .await
            .unwrap();
    }

    let cache = CacheBuilder::<String, String>::new()
        .maximum_size(16)
        .pool_size(2)
        .gateway(gateway)
        .build()
        .await
        .unwrap();

    let state = Arc::new(AppState {
        cache,
        config: Arc::new(Config::default()),
        start_time: Instant::now(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    TestServer {
        addr,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_get_loads_from_backing_store() {
    let server = start_server(&[("SDE", "Ram")]).await;

    let resp = server.client.get(server.url("/v1/cache/SDE")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "key": "SDE", "value": "Ram" }));
}

#[tokio::test]
async fn test_missing_key_is_not_found() {
    let server = start_server(&[]).await;

    let resp = server.client.get(server.url("/v1/cache/CEO")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("backing store"));
}

#[tokio::test]
async fn test_put_then_get_and_event_log() {
    let server = start_server(&[("SDE", "Ram")]).await;

    server.client.get(server.url("/v1/cache/SDE")).send().await.unwrap();
    let resp = server
        .client
        .put(server.url("/v1/cache/SDE"))
        .json(&json!({ "value": "Pavan" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let body: Value = server
        .client
        .get(server.url("/v1/cache/SDE"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["value"], "Pavan");

    let events: Vec<Value> = server
        .client
        .get(server.url("/v1/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["load", "update", "write"]);
    assert_eq!(events[1]["previous"]["value"], "Ram");
}

#[tokio::test]
async fn test_stats_health_and_metrics() {
    let server = start_server(&[("PMA", "Shyam")]).await;
    server.client.get(server.url("/v1/cache/PMA")).send().await.unwrap();
    server.client.get(server.url("/v1/cache/PMA")).send().await.unwrap();

    let stats: Value = server
        .client
        .get(server.url("/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["size"], 1);
    assert_eq!(stats["maximum_size"], 16);
    assert_eq!(stats["shards"], 2);
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);

    let health: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let metrics = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("cache_hits_total 1"));
}

//! Integration tests for the admin API, served on a local port.

use std::net::SocketAddr;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;

use channel_router::admin::{setup_admin_router, AdminState};
use channel_router::AllocateOptions;

mod common;

use common::{channel, fixture, quarantine, Fixture};

const KEY: &str = "test-admin-key";

/// Serve the admin router for `f` and return its address.
async fn start_admin_server(f: &Fixture) -> SocketAddr {
    let app = setup_admin_router(AdminState::new(f.scheduler.clone(), KEY));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn call(addr: SocketAddr, method: Method, path: &str, key: Option<&str>) -> (StatusCode, Value) {
    let mut request = reqwest::Client::new().request(method, format!("http://{}{}", addr, path));
    if let Some(key) = key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await.unwrap();

    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let f = fixture("claude", vec![channel("a")]);
    let addr = start_admin_server(&f).await;

    let (status, _) = call(addr, Method::GET, "/admin/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(addr, Method::GET, "/admin/status", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, body) = call(addr, Method::GET, "/admin/status", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["scopes"], serde_json::json!(["claude"]));
}

#[tokio::test]
async fn test_scope_state() {
    let f = fixture(
        "claude",
        vec![
            channel("a")
                .with_weight(3)
                .with_max_concurrency(2)
                .with_credential("sk-secret"),
            channel("b"),
        ],
    );
    f.scheduler
        .allocate("claude", AllocateOptions::for_session("s1"))
        .await
        .unwrap();
    let addr = start_admin_server(&f).await;

    let (status, body) = call(addr, Method::GET, "/admin/scopes/claude", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], 0);
    assert_eq!(body["bindings"], 1);

    let channels = body["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0]["id"], "a");
    assert_eq!(channels[0]["weight"], 3);
    assert_eq!(channels[0]["max_concurrency"], 2);
    assert_eq!(channels[1]["max_concurrency"], Value::Null);
    assert_eq!(channels[0]["health"]["status"], "healthy");

    let total: u64 = channels
        .iter()
        .map(|c| c["in_flight"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 1);
    assert!(!body.to_string().contains("sk-secret"));
}

#[tokio::test]
async fn test_channel_health_and_reset() {
    let f = fixture("codex", vec![channel("a")]);
    quarantine(&f.health, "codex", "a");
    let addr = start_admin_server(&f).await;

    let path = "/admin/scopes/codex/channels/a/health";
    let (status, body) = call(addr, Method::GET, path, Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["health"]["status"], "quarantined");
    assert_eq!(body["health"]["consecutive_failures"], 3);
    assert!(body["health"]["quarantine_remaining_secs"].as_u64().unwrap() > 50);

    let reset = format!("{}/reset", path);
    let (status, body) = call(addr, Method::POST, &reset, Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["health"]["status"], "healthy");
    assert_eq!(body["health"]["next_quarantine_secs"], 60);
    assert_eq!(body["health"]["total_failures"], 3);
    assert!(f.health.is_available("codex", "a"));
}

#[tokio::test]
async fn test_unknown_channel_is_not_found() {
    let f = fixture("codex", vec![channel("a")]);
    let addr = start_admin_server(&f).await;

    let (status, body) = call(
        addr,
        Method::POST,
        "/admin/scopes/codex/channels/missing/health/reset",
        Some(KEY),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
    assert!(f.health.all_statuses("codex").is_empty());
}

#[tokio::test]
async fn test_disabled_channel_is_not_found() {
    let f = fixture("codex", vec![channel("a"), channel("b").disabled()]);
    let addr = start_admin_server(&f).await;

    let (status, _) = call(
        addr,
        Method::POST,
        "/admin/scopes/codex/channels/b/health/reset",
        Some(KEY),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(f.health.all_statuses("codex").is_empty());
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use parking_lot::RwLock;
use serde_json::Value;
use tower::ServiceExt;

use meshwarden_config::ServerConfig;
use meshwarden_core::{ClientRegistry, Metrics, PingScheduler, ShutdownHandle, WorkerPool};
use meshwarden_server::AppState;

fn test_state(config: ServerConfig) -> AppState {
    let (shutdown, shutdown_rx) = ShutdownHandle::new();
    AppState {
        config: Arc::new(RwLock::new(config)),
        registry: ClientRegistry::new(),
        scheduler: PingScheduler::new(60.0),
        worker_pool: WorkerPool::new(4),
        metrics: Arc::new(Metrics::new()),
        shutdown,
        shutdown_rx,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_always_returns_200() {
    let app = meshwarden_server::build_router(test_state(ServerConfig::default()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn auth_disabled_allows_unauthenticated_requests() {
    let mut config = ServerConfig::default();
    config.enable_api_auth = false;
    let app = meshwarden_server::build_router(test_state(config));
    let response = app
        .oneshot(Request::builder().uri("/clients").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_enabled_rejects_missing_token() {
    let mut config = ServerConfig::default();
    config.enable_api_auth = true;
    config.api_key = Some("secret".to_string());
    let app = meshwarden_server::build_router(test_state(config));
    let response = app
        .oneshot(Request::builder().uri("/clients").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_enabled_rejects_wrong_token() {
    let mut config = ServerConfig::default();
    config.enable_api_auth = true;
    config.api_key = Some("secret".to_string());
    let app = meshwarden_server::build_router(test_state(config));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/clients")
                .header("Authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn auth_enabled_accepts_correct_token() {
    let mut config = ServerConfig::default();
    config.enable_api_auth = true;
    config.api_key = Some("secret".to_string());
    let app = meshwarden_server::build_router(test_state(config));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/clients")
                .header("Authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_bypasses_auth() {
    let mut config = ServerConfig::default();
    config.enable_api_auth = true;
    config.api_key = Some("secret".to_string());
    let app = meshwarden_server::build_router(test_state(config));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn remember_rejects_empty_ip_list() {
    let app = meshwarden_server::build_router(test_state(ServerConfig::default()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients/remember")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"ips":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn remember_accepts_valid_addresses() {
    let state = test_state(ServerConfig::default());
    let registry = state.registry.clone();
    let app = meshwarden_server::build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients/remember")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"ips":["10.1.2.3"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(registry.size(), 1);
}

#[tokio::test]
async fn remember_rejects_batch_that_is_entirely_invalid() {
    let app = meshwarden_server::build_router(test_state(ServerConfig::default()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients/remember")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"ips":["not-an-ip"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

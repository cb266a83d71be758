//! Integration tests for the hookforge HTTP surface
//!
//! These tests verify that the router responds to the operations endpoints.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use hookforge::{
    api::{server::create_router, AppState, HealthState, HealthStatus},
    config::{Config, ProcessingConfig, ServerConfig},
    kafka::{KafkaConfig, MessageProcessor},
    models::Normalizer,
    stats::ProcessingStats,
    test_utils::{delivery, sample_body, MemorySink},
};
use tower::ServiceExt;

/// Create a test configuration
fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "debug".to_string(),
            environment: "test".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            http_enabled: true,
        },
        kafka: KafkaConfig {
            consumer_group: "test-consumer".to_string(),
            input_topic: "test-github".to_string(),
            ..KafkaConfig::default()
        },
        processing: ProcessingConfig {
            worker_concurrency: 2,
            ..ProcessingConfig::default()
        },
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = create_router(create_test_config(), AppState::default());

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_reflects_component_health() {
    let state = AppState::default();
    let app = create_router(create_test_config(), state.clone());

    state
        .health
        .update_component("kafka", HealthStatus::Healthy, Some("subscribed".to_string()))
        .await;
    let response = app.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["checks"]["kafka"]["status"], "healthy");

    state
        .health
        .update_component("kafka", HealthStatus::Unhealthy, Some("stream ended".to_string()))
        .await;
    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_build_endpoint_returns_version() {
    let app = create_router(create_test_config(), AppState::default());

    let response = app.oneshot(get("/build")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_endpoint_reports_processing() {
    let stats = Arc::new(ProcessingStats::new());
    let state = AppState::new(Arc::new(HealthState::new()), stats.clone());
    let app = create_router(create_test_config(), state);

    let processor = MessageProcessor::new(Normalizer::default(), Arc::new(MemorySink::new()), stats);
    let payload = delivery("push", &sample_body("push").unwrap());
    processor.process_payload(Some(payload.as_slice())).await;
    processor.process_payload(None).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("hookforge_messages_received_total 2"));
    assert!(text.contains("hookforge_messages_total{outcome=\"normalized\"} 1"));
    assert!(text.contains("hookforge_messages_total{outcome=\"skipped\"} 1"));
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let app = create_router(create_test_config(), AppState::default());

    let response = app.oneshot(get("/healthz")).await.unwrap();
    let request_id = response.headers().get("x-request-id").unwrap();
    assert!(!request_id.is_empty());
}

#[tokio::test]
async fn test_supplied_request_id_is_propagated() {
    let app = create_router(create_test_config(), AppState::default());

    let request = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = create_router(create_test_config(), AppState::default());

    let response = app.oneshot(get("/nonexistent")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

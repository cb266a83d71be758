//! Health, build and metrics endpoints for hookforge

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::api::{
    AppState, ComponentHealth, HealthResponse, HealthStatus, ReadyResponse, BUILD_INFO,
};

/// Registry of component health, written by workers and read by `/readyz`
#[derive(Debug, Default)]
pub struct HealthState {
    components: RwLock<HashMap<String, ComponentHealth>>,
}

impl HealthState {
    /// Create a new health state
    pub fn new() -> Self {
        Self::default()
    }

    /// Update component health status
    pub async fn update_component(
        &self,
        name: &str,
        status: HealthStatus,
        message: Option<String>,
    ) {
        let mut components = self.components.write().await;
        components.insert(
            name.to_string(),
            ComponentHealth {
                status,
                message,
                last_check: Utc::now(),
            },
        );
    }

    /// Snapshot of every registered component
    pub async fn components(&self) -> HashMap<String, ComponentHealth> {
        self.components.read().await.clone()
    }

    /// Get overall health status
    pub async fn get_status(&self) -> HealthStatus {
        let components = self.components.read().await;

        if components.values().any(|c| c.status == HealthStatus::Unhealthy) {
            return HealthStatus::Unhealthy;
        }

        if components.values().any(|c| c.status == HealthStatus::Degraded) {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }
}

/// Basic liveness check endpoint
///
/// Returns 200 OK while the process is up. Does not look at the broker.
pub async fn health_check() -> Response {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Service is running".to_string()),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Readiness check endpoint
///
/// 503 while any registered component is unhealthy.
pub async fn ready_check(State(state): State<AppState>) -> Response {
    let checks = state.health.components().await;
    let status = state.health.get_status().await;

    let response = ReadyResponse {
        status,
        checks,
        timestamp: Utc::now(),
    };

    (status.to_status_code(), Json(response)).into_response()
}

/// Build information endpoint
pub async fn build_info() -> Response {
    (StatusCode::OK, Json(&BUILD_INFO)).into_response()
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.stats.render_prometheus(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_state() {
        let state = HealthState::new();

        // Initially healthy
        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        state.update_component("kafka", HealthStatus::Healthy, None).await;
        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        state
            .update_component("sink", HealthStatus::Degraded, Some("slow".to_string()))
            .await;
        assert_eq!(state.get_status().await, HealthStatus::Degraded);

        state
            .update_component(
                "kafka",
                HealthStatus::Unhealthy,
                Some("stream ended".to_string()),
            )
            .await;
        assert_eq!(state.get_status().await, HealthStatus::Unhealthy);
        assert_eq!(state.components().await.len(), 2);
    }

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let response = health_check().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_check_endpoint() {
        let state = AppState::default();
        state
            .health
            .update_component("kafka", HealthStatus::Healthy, Some("subscribed".to_string()))
            .await;

        let response = ready_check(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        state
            .health
            .update_component("kafka", HealthStatus::Unhealthy, None)
            .await;
        let response = ready_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = AppState::new(Arc::new(HealthState::new()), Default::default());
        let response = metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_build_info_endpoint() {
        let response = build_info().await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

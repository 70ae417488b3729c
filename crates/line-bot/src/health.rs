//! Health check and metrics endpoints

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub store_connected: bool,
}

/// Metrics data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub events_received: u64,
    pub replies_sent: u64,
    pub commands_processed: u64,
    pub completions: u64,
    pub errors: u64,
}

/// Shared application health state
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<RwLock<Metrics>>,
    pub start_time: SystemTime,
    pub store_connected: Arc<RwLock<bool>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(Metrics {
                events_received: 0,
                replies_sent: 0,
                commands_processed: 0,
                completions: 0,
                errors: 0,
            })),
            start_time: SystemTime::now(),
            store_connected: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn increment_events_received(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.events_received += 1;
    }

    pub async fn increment_replies_sent(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.replies_sent += 1;
    }

    pub async fn increment_commands(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.commands_processed += 1;
    }

    pub async fn increment_completions(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.completions += 1;
    }

    pub async fn increment_errors(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.errors += 1;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check endpoint handler
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let uptime = state.start_time.elapsed().unwrap_or_default().as_secs();
    let store_connected = *state.store_connected.read().await;

    let (status_code, status) = if store_connected {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthStatus {
            status: status.to_string(),
            uptime_seconds: uptime,
            store_connected,
        }),
    )
}

/// Metrics endpoint handler
async fn metrics_handler(State(state): State<AppState>) -> Json<Metrics> {
    let metrics = state.metrics.read().await;
    Json(metrics.clone())
}

/// Readiness check (ready to accept traffic)
async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    if *state.store_connected.read().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check (process is alive)
async fn live_handler() -> StatusCode {
    StatusCode::OK
}

/// Create the health check router
pub fn create_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_start_at_zero() {
        let state = AppState::new();
        let metrics = state.metrics.read().await;
        assert_eq!(metrics.events_received, 0);
        assert_eq!(metrics.errors, 0);
    }

    #[tokio::test]
    async fn counters_increment() {
        let state = AppState::new();
        state.increment_events_received().await;
        state.increment_events_received().await;
        state.increment_commands().await;
        let metrics = state.metrics.read().await;
        assert_eq!(metrics.events_received, 2);
        assert_eq!(metrics.commands_processed, 1);
        assert_eq!(metrics.replies_sent, 0);
    }

    #[tokio::test]
    async fn store_starts_disconnected() {
        let state = AppState::new();
        assert!(!*state.store_connected.read().await);
    }
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pairup_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::store::Store;
use crate::AppState;

/// Health check that probes the backing store.
pub async fn health_check<S: Store>(State(state): State<Arc<AppState<S>>>) -> Response {
    let check = match state.swipes.ping() {
        Ok(()) => HealthCheck {
            name: "store".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => HealthCheck {
            name: "store".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
        },
    };

    let response = HealthResponse::healthy("pairup-swipe", env!("CARGO_PKG_VERSION")).with_checks(vec![check]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics<S: Store>(State(state): State<Arc<AppState<S>>>) -> String {
    state.metrics_handle.render()
}

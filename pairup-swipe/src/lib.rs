pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::AppConfig;
use services::swipe_service::SwipeService;
use services::throttle::RegistrationThrottle;
use store::Store;

pub struct AppState<S: Store> {
    pub config: AppConfig,
    pub swipes: SwipeService<S>,
    pub throttle: Arc<RegistrationThrottle>,
    pub metrics_handle: PrometheusHandle,
}

pub fn router<S: Store>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check::<S>))
        .route("/metrics", get(routes::health::metrics::<S>))
        .route("/me", get(routes::identities::get_me::<S>))
        .route("/me/visibility", put(routes::identities::update_visibility::<S>))
        .route("/recommendations", get(routes::swipes::recommendations::<S>))
        .route("/swipes/:handle", post(routes::swipes::swipe::<S>))
        .route("/skips", get(routes::swipes::list_skipped::<S>))
        .route("/skips/:handle", delete(routes::swipes::unskip::<S>))
        .route("/matches", get(routes::swipes::list_matches::<S>))
        // Called by the verification service, not by end users
        .route("/internal/identities", post(routes::internal::register_identity::<S>))
        .route("/internal/identities/:handle", get(routes::internal::get_identity::<S>))
        .layer(axum::middleware::from_fn(pairup_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

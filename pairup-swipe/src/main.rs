use std::net::SocketAddr;
use std::sync::Arc;

use pairup_swipe::config::{AppConfig, StoreKind};
use pairup_swipe::services::swipe_service::{SwipeLimits, SwipeService};
use pairup_swipe::services::throttle::{self, RegistrationThrottle};
use pairup_swipe::store::{MemoryStore, PgStore, Store};
use pairup_swipe::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pairup_shared::middleware::init_tracing("pairup-swipe");

    let config = AppConfig::load()?;

    // The bearer extractor reads the secret from the environment
    if std::env::var("JWT_SECRET").is_err() {
        std::env::set_var("JWT_SECRET", &config.jwt_secret);
    }

    let metrics_handle = pairup_shared::middleware::init_metrics()?;

    match config.store {
        StoreKind::Postgres => {
            let store = PgStore::connect(&config.database_url, config.db_pool_size)?;
            tracing::info!(pool_size = config.db_pool_size, "connected to Postgres");
            serve(config, store, metrics_handle).await
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store, nothing will be persisted");
            serve(config, MemoryStore::new(), metrics_handle).await
        }
    }
}

async fn serve<S: Store>(
    config: AppConfig,
    store: S,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> anyhow::Result<()> {
    let port = config.port;
    let throttle = Arc::new(RegistrationThrottle::new(config.registration_interval()));
    let _eviction = throttle::spawn_eviction(throttle.clone());

    let state = Arc::new(AppState {
        swipes: SwipeService::new(store, SwipeLimits::from(&config)),
        throttle,
        metrics_handle,
        config,
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "pairup-swipe starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use pairup_shared::types::auth::{jwt_secret_from_env, Claims};

use crate::config::{AppConfig, StoreKind};
use crate::models::NewIdentity;
use crate::services::swipe_service::{SwipeLimits, SwipeService};
use crate::services::throttle::RegistrationThrottle;
use crate::store::MemoryStore;
use crate::{router, AppState};

pub(crate) type TestState = Arc<AppState<MemoryStore>>;

/// Router over a memory store with `handles` already registered.
pub(crate) fn test_app(handles: &[&str]) -> (Router, TestState) {
    let config = AppConfig {
        store: StoreKind::Memory,
        ..AppConfig::default()
    };
    let swipes = SwipeService::with_rng(MemoryStore::new(), SwipeLimits::from(&config), StdRng::seed_from_u64(3));
    for (i, handle) in handles.iter().enumerate() {
        swipes
            .register(NewIdentity {
                handle: handle.to_string(),
                pid: 1_000 + i as i64,
                contact_code: String::new(),
                credential_hash: "f".repeat(64),
            })
            .unwrap();
    }

    let state = Arc::new(AppState {
        throttle: Arc::new(RegistrationThrottle::new(Duration::from_secs(60))),
        metrics_handle: PrometheusBuilder::new().build_recorder().handle(),
        swipes,
        config,
    });
    (router(state.clone()), state)
}

pub(crate) fn token(handle: &str) -> String {
    let claims = Claims::new(handle, 600);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret_from_env().as_bytes()),
    )
    .unwrap()
}

pub(crate) fn request(method: Method, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(handle) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(handle)));
    }
    builder.body(Body::empty()).unwrap()
}

pub(crate) fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, auth)
}

pub(crate) fn json_request(method: Method, uri: &str, auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(handle) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(handle)));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Attaches the peer address the server would see.
pub(crate) fn from_addr(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    let addr = SocketAddr::from((Ipv4Addr::from(ip), 40_000));
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub(crate) async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

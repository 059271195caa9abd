use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use pairup_shared::errors::{AppError, AppResult, ErrorCode};
use pairup_shared::types::ApiResponse;

use crate::models::{Identity, NewIdentity};
use crate::store::Store;
use crate::AppState;

// --- POST /internal/identities ---

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterIdentityRequest {
    #[validate(length(min = 1, max = 32, message = "handle must be 1-32 characters"))]
    pub handle: String,
    pub pid: i64,
    #[serde(default)]
    #[validate(length(max = 32, message = "contact code must be at most 32 characters"))]
    pub contact_code: String,
    /// Hex-encoded SHA-256.
    #[validate(
        length(equal = 64, message = "credential hash must be 64 hex characters"),
        custom = "validate_hex"
    )]
    pub credential_hash: String,
}

fn validate_hex(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(());
    }
    let mut err = ValidationError::new("hex");
    err.message = Some("credential hash must be 64 hex characters".into());
    Err(err)
}

/// Registers an identity once the verification collaborator has confirmed it.
/// One attempt per client address per registration interval.
pub async fn register_identity<S: Store>(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterIdentityRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Identity>>)> {
    if let Err(wait) = state.throttle.check(addr.ip()) {
        tracing::warn!(ip = %addr.ip(), retry_after_secs = wait.as_secs(), "registration throttled");
        return Err(AppError::with_details(
            ErrorCode::RateLimited,
            "try again later",
            serde_json::json!({ "retry_after_secs": wait.as_secs().max(1) }),
        ));
    }

    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let identity = state.swipes.register(NewIdentity {
        handle: req.handle,
        pid: req.pid,
        contact_code: req.contact_code,
        credential_hash: req.credential_hash.to_lowercase(),
    })?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(identity))))
}

// --- GET /internal/identities/:handle ---

/// Identity as the session layer sees it, credential hash included so it can
/// check a login.
#[derive(Debug, Serialize)]
pub struct IdentityRecord {
    #[serde(flatten)]
    pub identity: Identity,
    pub credential_hash: String,
}

impl From<Identity> for IdentityRecord {
    fn from(identity: Identity) -> Self {
        Self {
            credential_hash: identity.credential_hash.clone(),
            identity,
        }
    }
}

pub async fn get_identity<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(handle): Path<String>,
) -> AppResult<Json<ApiResponse<IdentityRecord>>> {
    let identity = state
        .swipes
        .find_by_handle(&handle)?
        .ok_or_else(|| AppError::new(ErrorCode::IdentityNotFound, format!("identity '{handle}' not found")))?;

    Ok(Json(ApiResponse::ok(IdentityRecord::from(identity))))
}

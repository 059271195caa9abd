use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use pairup_shared::errors::{AppError, AppResult, ErrorCode};
use pairup_shared::types::auth::AuthUser;
use pairup_shared::types::ApiResponse;

use crate::models::Identity;
use crate::store::Store;
use crate::AppState;

fn identity_not_found(handle: &str) -> AppError {
    AppError::new(ErrorCode::IdentityNotFound, format!("identity '{handle}' not found"))
}

// --- GET /me ---

pub async fn get_me<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<ApiResponse<Identity>>> {
    let identity = state
        .swipes
        .find_by_handle(&user.handle)?
        .ok_or_else(|| identity_not_found(&user.handle))?;

    Ok(Json(ApiResponse::ok(identity)))
}

// --- PUT /me/visibility ---

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

pub async fn update_visibility<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<VisibilityRequest>,
) -> AppResult<Json<ApiResponse<Identity>>> {
    state.swipes.set_visibility(&user.handle, req.visible)?;

    let identity = state
        .swipes
        .find_by_handle(&user.handle)?
        .ok_or_else(|| identity_not_found(&user.handle))?;

    Ok(Json(ApiResponse::ok(identity)))
}

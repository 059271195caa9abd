use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pairup_shared::errors::AppResult;
use pairup_shared::types::auth::AuthUser;
use pairup_shared::types::ApiResponse;

use crate::models::Identity;
use crate::services::match_detector::{Decision, Outcome, UnskipOutcome};
use crate::store::Store;
use crate::AppState;

// --- GET /recommendations ---

/// The next batch in card-stack order: the top card is the last element.
pub async fn recommendations<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<ApiResponse<Vec<Identity>>>> {
    let batch = state.swipes.recommend(&user.handle)?;
    tracing::debug!(requester = %user.handle, count = batch.candidates.len(), reciprocal = batch.reciprocal, "recommendations built");
    Ok(Json(ApiResponse::ok(batch.presentation_order())))
}

// --- POST /swipes/:handle ---

#[derive(Debug, Deserialize)]
pub struct SwipeRequest {
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    pub target: String,
    pub outcome: Outcome,
}

pub async fn swipe<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
    Path(target): Path<String>,
    Json(req): Json<SwipeRequest>,
) -> AppResult<Json<ApiResponse<SwipeResponse>>> {
    let outcome = state.swipes.evaluate(&user.handle, &target, req.decision)?;
    Ok(Json(ApiResponse::ok(SwipeResponse { target, outcome })))
}

// --- DELETE /skips/:handle ---

#[derive(Debug, Serialize)]
pub struct UnskipResponse {
    pub unskipped: bool,
}

pub async fn unskip<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
    Path(target): Path<String>,
) -> AppResult<Json<ApiResponse<UnskipResponse>>> {
    let outcome = state.swipes.unskip(&user.handle, &target)?;
    Ok(Json(ApiResponse::ok(UnskipResponse {
        unskipped: outcome == UnskipOutcome::Ok,
    })))
}

// --- GET /skips ---

pub async fn list_skipped<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<ApiResponse<Vec<Identity>>>> {
    let skipped = state.swipes.list_skipped(&user.handle)?;
    Ok(Json(ApiResponse::ok(skipped)))
}

// --- GET /matches ---

pub async fn list_matches<S: Store>(
    user: AuthUser,
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<ApiResponse<Vec<Identity>>>> {
    let matches = state.swipes.list_matches(&user.handle)?;
    Ok(Json(ApiResponse::ok(matches)))
}

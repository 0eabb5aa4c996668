//! Switch and quota handlers

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use wavecache_api_types::{QuotaRequest, QuotaResponse, SwitchResponse};

use crate::domain::types::SwitchKind;
use crate::infra::http::error::{ApiError, repo_error_to_api};
use crate::infra::http::state::ApiState;

async fn set_switch(
    state: &ApiState,
    switch: SwitchKind,
    enabled: bool,
) -> Result<Json<SwitchResponse>, ApiError> {
    state
        .switches
        .set_enabled(switch, enabled)
        .await
        .map_err(repo_error_to_api)?;
    Ok(Json(SwitchResponse { switch, enabled }))
}

pub async fn enable_update(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    set_switch(&state, SwitchKind::Update, true).await
}

pub async fn disable_update(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    set_switch(&state, SwitchKind::Update, false).await
}

pub async fn enable_invalidate(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    set_switch(&state, SwitchKind::Invalidate, true).await
}

pub async fn disable_invalidate(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    set_switch(&state, SwitchKind::Invalidate, false).await
}

pub async fn enable_precompute(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    set_switch(&state, SwitchKind::Precompute, true).await
}

pub async fn disable_precompute(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    set_switch(&state, SwitchKind::Precompute, false).await
}

pub async fn put_quota(
    State(state): State<ApiState>,
    Json(payload): Json<QuotaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.quota == 0 {
        return Err(ApiError::bad_request(
            "invalid quota",
            Some("quota must be at least 1".to_string()),
        ));
    }

    state.quota.set(payload.quota);
    tracing::info!(
        target = "wavecache::http",
        quota = payload.quota,
        "precompute quota adjusted"
    );
    Ok(Json(QuotaResponse {
        quota: payload.quota,
    }))
}

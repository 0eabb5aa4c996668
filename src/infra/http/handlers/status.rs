//! Status handler

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::error::{ApiError, repo_error_to_api};
use crate::infra::http::state::ApiState;

pub async fn get_status(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let status = state.status.status().await.map_err(repo_error_to_api)?;
    Ok(Json(status))
}

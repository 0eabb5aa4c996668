//! Lookup/Update protocol handlers

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use wavecache_api_types::{LookupRequest, LookupResponse, UpdateRequest, UpdateResponse};

use crate::application::lookup::{LookupOutcome, UpdateOutcome};
use crate::application::repos::WriteEntryParams;
use crate::domain::{geo::GeoPoint, identity::DeviceIdentity};
use crate::infra::http::error::{ApiError, repo_error_to_api};
use crate::infra::http::state::ApiState;

pub async fn post_lookup(
    State(state): State<ApiState>,
    Json(payload): Json<LookupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = DeviceIdentity::new(
        &payload.device_id,
        &payload.rulesets,
        &payload.certifications,
    )
    .map_err(|err| ApiError::bad_request("invalid device identity", Some(err.to_string())))?;

    let outcome = state
        .lookup
        .lookup(&identity, &payload.digest)
        .await
        .map_err(repo_error_to_api)?;

    let body = match outcome {
        LookupOutcome::Hit(response) => LookupResponse::Hit { response },
        LookupOutcome::Miss(reason) => LookupResponse::Miss { reason },
    };
    Ok(Json(body))
}

pub async fn post_update(
    State(state): State<ApiState>,
    Json(payload): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = DeviceIdentity::new(
        &payload.device_id,
        &payload.rulesets,
        &payload.certifications,
    )
    .map_err(|err| ApiError::bad_request("invalid device identity", Some(err.to_string())))?;

    if !payload.validity_period_sec.is_finite() || payload.validity_period_sec <= 0.0 {
        return Err(ApiError::bad_request(
            "invalid validity period",
            Some("validity_period_sec must be a positive number".to_string()),
        ));
    }

    let params = WriteEntryParams {
        identity,
        config_ruleset: payload.config_ruleset,
        coordinates: GeoPoint::new(payload.lat, payload.lon),
        req_cfg_digest: payload.req_cfg_digest,
        validity_period_sec: payload.validity_period_sec,
        request: payload.request,
        response: payload.response,
    };

    let outcome = state
        .lookup
        .update(params, payload.correlation_id)
        .await
        .map_err(repo_error_to_api)?;

    let body = match outcome {
        UpdateOutcome::Ack => UpdateResponse::Ack,
        UpdateOutcome::Rejected => UpdateResponse::Rejected,
    };
    Ok(Json(body))
}

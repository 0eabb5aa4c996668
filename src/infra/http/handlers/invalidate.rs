//! Invalidation handler

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use wavecache_api_types::{InvalidateRequest, InvalidateResponse};

use crate::application::invalidation::InvalidationOutcome;
use crate::domain::geo::{CoverageRegion, GeoPoint};
use crate::infra::http::error::{ApiError, repo_error_to_api};
use crate::infra::http::state::ApiState;

pub async fn post_invalidate(
    State(state): State<ApiState>,
    Json(payload): Json<InvalidateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let provided = usize::from(payload.all.is_some())
        + usize::from(payload.ruleset_id.is_some())
        + usize::from(payload.regions.is_some());
    if provided != 1 {
        return Err(ApiError::bad_request(
            "ambiguous invalidation request",
            Some("provide exactly one of `all`, `ruleset_id`, `regions`".to_string()),
        ));
    }

    let outcome = if let Some(all) = payload.all {
        if !all {
            return Err(ApiError::bad_request(
                "invalid invalidation request",
                Some("`all` must be true when present".to_string()),
            ));
        }
        state.invalidation.full().await.map_err(repo_error_to_api)?
    } else if let Some(ruleset_id) = payload.ruleset_id {
        if ruleset_id.trim().is_empty() {
            return Err(ApiError::bad_request(
                "invalid invalidation request",
                Some("`ruleset_id` must not be empty".to_string()),
            ));
        }
        state
            .invalidation
            .ruleset(ruleset_id.trim())
            .await
            .map_err(repo_error_to_api)?
    } else {
        let bodies = payload.regions.unwrap_or_default();
        if bodies.is_empty() {
            return Err(ApiError::bad_request(
                "invalid invalidation request",
                Some("`regions` must not be empty".to_string()),
            ));
        }
        let mut regions = Vec::with_capacity(bodies.len());
        for body in &bodies {
            if !(-90.0..=90.0).contains(&body.lat) || !(-180.0..=180.0).contains(&body.lon) {
                return Err(ApiError::bad_request(
                    "invalid region coordinates",
                    Some(format!("({}, {}) is not a WGS84 position", body.lat, body.lon)),
                ));
            }
            if let Some(radius) = body.radius_km {
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(ApiError::bad_request(
                        "invalid region radius",
                        Some("radius_km must be a positive number".to_string()),
                    ));
                }
            }
            regions.push(CoverageRegion {
                center: GeoPoint::new(body.lat, body.lon),
                radius_km: body.radius_km,
            });
        }
        state
            .invalidation
            .spatial(&regions)
            .await
            .map_err(repo_error_to_api)?
    };

    let body = match outcome {
        InvalidationOutcome::Invalidated(count) => InvalidateResponse::Invalidated { count },
        InvalidationOutcome::Rejected => InvalidateResponse::Rejected,
    };
    Ok(Json(body))
}

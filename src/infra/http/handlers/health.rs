use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::infra::http::state::ApiState;

/// Liveness plus store reachability: a fresh switch read exercises the same
/// path every gated operation takes.
pub async fn healthcheck(State(state): State<ApiState>) -> Response {
    match state.switches.all().await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::healthcheck",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/status", get(handlers::get_status))
        .route("/lookup", post(handlers::post_lookup))
        .route("/update", post(handlers::post_update))
        .route("/invalidate", post(handlers::post_invalidate))
        .route("/update/enable", post(handlers::enable_update))
        .route("/update/disable", post(handlers::disable_update))
        .route("/invalidate/enable", post(handlers::enable_invalidate))
        .route("/invalidate/disable", post(handlers::disable_invalidate))
        .route("/precompute/enable", post(handlers::enable_precompute))
        .route("/precompute/disable", post(handlers::disable_precompute))
        .route("/precompute/quota", put(handlers::put_quota))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::state::RelayState;

/// Webcam frames arrive as base64 data URIs inside the JSON body.
pub const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Create the relay router with all routes.
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/search", post(handlers::search))
        .route("/gesture", post(handlers::gesture))
        .route("/ftso", post(handlers::ftso))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

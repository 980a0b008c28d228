use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::state::RelayState;
use crate::relay::RelayError;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GestureRequest {
    /// JPEG data URI.
    pub frame: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FtsoRequest {
    pub symbol: Option<String>,
}

/// A request without a JSON content type reads as an empty object, so the
/// usual validation answers it.
fn read_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, JsonRejection> {
    match body {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// POST /search
/// Price questions are answered from the oracle, everything else goes to the
/// search service.
pub async fn search(
    State(state): State<RelayState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let req = match read_body(body) {
        Ok(req) => req,
        Err(rejection) => return search_error(rejection.body_text()),
    };
    log::info!("relay: /search {:?}", req.query);

    match state.resolver.search(req.query.as_deref()).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(e) => search_error(e.to_string()),
    }
}

fn search_error(message: String) -> Response {
    log::error!("relay: /search failed: {message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "search_error", "message": message })),
    )
        .into_response()
}

/// POST /gesture
pub async fn gesture(
    State(state): State<RelayState>,
    body: Result<Json<GestureRequest>, JsonRejection>,
) -> Response {
    let req = match read_body(body) {
        Ok(req) => req,
        Err(rejection) => return gesture_error(rejection.body_text()),
    };

    match state.resolver.gesture(req.frame.as_deref()).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(RelayError::MissingFrame) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing frame" })),
        )
            .into_response(),
        Err(e) => gesture_error(e.to_string()),
    }
}

fn gesture_error(message: String) -> Response {
    log::error!("relay: /gesture failed: {message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "gesture_error", "message": message })),
    )
        .into_response()
}

/// POST /ftso
/// Latest USD price for BTC, ETH or FLR.
pub async fn ftso(
    State(state): State<RelayState>,
    body: Result<Json<FtsoRequest>, JsonRejection>,
) -> Response {
    let req = match read_body(body) {
        Ok(req) => req,
        Err(rejection) => return ftso_error(rejection.body_text()),
    };
    let symbol = req.symbol.unwrap_or_default();

    match state.resolver.price(&symbol).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(RelayError::UnsupportedSymbol(_)) => {
            log::info!("relay: /ftso rejected symbol {symbol:?}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unsupported symbol" })),
            )
                .into_response()
        }
        Err(e) => ftso_error(e.to_string()),
    }
}

fn ftso_error(details: String) -> Response {
    log::error!("relay: /ftso failed: {details}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "ftso_error", "details": details })),
    )
        .into_response()
}

//! Error response bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// JSON error body: `{"code": ..., "message": ...}`.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "code": status.as_u16(),
        "message": message,
    });
    (status, Json(body)).into_response()
}

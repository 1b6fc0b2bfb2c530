//! Request body size limit.
//!
//! Requests whose `Content-Length` exceeds the limit are refused with 413
//! before any guard reads the body. Streaming bodies are cut off at the
//! limit and surface as `PayloadError::BodyTooLarge` where they are buffered.
//!
//! The limit layer and axum's body extractors answer 413 with a plain-text
//! body; `uniform_limit_rejection` rewrites those into the JSON error shape.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::SecurityConfig;
use crate::envelope::PayloadError;
use crate::error::GuardError;

pub fn body_limit_layer(config: &SecurityConfig) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(config.max_body_size)
}

/// Replace a non-JSON 413 with the uniform rejection body.
pub async fn uniform_limit_rejection(response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json(&response) {
        return response;
    }
    GuardError::from(PayloadError::BodyTooLarge).into_response()
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

//! JSON-only request bodies.
//!
//! A request without `Content-Type` passes. One that declares a type must
//! declare `application/json`; parameters such as `charset` are ignored.

use axum::{
    body::Body,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GuardError;

/// Middleware: 415 for non-JSON request bodies.
pub async fn require_json(request: Request<Body>, next: Next) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    match declared {
        Some(value) if !value.is_empty() && !is_json(&value) => {
            tracing::warn!(content_type = %value, path = %request.uri().path(), "Unsupported media type");
            GuardError::UnsupportedMediaType(value).into_response()
        }
        _ => next.run(request).await,
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

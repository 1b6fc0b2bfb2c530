//! Envelope middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::envelope::Envelope;
use crate::error::GuardError;
use crate::http::request::{buffer_body, request_id};

#[derive(Clone)]
pub struct EnvelopeState {
    pub envelope: Arc<Envelope>,
    pub max_body_size: usize,
}

/// Replace an encrypted request body with its plaintext.
pub async fn decrypt_request(
    State(state): State<EnvelopeState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.envelope.decrypts(&path) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match buffer_body(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(err) => return GuardError::from(err).into_response(),
    };

    let body = match state.envelope.open_request(&path, &bytes) {
        Ok(Some(plaintext)) => {
            tracing::debug!(path = %path, bytes = plaintext.len(), "Request body decrypted");
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(plaintext.len()));
            plaintext
        }
        Ok(None) => bytes,
        Err(err) => {
            tracing::warn!(
                request_id = %request_id(&parts.headers),
                path = %path,
                reason = %err,
                "Request decryption rejected"
            );
            return GuardError::from(err).into_response();
        }
    };

    next.run(Request::from_parts(parts, Body::from(body))).await
}

/// Encrypt successful JSON responses on configured paths.
pub async fn encrypt_response(
    State(state): State<EnvelopeState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if !state.envelope.encrypts(&path) || !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "Failed to collect response body");
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    match state.envelope.seal_response(&path, parts.status, &bytes) {
        Some(sealed) => {
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(sealed.len()));
            Response::from_parts(parts, Body::from(sealed))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

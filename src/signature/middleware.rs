//! Signature guards.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GuardError;
use crate::http::request::{buffer_body, path_and_query, request_id};
use crate::signature::{SignatureError, SignatureVerifier, SignedRequest, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Verifier plus the body buffering limit.
#[derive(Clone)]
pub struct SignatureState {
    pub verifier: Arc<SignatureVerifier>,
    pub max_body_size: usize,
}

const UNREADABLE_BODY: &str = "failed to read request body";

/// Outcome of [`optional_signature`], attached as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Valid,
    Invalid(String),
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn check(verifier: &SignatureVerifier, parts: &Parts, body: &[u8]) -> Result<(), SignatureError> {
    let url = path_and_query(&parts.uri);
    verifier.verify(&SignedRequest {
        method: parts.method.as_str(),
        url: &url,
        body,
        timestamp: header(parts, TIMESTAMP_HEADER),
        signature: header(parts, SIGNATURE_HEADER),
    })
}

/// Reject requests whose signature is missing, stale or wrong.
///
/// The body is buffered for verification and then reinstalled unchanged.
pub async fn verify_signature(
    State(state): State<SignatureState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match buffer_body(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(err) => return GuardError::from(err).into_response(),
    };

    if let Err(err) = check(&state.verifier, &parts, &bytes) {
        tracing::warn!(
            request_id = %request_id(&parts.headers),
            path = %parts.uri.path(),
            reason = %err,
            "Signature rejected"
        );
        return GuardError::from(err).into_response();
    }

    tracing::debug!(path = %parts.uri.path(), "Signature verified");
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Verify only when both signature headers are present; never reject.
///
/// A body that cannot be buffered (too large, or a read error) is recorded
/// as `Invalid("failed to read request body")` and the request continues
/// with an empty body.
pub async fn optional_signature(
    State(state): State<SignatureState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let signed = header(&parts, SIGNATURE_HEADER).is_some_and(|s| !s.is_empty())
        && header(&parts, TIMESTAMP_HEADER).is_some_and(|t| !t.is_empty());
    if !signed {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let bytes = match buffer_body(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %parts.uri.path(), reason = %err, "Optional signature body unreadable");
            parts
                .extensions
                .insert(SignatureStatus::Invalid(UNREADABLE_BODY.to_string()));
            return next.run(Request::from_parts(parts, Body::empty())).await;
        }
    };

    let status = match check(&state.verifier, &parts, &bytes) {
        Ok(()) => SignatureStatus::Valid,
        Err(err) => {
            tracing::warn!(path = %parts.uri.path(), reason = %err, "Optional signature invalid");
            SignatureStatus::Invalid(err.public_message().to_string())
        }
    };
    parts.extensions.insert(status);

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::unix_timestamp;
    use axum::{
        http::StatusCode,
        middleware::from_fn_with_state,
        routing::{get, post},
        Extension, Router,
    };
    use tower::ServiceExt;

    fn state() -> SignatureState {
        SignatureState {
            verifier: Arc::new(SignatureVerifier::new("sig-secret")),
            max_body_size: 1024,
        }
    }

    fn signed(method: &str, uri: &str, body: &'static str, ts: i64) -> Request<Body> {
        let ts = ts.to_string();
        let sig = state().verifier.sign(method, uri, body.as_bytes(), &ts);
        Request::builder()
            .method(method)
            .uri(uri)
            .header(TIMESTAMP_HEADER, ts)
            .header(SIGNATURE_HEADER, sig)
            .body(Body::from(body))
            .unwrap()
    }

    fn echo_app() -> Router {
        async fn echo(body: String) -> String {
            body
        }
        Router::new()
            .route("/api/tasks", post(echo))
            .layer(from_fn_with_state(state(), verify_signature))
    }

    #[tokio::test]
    async fn test_valid_signature_reinstalls_body() {
        let request = signed("POST", "/api/tasks", r#"{"title":"x"}"#, unix_timestamp());
        let response = echo_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"title":"x"}"#);
    }

    #[tokio::test]
    async fn test_query_is_signed() {
        async fn ok() -> &'static str {
            "ok"
        }
        let app = Router::new()
            .route("/api/tasks", get(ok))
            .layer(from_fn_with_state(state(), verify_signature));

        let now = unix_timestamp();
        let good = signed("GET", "/api/tasks?page=2", "", now);
        assert_eq!(app.clone().oneshot(good).await.unwrap().status(), StatusCode::OK);

        let mut bad = signed("GET", "/api/tasks?page=2", "", now);
        *bad.uri_mut() = "/api/tasks?page=3".parse().unwrap();
        assert_eq!(app.oneshot(bad).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_headers_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/tasks")
            .body(Body::from("{}"))
            .unwrap();
        let response = echo_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let ts = unix_timestamp().to_string();
        let request = Request::builder()
            .method("POST")
            .uri("/api/tasks")
            .header(TIMESTAMP_HEADER, ts)
            .header(SIGNATURE_HEADER, "00")
            .body(Body::from(vec![b'x'; 4096]))
            .unwrap();
        let response = echo_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_optional_signature_records_status() {
        async fn status(status: Option<Extension<SignatureStatus>>) -> String {
            match status {
                Some(Extension(SignatureStatus::Valid)) => "valid".into(),
                Some(Extension(SignatureStatus::Invalid(msg))) => msg,
                None => "none".into(),
            }
        }
        let app = Router::new()
            .route("/api/tasks", post(status))
            .layer(from_fn_with_state(state(), optional_signature));

        let read = |response: Response| async move {
            let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
            String::from_utf8(bytes.to_vec()).unwrap()
        };

        let now = unix_timestamp();
        let response = app
            .clone()
            .oneshot(signed("POST", "/api/tasks", "{}", now))
            .await
            .unwrap();
        assert_eq!(read(response).await, "valid");

        let response = app
            .clone()
            .oneshot(signed("POST", "/api/tasks", "{}", now - 1_000))
            .await
            .unwrap();
        assert_eq!(read(response).await, "signature expired");

        let unsigned = Request::builder()
            .method("POST")
            .uri("/api/tasks")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(unsigned).await.unwrap();
        assert_eq!(read(response).await, "none");
    }

    #[tokio::test]
    async fn test_optional_signature_unreadable_body_continues() {
        async fn seen(Extension(status): Extension<SignatureStatus>, body: String) -> String {
            format!("{status:?}|{}", body.len())
        }
        let app = Router::new()
            .route("/api/tasks", post(seen))
            .layer(from_fn_with_state(state(), optional_signature));

        let request = Request::builder()
            .method("POST")
            .uri("/api/tasks")
            .header(TIMESTAMP_HEADER, unix_timestamp().to_string())
            .header(SIGNATURE_HEADER, "00")
            .body(Body::from(vec![b'x'; 4096]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            r#"Invalid("failed to read request body")|0"#
        );
    }
}

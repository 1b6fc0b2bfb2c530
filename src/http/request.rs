//! Request identity and body buffering.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Read the request ID back for log correlation
//! - Buffer bodies for guards that must see the whole payload
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Buffered bodies are bounded by the configured max body size

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request, Uri};
use bytes::Bytes;
use http_body_util::LengthLimitError;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::envelope::PayloadError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// Request ID from headers, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Path plus `?query` when present.
pub fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Read a whole body, refusing more than `limit` bytes.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, PayloadError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        if is_length_limit(&err) {
            PayloadError::BodyTooLarge
        } else {
            tracing::warn!(error = %err, "Failed to read request body");
            PayloadError::BodyUnreadable
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

//! Guard rejection taxonomy.
//!
//! Every guard fails fast with one of these. The HTTP status and the short
//! public message are stable; library error text stays in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::AuthError;
use crate::envelope::PayloadError;
use crate::http::response::reject;
use crate::observability::metrics;
use crate::security::access_control::AccessDenied;
use crate::signature::SignatureError;

/// Terminal rejection produced by a guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Bad, expired or missing identity token.
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// Missing, expired or mismatched request signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Malformed or undecryptable body.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Client address refused by IP policy.
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    /// Client exceeded its request budget.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Declared body type is not JSON.
    #[error("unsupported media type {0:?}")]
    UnsupportedMediaType(String),
}

impl GuardError {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::Authentication(e) => e.status(),
            GuardError::Signature(_) => StatusCode::UNAUTHORIZED,
            GuardError::Payload(e) => e.status(),
            GuardError::AccessDenied(_) => StatusCode::FORBIDDEN,
            GuardError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GuardError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            GuardError::Authentication(e) => e.public_message(),
            GuardError::Signature(e) => e.public_message(),
            GuardError::Payload(e) => e.public_message(),
            GuardError::AccessDenied(_) => "access denied",
            GuardError::RateLimited => "rate limit exceeded",
            GuardError::UnsupportedMediaType(_) => "unsupported media type",
        }
    }

    /// Guard name used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            GuardError::Authentication(_) => "auth",
            GuardError::Signature(_) => "signature",
            GuardError::Payload(_) => "payload",
            GuardError::AccessDenied(_) => "ip_access",
            GuardError::RateLimited => "rate_limit",
            GuardError::UnsupportedMediaType(_) => "content_type",
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::record_rejection(self.kind(), status.as_u16());
        reject(status, self.public_message())
    }
}

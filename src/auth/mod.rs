//! Identity token subsystem.
//!
//! # Data Flow
//! ```text
//! Issue (login, CLI):
//!     subject + name + role → token.rs → "header.payload.signature"
//!
//! Incoming request:
//!     Authorization: Bearer <token>
//!     → middleware.rs (extract bearer)
//!     → token.rs (verify signature, decode claims, check expiry)
//!     → Claims + Identity attached to request extensions
//!     → handlers extract Identity
//! ```
//!
//! # Design Decisions
//! - Signature is verified before the payload is decoded
//! - No revocation list; lifetime is bounded only by TTL
//! - Role checks are case-insensitive

pub mod claims;
pub mod middleware;
pub mod token;

use axum::http::StatusCode;
use thiserror::Error;

pub use claims::{Claims, Identity, TokenResponse};
pub use middleware::{optional_auth, require_auth, require_role, RoleGuard};
pub use token::{TokenError, TokenService};

/// Authentication guard failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingToken,

    #[error("Authorization header is not a Bearer token")]
    InvalidScheme,

    #[error("empty bearer token")]
    EmptyToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("role {role:?} is not permitted")]
    InsufficientRole { role: String },

    #[error("no authenticated identity on request")]
    Unauthenticated,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing authentication token",
            AuthError::InvalidScheme => "invalid authentication token format",
            AuthError::EmptyToken => "authentication token is empty",
            AuthError::Token(TokenError::TokenExpired { .. }) => "token expired",
            AuthError::Token(_) => "invalid authentication token",
            AuthError::InsufficientRole { .. } => "insufficient permissions",
            AuthError::Unauthenticated => "authentication required",
        }
    }
}

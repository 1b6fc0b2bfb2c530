//! Request security pipeline.
//!
//! Composable guards for HTTP services: signed identity tokens, request
//! signatures with a replay window, an encrypted body envelope, IP access
//! rules and per-client rate limiting.

pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod signature;

pub use config::GuardConfig;
pub use error::GuardError;
pub use http::GuardServer;
pub use lifecycle::Shutdown;

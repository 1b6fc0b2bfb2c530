//! Request signature subsystem.
//!
//! # Data Flow
//! ```text
//! Client:
//!     method + url + body + timestamp → HMAC-SHA256 → X-Signature (hex)
//!
//! Incoming request:
//!     → middleware.rs (buffer body, read X-Signature / X-Timestamp)
//!     → verifier.rs (replay window, recompute, constant-time compare)
//!     → body reinstalled, request continues
//! ```
//!
//! # Design Decisions
//! - The signed body is the body the guard sees; run decryption first
//! - The window is symmetric: clients may be ahead or behind
//! - No nonce store, so replays inside the window are accepted

pub mod middleware;
pub mod verifier;

pub use middleware::{optional_signature, verify_signature, SignatureState, SignatureStatus};
pub use verifier::{
    signing_input, SignatureError, SignatureVerifier, SignedRequest, DEFAULT_WINDOW_SECS,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, guard composition)
//!     → request.rs (request ID, body buffering helpers)
//!     → guards (security, envelope, signature, auth)
//!     → response.rs (uniform JSON bodies)
//!     → recovery.rs (panics become 500)
//!     → Send to client
//! ```

pub mod recovery;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use response::{reject, ApiResponse, ErrorBody};
pub use server::{apply_guards, build_router, GuardServer, GuardState, ServerError};

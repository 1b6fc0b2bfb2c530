//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight answers, allowed origins)
//!     → content_type.rs (JSON or nothing, 415)
//!     → client_ip.rs (X-Real-IP / X-Forwarded-For / peer)
//!     → rate_limit.rs (per-IP token bucket, 429)
//!     → access_control.rs (blacklist then whitelist, 403)
//!     → limits.rs (body size, 413)
//!     → Pass to payload guards
//!
//! Outgoing response:
//!     → headers.rs (security headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Rate limiting runs before IP access so denied clients still spend tokens
//! - Rule sets swap atomically on reload; no lock on the request path

pub mod access_control;
pub mod client_ip;
pub mod content_type;
pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use access_control::{ip_access, AccessDenied, CidrBlock, IpAccessController, IpRule, IpRuleSet};
pub use client_ip::{client_ip, resolve_client_ip};
pub use content_type::require_json;
pub use cors::cors_layer;
pub use rate_limit::{rate_limit, RateLimiter};

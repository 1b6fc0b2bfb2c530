//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All guards produce:
//!     → logging.rs (structured log events: client, path, request_id, reason)
//!     → metrics.rs (rejection counters, bucket gauge, envelope counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every guard's log lines
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

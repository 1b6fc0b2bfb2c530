//! Panic recovery.
//!
//! A panic anywhere inside the pipeline becomes a uniform 500 instead of a
//! dropped connection.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::response::reject;
use crate::observability::metrics;

/// Wrap `router` so handler and guard panics answer 500.
pub fn recover_panics<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    metrics::record_rejection("panic", status.as_u16());
    reject(status, "internal server error")
}

//! Cross-origin resource sharing.
//!
//! Preflights are answered here, before rate limiting and the payload guards.
//! Credentials are allowed, so only the configured origins are echoed back.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::config::CorsConfig;

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");
const X_SIGNATURE: HeaderName = HeaderName::from_static("x-signature");
const X_TIMESTAMP: HeaderName = HeaderName::from_static("x-timestamp");

/// Build the CORS layer, or `None` when CORS is switched off.
pub fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
                Method::PATCH,
            ])
            .allow_headers([
                header::ORIGIN,
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                X_REQUESTED_WITH,
                X_SIGNATURE,
                X_TIMESTAMP,
            ])
            .expose_headers([header::CONTENT_LENGTH])
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.max_age_secs)),
    )
}

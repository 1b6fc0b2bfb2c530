//! HTTP server setup and guard composition.
//!
//! # Responsibilities
//! - Build every guard from its config section
//! - Compose the guards around the reference routes in a fixed order
//! - Serve with graceful shutdown
//! - Apply IP rule reloads from the config watcher
//!
//! Layer order, outermost first:
//! trace → request id → panic recovery → CORS → security headers → timeout
//! → content type → rate limit → IP access → body limit → decrypt → signature
//! → encrypt → route-group auth → handler

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{Method, Uri},
    middleware::{from_fn, from_fn_with_state, map_request, map_response},
    response::Json,
    routing::{any, get},
    Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{require_auth, require_role, Identity, RoleGuard, TokenService};
use crate::config::watcher::restart_required;
use crate::config::GuardConfig;
use crate::crypto::CryptoError;
use crate::envelope::{decrypt_request, encrypt_response, Envelope, EnvelopeState};
use crate::http::recovery::recover_panics;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::http::response::ApiResponse;
use crate::lifecycle::Shutdown;
use crate::security::{
    cors_layer, headers, ip_access, limits, rate_limit, require_json, IpAccessController,
    RateLimiter,
};
use crate::signature::{verify_signature, SignatureState, SignatureVerifier};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid encryption settings: {0}")]
    Encryption(#[from] CryptoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Guards built from config. Disabled guards are `None`.
#[derive(Clone)]
pub struct GuardState {
    pub tokens: Arc<TokenService>,
    pub signature: Option<SignatureState>,
    pub envelope: Option<EnvelopeState>,
    pub ip_access: Arc<IpAccessController>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl GuardState {
    pub fn from_config(config: &GuardConfig) -> Result<Self, ServerError> {
        let max_body_size = config.security.max_body_size;

        let signature = config.signature.enabled.then(|| SignatureState {
            verifier: Arc::new(SignatureVerifier::with_window(
                config.signature.secret.clone(),
                config.signature.window_secs,
            )),
            max_body_size,
        });

        let envelope = if config.encryption.enabled {
            Some(EnvelopeState {
                envelope: Arc::new(Envelope::from_config(&config.encryption)?),
                max_body_size,
            })
        } else {
            None
        };

        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        Ok(Self {
            tokens: Arc::new(TokenService::new(&config.token)),
            signature,
            envelope,
            ip_access: Arc::new(IpAccessController::new(&config.ip_access)),
            rate_limiter,
        })
    }
}

/// Compose the guard pipeline around the reference routes.
pub fn build_router(config: &GuardConfig, state: &GuardState) -> Router {
    apply_guards(reference_routes(state), config, state)
}

fn reference_routes(state: &GuardState) -> Router {
    let public = Router::new()
        .route("/api/public/health", get(health))
        .route("/api/public/echo", any(echo));

    let tasks = Router::new()
        .route("/api/tasks", any(echo))
        .route("/api/tasks/{*rest}", any(echo))
        .route_layer(from_fn_with_state(state.tokens.clone(), require_auth));

    let admin = Router::new()
        .route("/api/admin", any(echo))
        .route("/api/admin/{*rest}", any(echo))
        .route_layer(from_fn_with_state(
            RoleGuard::new(state.tokens.clone(), ["admin"]),
            require_role,
        ));

    public.merge(tasks).merge(admin)
}

/// Wrap `routes` in every configured guard. Route-group auth stays with
/// the routes themselves.
#[allow(deprecated)]
pub fn apply_guards(routes: Router, config: &GuardConfig, state: &GuardState) -> Router {
    let mut router = routes;

    // Innermost first.
    if let Some(envelope) = &state.envelope {
        router = router.layer(from_fn_with_state(envelope.clone(), encrypt_response));
    }
    if let Some(signature) = &state.signature {
        router = router.layer(from_fn_with_state(signature.clone(), verify_signature));
    }
    if let Some(envelope) = &state.envelope {
        router = router.layer(from_fn_with_state(envelope.clone(), decrypt_request));
    }
    router = router
        .layer(limits::body_limit_layer(&config.security))
        .layer(map_response(limits::uniform_limit_rejection))
        .layer(from_fn_with_state(state.ip_access.clone(), ip_access));
    if let Some(limiter) = &state.rate_limiter {
        router = router.layer(from_fn_with_state(limiter.clone(), rate_limit));
    }
    router = router
        .layer(from_fn(require_json))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.timeouts.request_secs,
        )));
    if config.security.enable_headers {
        router = headers::with_security_headers(router);
    }
    if let Some(cors) = cors_layer(&config.cors) {
        router = router.layer(cors);
    }
    recover_panics(router)
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
        .layer(map_request(log_request))
        .layer(TraceLayer::new_for_http())
}

async fn log_request(request: axum::extract::Request) -> axum::extract::Request {
    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %crate::http::request::request_id(request.headers()),
        "Request received"
    );
    request
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<ApiResponse<Health>> {
    ApiResponse::ok(Health { status: "ok" })
}

/// What the reference handlers saw after the guards ran.
#[derive(Debug, Serialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub identity: Option<Identity>,
    pub body: serde_json::Value,
}

async fn echo(
    method: Method,
    uri: Uri,
    identity: Option<Identity>,
    body: Bytes,
) -> Json<ApiResponse<Echo>> {
    let body = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    ApiResponse::ok(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        identity,
        body,
    })
}

/// HTTP server for the guard pipeline.
pub struct GuardServer {
    router: Router,
    config: GuardConfig,
    state: GuardState,
}

impl GuardServer {
    pub fn new(config: GuardConfig) -> Result<Self, ServerError> {
        let state = GuardState::from_config(&config)?;
        let router = build_router(&config, &state);
        tracing::info!(
            signature = state.signature.is_some(),
            encryption = state.envelope.is_some(),
            rate_limit = state.rate_limiter.is_some(),
            ip_access = state.ip_access.is_active(),
            "Guard pipeline built"
        );
        Ok(Self {
            router,
            config,
            state,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Serve until `shutdown` fires. `updates` carries reloaded configs.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<GuardConfig>>,
        shutdown: Shutdown,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(limiter) = &self.state.rate_limiter {
            let interval = self.config.rate_limit.sweep_interval_secs;
            if interval > 0 {
                limiter.clone().spawn_sweeper(
                    Duration::from_secs(interval),
                    Duration::from_secs(self.config.rate_limit.max_idle_secs),
                    shutdown.subscribe(),
                );
            }
        }

        if let Some(updates) = updates {
            tokio::spawn(apply_updates(
                self.config.clone(),
                self.state.ip_access.clone(),
                updates,
                shutdown.subscribe(),
            ));
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_updates(
    mut current: GuardConfig,
    ip_access: Arc<IpAccessController>,
    mut updates: mpsc::UnboundedReceiver<GuardConfig>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            next = updates.recv() => {
                let Some(next) = next else { break };
                ip_access.reload(&next.ip_access);
                let stale = restart_required(&current, &next);
                if !stale.is_empty() {
                    tracing::warn!(sections = ?stale, "Config sections changed that need a restart to apply");
                }
                current = next;
            }
            _ = shutdown.recv() => break,
        }
    }
}

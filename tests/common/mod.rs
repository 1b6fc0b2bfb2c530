//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use request_guard::auth::TokenService;
use request_guard::clock::unix_timestamp;
use request_guard::config::GuardConfig;
use request_guard::crypto::{self, CipherMode};
use request_guard::envelope::EncryptedEnvelope;
use request_guard::lifecycle::Shutdown;
use request_guard::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use request_guard::GuardServer;

pub const TOKEN_SECRET: &str = "integration-token-secret";
pub const SIGNATURE_SECRET: &str = "integration-signature-secret";
pub const ENCRYPTION_KEY: &str = "0123456789abcdef0123456789abcdef";

/// Defaults with test secrets and a generous rate limit.
pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.token.secret = TOKEN_SECRET.into();
    config.signature.secret = SIGNATURE_SECRET.into();
    config.encryption.key = ENCRYPTION_KEY.into();
    config.encryption.mode = CipherMode::Gcm;
    config.rate_limit.requests_per_second = 1000.0;
    config.rate_limit.burst_size = 1000;
    config
}

pub fn router(config: GuardConfig) -> Router {
    GuardServer::new(config).unwrap().router()
}

pub fn tokens() -> TokenService {
    TokenService::new(&test_config().token)
}

pub fn bearer(role: &str) -> String {
    let token = tokens().issue("42", "alice", role, None, None).unwrap();
    format!("Bearer {token}")
}

/// Request builder pre-filled with a client address.
pub fn request(method: &str, uri: &str, client: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Real-IP", client)
}

/// Add signature headers for `body`, as of `timestamp`.
pub fn sign(
    builder: axum::http::request::Builder,
    method: &str,
    url: &str,
    body: &[u8],
    timestamp: i64,
) -> axum::http::request::Builder {
    let ts = timestamp.to_string();
    let signature = SignatureVerifier::new(SIGNATURE_SECRET).sign(method, url, body, &ts);
    builder
        .header(TIMESTAMP_HEADER, ts)
        .header(SIGNATURE_HEADER, signature)
}

pub fn now() -> i64 {
    unix_timestamp()
}

pub fn seal(plaintext: &[u8]) -> Vec<u8> {
    let data = crypto::encrypt(CipherMode::Gcm, ENCRYPTION_KEY.as_bytes(), plaintext).unwrap();
    serde_json::to_vec(&EncryptedEnvelope::sealed(data)).unwrap()
}

pub fn open(body: &serde_json::Value) -> serde_json::Value {
    let envelope: EncryptedEnvelope = serde_json::from_value(body.clone()).unwrap();
    assert!(envelope.encrypted);
    let plaintext =
        crypto::decrypt(CipherMode::Gcm, ENCRYPTION_KEY.as_bytes(), &envelope.data).unwrap();
    serde_json::from_slice(&plaintext).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    read_json(response).await
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Run a real server on an ephemeral port.
pub async fn start_server(config: GuardConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = GuardServer::new(config).unwrap();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, None, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}

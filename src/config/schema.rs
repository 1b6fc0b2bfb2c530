//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard
//! pipeline. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::crypto::CipherMode;

/// Root configuration for the request guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Identity token settings.
    pub token: TokenConfig,

    /// Request signature settings.
    pub signature: SignatureConfig,

    /// Body encryption settings.
    pub encryption: EncryptionConfig,

    /// Client address allow/deny rules.
    pub ip_access: IpAccessConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Identity token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Signing secret for issued tokens.
    pub secret: String,

    /// Token lifetime in seconds (0 = 24 hours).
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            secret: "CHANGE_ME_TOKEN_SECRET".to_string(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Request signature configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Require X-Signature/X-Timestamp on every request.
    pub enabled: bool,

    /// Shared HMAC secret.
    pub secret: String,

    /// Accepted clock skew in either direction, seconds.
    pub window_secs: i64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            secret: "CHANGE_ME_SIGNATURE_SECRET".to_string(),
            window_secs: 300,
        }
    }
}

/// Body encryption configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Enable the request/response envelope.
    pub enabled: bool,

    /// Shared AES key (16, 24 or 32 bytes).
    pub key: String,

    /// Cipher mode for this channel.
    pub mode: CipherMode,

    /// Paths whose request bodies are decrypted (exact or `prefix/*`).
    pub decrypt_request_paths: Vec<String>,

    /// Paths whose response bodies are encrypted (exact or `prefix/*`).
    pub encrypt_response_paths: Vec<String>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            key: "CHANGE_ME_32_BYTE_ENCRYPTION_KEY".to_string(),
            mode: CipherMode::Gcm,
            decrypt_request_paths: Vec::new(),
            encrypt_response_paths: Vec::new(),
        }
    }
}

/// Client address rules. Rules are exact addresses, dotted prefixes
/// ("10.1.2") or CIDR blocks.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IpAccessConfig {
    /// Only whitelisted addresses may pass.
    pub enable_whitelist: bool,

    pub whitelist: Vec<String>,

    /// Blacklisted addresses are denied.
    pub enable_blacklist: bool,

    pub blacklist: Vec<String>,
}

impl IpAccessConfig {
    pub fn is_active(&self) -> bool {
        self.enable_whitelist || self.enable_blacklist
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client address.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,

    /// Idle bucket sweep interval in seconds (0 = never sweep).
    pub sweep_interval_secs: u64,

    /// Buckets idle longer than this are evicted by the sweep.
    pub max_idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100.0,
            burst_size: 200,
            sweep_interval_secs: 0,
            max_idle_secs: 600,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Cross-origin resource sharing configuration.
///
/// Credentials are always allowed, so origins must be listed explicitly.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Answer preflights and add CORS headers.
    pub enabled: bool,

    /// Exact origins allowed to call the API.
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            max_age_secs: 12 * 60 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert!(!config.signature.enabled);
        assert_eq!(config.signature.window_secs, 300);
        assert_eq!(config.token.ttl_secs, 86_400);
        assert_eq!(config.encryption.mode, CipherMode::Gcm);
        assert_eq!(config.encryption.key.len(), 32);
        assert!(!config.ip_access.is_active());
        assert!(config.cors.enabled);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_partial_toml() {
        let config: GuardConfig = toml::from_str(
            r#"
            [encryption]
            enabled = true
            mode = "cbc"
            key = "1234567890123456"
            decrypt_request_paths = ["/api/tasks/*"]

            [ip_access]
            enable_blacklist = true
            blacklist = ["10.0.0.0/8"]
            "#,
        )
        .unwrap();

        assert!(config.encryption.enabled);
        assert_eq!(config.encryption.mode, CipherMode::Cbc);
        assert_eq!(config.encryption.decrypt_request_paths, vec!["/api/tasks/*"]);
        assert!(config.ip_access.is_active());
        // Untouched sections keep their defaults
        assert_eq!(config.rate_limit.burst_size, 200);
    }
}

//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_TOKEN_SECRET: &str = "GUARD_TOKEN_SECRET";
pub const ENV_SIGNATURE_SECRET: &str = "GUARD_SIGNATURE_SECRET";
pub const ENV_ENCRYPTION_KEY: &str = "GUARD_ENCRYPTION_KEY";
pub const ENV_ENABLE_SIGNATURE: &str = "GUARD_ENABLE_SIGNATURE";
pub const ENV_IP_WHITELIST: &str = "GUARD_IP_WHITELIST";
pub const ENV_IP_BLACKLIST: &str = "GUARD_IP_BLACKLIST";
pub const ENV_CORS_ORIGINS: &str = "GUARD_CORS_ORIGINS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GuardConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn load_from_env() -> Result<GuardConfig, ConfigError> {
    let mut config = GuardConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay values from `lookup` (normally the process environment).
///
/// A non-empty IP list variable also enables that list.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(ENV_TOKEN_SECRET).filter(|v| !v.is_empty()) {
        config.token.secret = secret;
    }
    if let Some(secret) = lookup(ENV_SIGNATURE_SECRET).filter(|v| !v.is_empty()) {
        config.signature.secret = secret;
    }
    if let Some(key) = lookup(ENV_ENCRYPTION_KEY).filter(|v| !v.is_empty()) {
        config.encryption.key = key;
    }
    if let Some(flag) = lookup(ENV_ENABLE_SIGNATURE) {
        config.signature.enabled = parse_flag(&flag);
    }
    if let Some(list) = lookup(ENV_IP_WHITELIST).map(|v| split_list(&v)) {
        config.ip_access.enable_whitelist = !list.is_empty();
        config.ip_access.whitelist = list;
    }
    if let Some(list) = lookup(ENV_IP_BLACKLIST).map(|v| split_list(&v)) {
        config.ip_access.enable_blacklist = !list.is_empty();
        config.ip_access.blacklist = list;
    }
    if let Some(list) = lookup(ENV_CORS_ORIGINS)
        .map(|v| split_list(&v))
        .filter(|l| !l.is_empty())
    {
        config.cors.allowed_origins = list;
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Comma-separated, trimmed, empties dropped.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

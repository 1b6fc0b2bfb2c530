//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate secrets, key sizes and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("token.secret must not be empty")]
    EmptyTokenSecret,

    #[error("signature.secret must not be empty when signing is enabled")]
    EmptySignatureSecret,

    #[error("signature.window_secs must be positive")]
    InvalidSignatureWindow,

    #[error("encryption.key must be 16, 24 or 32 bytes (got {0})")]
    InvalidEncryptionKey(usize),

    #[error("rate_limit.requests_per_second must be positive")]
    InvalidRate,

    #[error("rate_limit.burst_size must be at least 1")]
    InvalidBurst,

    #[error("security.max_body_size must be positive")]
    InvalidBodyLimit,

    #[error("cors.allowed_origins entry {0:?} must be an exact origin")]
    InvalidCorsOrigin(String),

    #[error("invalid address {field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.token.secret.is_empty() {
        errors.push(ValidationError::EmptyTokenSecret);
    }

    if config.signature.enabled {
        if config.signature.secret.is_empty() {
            errors.push(ValidationError::EmptySignatureSecret);
        }
        if config.signature.window_secs <= 0 {
            errors.push(ValidationError::InvalidSignatureWindow);
        }
    }

    if config.encryption.enabled && !matches!(config.encryption.key.len(), 16 | 24 | 32) {
        errors.push(ValidationError::InvalidEncryptionKey(config.encryption.key.len()));
    }

    if config.rate_limit.enabled {
        if !(config.rate_limit.requests_per_second > 0.0) {
            errors.push(ValidationError::InvalidRate);
        }
        if config.rate_limit.burst_size < 1 {
            errors.push(ValidationError::InvalidBurst);
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::InvalidBodyLimit);
    }

    if config.cors.enabled {
        for origin in &config.cors.allowed_origins {
            if origin == "*" || axum::http::HeaderValue::from_str(origin).is_err() {
                errors.push(ValidationError::InvalidCorsOrigin(origin.clone()));
            }
        }
    }

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GuardConfig::default();
        config.token.secret.clear();
        config.signature.enabled = true;
        config.signature.secret.clear();
        config.encryption.enabled = true;
        config.encryption.key = "short".into();
        config.rate_limit.requests_per_second = 0.0;
        config.listener.bind_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyTokenSecret,
                ValidationError::EmptySignatureSecret,
                ValidationError::InvalidEncryptionKey(5),
                ValidationError::InvalidRate,
                ValidationError::InvalidAddress {
                    field: "listener.bind_address",
                    value: "nowhere".into()
                },
            ]
        );
    }

    #[test]
    fn test_disabled_sections_are_not_checked() {
        let mut config = GuardConfig::default();
        config.encryption.key = "short".into();
        config.rate_limit.enabled = false;
        config.rate_limit.burst_size = 0;
        config.cors.enabled = false;
        config.cors.allowed_origins = vec!["*".into()];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_wildcard_origin_rejected() {
        let mut config = GuardConfig::default();
        config.cors.allowed_origins = vec!["*".into(), "https://ok.example".into()];
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidCorsOrigin("*".into())])
        );
    }
}

//! Compact signed identity tokens.
//!
//! Format: `b64url(header) "." b64url(claims) "." b64url(HMAC-SHA256(header "." claims))`,
//! each segment in padded base64url (RFC 4648 section 5, `=` kept).
//!
//! There is no revocation list. A token is valid from issue until its
//! `exp` passes; shortening its life means issuing with a shorter TTL.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE, Engine};
use thiserror::Error;

use crate::auth::claims::{Claims, TokenHeader, TokenResponse};
use crate::clock::unix_timestamp;
use crate::config::TokenConfig;
use crate::crypto::digest::{constant_time_eq, hmac_bytes, DigestWidth};
use crate::observability::metrics;

/// Lifetime used when neither the caller nor the config supplies one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Token validation and issue failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token must have three segments")]
    MalformedToken,

    #[error("token signature mismatch")]
    SignatureMismatch,

    #[error("token claims could not be decoded: {0}")]
    MalformedClaims(String),

    #[error("token expired at {expired_at}")]
    TokenExpired { expired_at: i64 },

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Issues and validates signed identity tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let ttl = match config.ttl_secs {
            0 => DEFAULT_TTL,
            secs => Duration::from_secs(secs),
        };
        Self {
            secret: config.secret.clone(),
            ttl,
        }
    }

    /// Default lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token. `secret` and `ttl` fall back to the service defaults
    /// when `None`, empty or zero.
    pub fn issue(
        &self,
        subject_id: &str,
        display_name: &str,
        role: &str,
        secret: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<String, TokenError> {
        self.issue_at(subject_id, display_name, role, secret, ttl, unix_timestamp())
    }

    /// Issue a token as of `now` (epoch seconds).
    pub fn issue_at(
        &self,
        subject_id: &str,
        display_name: &str,
        role: &str,
        secret: Option<&str>,
        ttl: Option<Duration>,
        now: i64,
    ) -> Result<String, TokenError> {
        let secret = self.resolve_secret(secret);
        let ttl = self.resolve_ttl(ttl);

        let claims = Claims {
            subject_id: subject_id.to_string(),
            display_name: display_name.to_string(),
            role: role.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(ttl.as_secs() as i64),
        };

        let header_json = serde_json::to_vec(&TokenHeader::default())
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE.encode(header_json),
            URL_SAFE.encode(claims_json)
        );
        let signature = sign_segment(secret, &signing_input);

        metrics::record_token_issued();
        tracing::debug!(subject_id = %subject_id, role = %role, "Token issued");

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Issue a token wrapped in the login response shape.
    pub fn issue_response(
        &self,
        subject_id: &str,
        display_name: &str,
        role: &str,
        ttl: Option<Duration>,
    ) -> Result<TokenResponse, TokenError> {
        let access_token = self.issue(subject_id, display_name, role, None, ttl)?;
        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.resolve_ttl(ttl).as_secs(),
        })
    }

    /// Validate a token against the wall clock.
    pub fn validate(&self, token: &str, secret: Option<&str>) -> Result<Claims, TokenError> {
        self.validate_at(token, secret, unix_timestamp())
    }

    /// Validate a token as of `now` (epoch seconds).
    pub fn validate_at(
        &self,
        token: &str,
        secret: Option<&str>,
        now: i64,
    ) -> Result<Claims, TokenError> {
        let secret = self.resolve_secret(secret);

        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(TokenError::MalformedToken);
        };

        // Signature first: nothing in the payload is trusted before this.
        let signing_input = format!("{header}.{payload}");
        let expected = sign_segment(secret, &signing_input);
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            tracing::warn!("Token signature mismatch");
            return Err(TokenError::SignatureMismatch);
        }

        decode_segment::<TokenHeader>(header)?;
        let claims: Claims = decode_segment(payload)?;

        if claims.is_expired_at(now) {
            tracing::warn!(
                subject_id = %claims.subject_id,
                expires_at = claims.expires_at,
                now,
                "Token expired"
            );
            return Err(TokenError::TokenExpired {
                expired_at: claims.expires_at,
            });
        }

        Ok(claims)
    }

    fn resolve_secret<'a>(&'a self, secret: Option<&'a str>) -> &'a str {
        match secret {
            Some(s) if !s.is_empty() => s,
            _ => &self.secret,
        }
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> Duration {
        match ttl {
            Some(d) if !d.is_zero() => d,
            _ => self.ttl,
        }
    }
}

fn sign_segment(secret: &str, signing_input: &str) -> String {
    URL_SAFE.encode(hmac_bytes(
        DigestWidth::Sha256,
        secret.as_bytes(),
        signing_input.as_bytes(),
    ))
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE
        .decode(segment)
        .map_err(|e| TokenError::MalformedClaims(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::MalformedClaims(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig {
            secret: "test-secret".into(),
            ttl_secs: 3600,
        })
    }

    fn issue(svc: &TokenService) -> String {
        svc.issue_at("42", "alice", "admin", None, None, NOW).unwrap()
    }

    #[test]
    fn test_roundtrip_until_expiry() {
        let svc = service();
        let token = issue(&svc);

        let claims = svc.validate_at(&token, None, NOW).unwrap();
        assert_eq!(claims.subject_id, "42");
        assert_eq!(claims.display_name, "alice");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.issued_at, NOW);
        assert_eq!(claims.expires_at, NOW + 3600);

        // Still valid on the last second
        assert!(svc.validate_at(&token, None, NOW + 3600).is_ok());
        assert_eq!(
            svc.validate_at(&token, None, NOW + 3601),
            Err(TokenError::TokenExpired {
                expired_at: NOW + 3600
            })
        );
    }

    #[test]
    fn test_wall_clock_roundtrip() {
        let svc = service();
        let token = svc.issue("7", "bob", "user", None, None).unwrap();
        let claims = svc.validate(&token, None).unwrap();
        assert_eq!(claims.subject_id, "7");
    }

    #[test]
    fn test_zero_ttl_defaults_to_24_hours() {
        let svc = TokenService::new(&TokenConfig {
            secret: "s".into(),
            ttl_secs: 0,
        });
        assert_eq!(svc.ttl(), DEFAULT_TTL);

        let token = svc
            .issue_at("1", "a", "user", None, Some(Duration::ZERO), NOW)
            .unwrap();
        let claims = svc.validate_at(&token, None, NOW).unwrap();
        assert_eq!(claims.expires_at - claims.issued_at, 86_400);
    }

    #[test]
    fn test_explicit_secret_and_ttl() {
        let svc = service();
        let token = svc
            .issue_at("1", "a", "user", Some("other"), Some(Duration::from_secs(10)), NOW)
            .unwrap();

        assert_eq!(
            svc.validate_at(&token, None, NOW),
            Err(TokenError::SignatureMismatch)
        );
        let claims = svc.validate_at(&token, Some("other"), NOW).unwrap();
        assert_eq!(claims.expires_at, NOW + 10);
    }

    #[test]
    fn test_segment_count() {
        let svc = service();
        assert_eq!(svc.validate_at("a.b", None, NOW), Err(TokenError::MalformedToken));
        assert_eq!(svc.validate_at("a.b.c.d", None, NOW), Err(TokenError::MalformedToken));
        assert_eq!(svc.validate_at("", None, NOW), Err(TokenError::MalformedToken));
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed_claims() {
        let svc = service();
        let header = URL_SAFE.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE.encode(b"not json");
        let input = format!("{header}.{payload}");
        let token = format!("{input}.{}", sign_segment("test-secret", &input));

        assert!(matches!(
            svc.validate_at(&token, None, NOW),
            Err(TokenError::MalformedClaims(_))
        ));
    }

    #[test]
    fn test_accepts_externally_built_padded_token() {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        // Built by hand: padded base64url segments, raw HMAC-SHA256 signature.
        let header = br#"{"alg":"HS256","typ":"JWT"}"#;
        let claims = format!(
            r#"{{"sub":"9","name":"carol","role":"user","iat":{NOW},"exp":{}}}"#,
            NOW + 60
        );
        let input = format!("{}.{}", URL_SAFE.encode(header), URL_SAFE.encode(claims));
        let mut mac = Hmac::<Sha256>::new_from_slice(b"test-secret").unwrap();
        mac.update(input.as_bytes());
        let token = format!("{input}.{}", URL_SAFE.encode(mac.finalize().into_bytes()));
        assert!(token.contains('='));

        let claims = service().validate_at(&token, None, NOW).unwrap();
        assert_eq!(claims.subject_id, "9");
        assert_eq!(claims.display_name, "carol");
        assert_eq!(claims.expires_at, NOW + 60);
    }

    #[test]
    fn test_issued_segments_are_padded() {
        let token = issue(&service());
        let signature = token.rsplit('.').next().unwrap();
        // 32-byte MAC encodes to 44 characters with one pad byte.
        assert_eq!(signature.len(), 44);
        assert!(signature.ends_with('='));
    }

    #[test]
    fn test_issue_response() {
        let svc = service();
        let response = svc.issue_response("1", "a", "user", None).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert!(svc.validate(&response.access_token, None).is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", service());
        assert!(!rendered.contains("test-secret"));
    }

    fn flip(token: &str, segment: usize, index: usize) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[segment] = replace_char(parts[segment].as_bytes(), index);
        parts.join(".")
    }

    // Replace one character with a different base64url character.
    fn replace_char(segment: &[u8], index: usize) -> String {
        let mut out = segment.to_vec();
        let i = index % out.len();
        out[i] = if out[i] == b'A' { b'B' } else { b'A' };
        String::from_utf8(out).unwrap()
    }

    proptest! {
        #[test]
        fn prop_payload_tamper_is_detected(index in 0usize..512) {
            let svc = service();
            let token = flip(&issue(&svc), 1, index);
            prop_assert_eq!(svc.validate_at(&token, None, NOW), Err(TokenError::SignatureMismatch));
        }

        #[test]
        fn prop_signature_tamper_is_detected(index in 0usize..64) {
            let svc = service();
            let token = flip(&issue(&svc), 2, index);
            prop_assert_eq!(svc.validate_at(&token, None, NOW), Err(TokenError::SignatureMismatch));
        }

        #[test]
        fn prop_arbitrary_byte_flip_never_accepts(index in 0usize..512, mask in 1u8..=255) {
            let svc = service();
            let mut bytes = issue(&svc).into_bytes();
            let i = index % bytes.len();
            bytes[i] ^= mask;
            let tampered = String::from_utf8_lossy(&bytes).into_owned();
            prop_assert!(svc.validate_at(&tampered, None, NOW).is_err());
        }
    }
}

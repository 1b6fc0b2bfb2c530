//! HMAC request signatures with a replay window.

use thiserror::Error;

use crate::clock::unix_timestamp;
use crate::crypto::digest::{hmac_hex, verify_hmac_hex, DigestWidth};

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Accepted clock skew, seconds, in either direction.
pub const DEFAULT_WINDOW_SECS: i64 = 300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing X-Signature header")]
    MissingSignature,

    #[error("missing X-Timestamp header")]
    MissingTimestamp,

    #[error("X-Timestamp is not an integer")]
    InvalidTimestamp,

    #[error("timestamp outside replay window (delta {delta}s)")]
    SignatureExpired { delta: i64 },

    #[error("signature mismatch")]
    SignatureInvalid,
}

impl SignatureError {
    pub fn public_message(&self) -> &'static str {
        match self {
            SignatureError::MissingSignature => "missing signature",
            SignatureError::MissingTimestamp => "missing timestamp",
            SignatureError::InvalidTimestamp => "invalid timestamp",
            SignatureError::SignatureExpired { .. } => "signature expired",
            SignatureError::SignatureInvalid => "signature verification failed",
        }
    }
}

/// The parts of a request covered by its signature.
#[derive(Debug, Clone)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    /// Path plus `?query` when present.
    pub url: &'a str,
    pub body: &'a [u8],
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

/// `method ‖ url ‖ body ‖ timestamp`, no separators.
pub fn signing_input(method: &str, url: &str, body: &[u8], timestamp: &str) -> Vec<u8> {
    let mut input = Vec::with_capacity(method.len() + url.len() + body.len() + timestamp.len());
    input.extend_from_slice(method.as_bytes());
    input.extend_from_slice(url.as_bytes());
    input.extend_from_slice(body);
    input.extend_from_slice(timestamp.as_bytes());
    input
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    window_secs: i64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_window(secret, DEFAULT_WINDOW_SECS)
    }

    pub fn with_window(secret: impl Into<String>, window_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            window_secs: window_secs.abs(),
        }
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Lowercase hex HMAC-SHA256 of the signing input.
    pub fn sign(&self, method: &str, url: &str, body: &[u8], timestamp: &str) -> String {
        hmac_hex(
            DigestWidth::Sha256,
            self.secret.as_bytes(),
            &signing_input(method, url, body, timestamp),
        )
    }

    pub fn verify(&self, request: &SignedRequest<'_>) -> Result<(), SignatureError> {
        self.verify_at(request, unix_timestamp())
    }

    /// Verify as of `now` (epoch seconds).
    pub fn verify_at(&self, request: &SignedRequest<'_>, now: i64) -> Result<(), SignatureError> {
        let signature = non_empty(request.signature).ok_or(SignatureError::MissingSignature)?;
        let timestamp = non_empty(request.timestamp).ok_or(SignatureError::MissingTimestamp)?;

        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;

        let delta = now.saturating_sub(ts);
        if delta.abs() > self.window_secs {
            return Err(SignatureError::SignatureExpired { delta });
        }

        let input = signing_input(request.method, request.url, request.body, timestamp);
        if !verify_hmac_hex(DigestWidth::Sha256, self.secret.as_bytes(), &input, signature) {
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                expected = %self.sign(request.method, request.url, request.body, timestamp),
                "Signature mismatch detail"
            );
            return Err(SignatureError::SignatureInvalid);
        }

        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000;

    fn request<'a>(ts: &'a str, sig: &'a str) -> SignedRequest<'a> {
        SignedRequest {
            method: "POST",
            url: "/api/tasks",
            body: br#"{"title":"x"}"#,
            timestamp: Some(ts),
            signature: Some(sig),
        }
    }

    #[test]
    fn test_signing_input_concatenation() {
        let input = signing_input("POST", "/api/tasks", br#"{"title":"x"}"#, "1700000000");
        assert_eq!(input, br#"POST/api/tasks{"title":"x"}1700000000"#.to_vec());
    }

    #[test]
    fn test_sign_is_lowercase_hex() {
        let verifier = SignatureVerifier::new("k");
        let sig = verifier.sign("GET", "/", b"", "1");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_window_boundaries() {
        let verifier = SignatureVerifier::new("secret");
        let ts = T.to_string();
        let sig = verifier.sign("POST", "/api/tasks", br#"{"title":"x"}"#, &ts);
        let req = request(&ts, &sig);

        assert_eq!(verifier.verify_at(&req, T + 300), Ok(()));
        assert_eq!(verifier.verify_at(&req, T - 300), Ok(()));
        assert_eq!(
            verifier.verify_at(&req, T + 301),
            Err(SignatureError::SignatureExpired { delta: 301 })
        );
        assert_eq!(
            verifier.verify_at(&req, T - 301),
            Err(SignatureError::SignatureExpired { delta: -301 })
        );
    }

    #[test]
    fn test_replay_scenario() {
        let verifier = SignatureVerifier::new("secret");
        let ts = T.to_string();
        let sig = verifier.sign("POST", "/api/tasks", br#"{"title":"x"}"#, &ts);
        let req = request(&ts, &sig);

        assert!(verifier.verify_at(&req, T + 100).is_ok());
        let err = verifier.verify_at(&req, T + 400).unwrap_err();
        assert_eq!(err.public_message(), "signature expired");
    }

    #[test]
    fn test_check_order() {
        let verifier = SignatureVerifier::new("secret");
        let mut req = request("not-a-number", "");
        assert_eq!(verifier.verify_at(&req, T), Err(SignatureError::MissingSignature));

        req.signature = Some("abc");
        req.timestamp = None;
        assert_eq!(verifier.verify_at(&req, T), Err(SignatureError::MissingTimestamp));

        req.timestamp = Some("not-a-number");
        assert_eq!(verifier.verify_at(&req, T), Err(SignatureError::InvalidTimestamp));

        let ts = T.to_string();
        req.timestamp = Some(&ts);
        assert_eq!(verifier.verify_at(&req, T), Err(SignatureError::SignatureInvalid));
    }

    #[test]
    fn test_body_and_secret_are_covered() {
        let verifier = SignatureVerifier::new("secret");
        let ts = T.to_string();
        let sig = verifier.sign("POST", "/api/tasks", br#"{"title":"y"}"#, &ts);
        assert_eq!(
            verifier.verify_at(&request(&ts, &sig), T),
            Err(SignatureError::SignatureInvalid)
        );

        let other = SignatureVerifier::new("other");
        let sig = other.sign("POST", "/api/tasks", br#"{"title":"x"}"#, &ts);
        assert_eq!(
            verifier.verify_at(&request(&ts, &sig), T),
            Err(SignatureError::SignatureInvalid)
        );
    }

    #[test]
    fn test_uppercase_hex_is_rejected() {
        let verifier = SignatureVerifier::new("secret");
        let ts = T.to_string();
        let sig = verifier
            .sign("POST", "/api/tasks", br#"{"title":"x"}"#, &ts)
            .to_uppercase();
        assert_eq!(
            verifier.verify_at(&request(&ts, &sig), T),
            Err(SignatureError::SignatureInvalid)
        );
    }
}

//! Identity claims carried inside a signed token.

use serde::{Deserialize, Serialize};

/// Identity facts embedded in a token. Never mutated after issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: String,
    /// Issue time, epoch seconds (UTC).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry time, epoch seconds (UTC).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    /// Valid until `expires_at` has passed; a token is still good at exactly `expires_at`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }

    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.subject_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role.clone(),
        }
    }
}

/// Token header segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Identity attached to an authenticated request for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub display_name: String,
    pub role: String,
}

/// Login response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

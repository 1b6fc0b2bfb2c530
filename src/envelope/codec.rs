//! `{"encrypted": true, "data": "<base64>"}` bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENCRYPTED_FIELD: &str = "encrypted";
pub const DATA_FIELD: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub encrypted: bool,
    pub data: String,
}

impl EncryptedEnvelope {
    pub fn sealed(data: String) -> Self {
        Self {
            encrypted: true,
            data,
        }
    }
}

/// How an inbound body should be treated.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Not an envelope; pass through untouched.
    Plain,
    /// Claims to be encrypted but `data` is missing, not a string or empty.
    Invalid,
    /// Ciphertext to decrypt.
    Sealed(String),
}

/// Classify a request body.
pub fn classify(body: &[u8]) -> Inbound {
    if body.is_empty() {
        return Inbound::Plain;
    }
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return Inbound::Plain;
    };
    if map.get(ENCRYPTED_FIELD) != Some(&Value::Bool(true)) {
        return Inbound::Plain;
    }
    match map.get(DATA_FIELD) {
        Some(Value::String(data)) if !data.is_empty() => Inbound::Sealed(data.clone()),
        _ => Inbound::Invalid,
    }
}

/// True when `body` is a JSON object that is not already an envelope.
pub fn is_sealable(body: &[u8]) -> bool {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map.get(ENCRYPTED_FIELD) != Some(&Value::Bool(true)),
        _ => false,
    }
}

//! Encryption envelope subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path in decrypt_request_paths):
//!     {"encrypted": true, "data": "<base64>"}
//!     → codec.rs (classify body)
//!     → crypto::cipher (decrypt with channel mode)
//!     → plaintext body, Content-Length rewritten
//!
//! Outgoing response (path in encrypt_response_paths, 2xx, JSON object):
//!     → crypto::cipher (encrypt)
//!     → {"encrypted": true, "data": "<base64>"}
//! ```
//!
//! # Design Decisions
//! - Inbound failures reject (400); outbound failures pass plaintext through
//! - One cipher mode per channel; no per-message negotiation
//! - Bodies that do not look like envelopes pass through untouched

pub mod codec;
pub mod middleware;
pub mod patterns;

use axum::http::StatusCode;
use bytes::Bytes;
use thiserror::Error;

use crate::config::EncryptionConfig;
use crate::crypto::{self, CipherMode, CryptoError};
use crate::observability::metrics;

pub use codec::{EncryptedEnvelope, Inbound};
pub use middleware::{decrypt_request, encrypt_response, EnvelopeState};
pub use patterns::PathPatterns;

/// Body-level failures. Shared with the signature guard, which also buffers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("encrypted payload has no usable data field")]
    EncryptedPayloadInvalid,

    #[error("payload decryption failed: {0}")]
    DecryptionFailed(#[source] CryptoError),

    #[error("request body exceeds the configured limit")]
    BodyTooLarge,

    #[error("request body could not be read")]
    BodyUnreadable,
}

impl PayloadError {
    pub fn status(&self) -> StatusCode {
        match self {
            PayloadError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            PayloadError::EncryptedPayloadInvalid => "invalid encrypted payload",
            PayloadError::DecryptionFailed(_) => "payload decryption failed",
            PayloadError::BodyTooLarge => "request body too large",
            PayloadError::BodyUnreadable => "failed to read request body",
        }
    }
}

/// Shared key, channel mode and the paths each direction applies to.
pub struct Envelope {
    key: Vec<u8>,
    mode: CipherMode,
    decrypt_paths: PathPatterns,
    encrypt_paths: PathPatterns,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("mode", &self.mode)
            .field("decrypt_paths", &self.decrypt_paths)
            .field("encrypt_paths", &self.encrypt_paths)
            .finish_non_exhaustive()
    }
}

impl Envelope {
    /// Fails with `InvalidKeySize` unless the key is 16, 24 or 32 bytes.
    pub fn new(
        key: impl Into<Vec<u8>>,
        mode: CipherMode,
        decrypt_paths: PathPatterns,
        encrypt_paths: PathPatterns,
    ) -> Result<Self, CryptoError> {
        let key = key.into();
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(CryptoError::InvalidKeySize(key.len()));
        }
        Ok(Self {
            key,
            mode,
            decrypt_paths,
            encrypt_paths,
        })
    }

    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CryptoError> {
        Self::new(
            config.key.as_bytes(),
            config.mode,
            PathPatterns::new(config.decrypt_request_paths.iter().cloned()),
            PathPatterns::new(config.encrypt_response_paths.iter().cloned()),
        )
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn decrypts(&self, path: &str) -> bool {
        self.decrypt_paths.matches(path)
    }

    pub fn encrypts(&self, path: &str) -> bool {
        self.encrypt_paths.matches(path)
    }

    /// Decrypt an inbound envelope.
    ///
    /// `Ok(None)` means the body is left as is: the path is not configured,
    /// or the body is empty, not JSON, or not marked `encrypted: true`.
    pub fn open_request(&self, path: &str, body: &[u8]) -> Result<Option<Bytes>, PayloadError> {
        if !self.decrypts(path) {
            return Ok(None);
        }
        match codec::classify(body) {
            Inbound::Plain => Ok(None),
            Inbound::Invalid => {
                metrics::record_envelope("inbound", "invalid");
                Err(PayloadError::EncryptedPayloadInvalid)
            }
            Inbound::Sealed(data) => match crypto::decrypt(self.mode, &self.key, &data) {
                Ok(plaintext) => {
                    metrics::record_envelope("inbound", "decrypted");
                    Ok(Some(Bytes::from(plaintext)))
                }
                Err(err) => {
                    metrics::record_envelope("inbound", "failed");
                    Err(PayloadError::DecryptionFailed(err))
                }
            },
        }
    }

    /// Encrypt an outbound body, best effort.
    ///
    /// `None` means the original body should be sent unchanged.
    pub fn seal_response(&self, path: &str, status: StatusCode, body: &[u8]) -> Option<Bytes> {
        if !self.encrypts(path) || !status.is_success() || !codec::is_sealable(body) {
            return None;
        }

        let sealed = crypto::encrypt(self.mode, &self.key, body)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                serde_json::to_vec(&EncryptedEnvelope::sealed(data)).map_err(|e| e.to_string())
            });

        match sealed {
            Ok(bytes) => {
                metrics::record_envelope("outbound", "encrypted");
                Some(Bytes::from(bytes))
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "Response encryption failed, sending plaintext");
                metrics::record_envelope("outbound", "failed");
                None
            }
        }
    }
}

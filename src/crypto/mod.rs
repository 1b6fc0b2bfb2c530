//! Cryptographic primitives shared by every guard.
//!
//! # Data Flow
//! ```text
//! auth::token        → digest.rs (HMAC-SHA256 over header.payload)
//! signature          → digest.rs (HMAC-SHA256 over method+url+body+ts)
//! envelope           → cipher.rs (AES-CBC or AES-GCM, base64 output)
//! credential checks  → password.rs (bcrypt)
//! ```
//!
//! # Design Decisions
//! - Every function here is pure and stateless; no locking required
//! - Keys of 16/24/32 bytes select AES-128/192/256, nothing else is accepted
//! - GCM is preferred; CBC stays for legacy clients
//! - HMAC comparisons are constant-time

pub mod cipher;
pub mod digest;
pub mod password;

use thiserror::Error;

pub use cipher::{decrypt, encrypt, generate_key, CipherMode};
pub use digest::{hash_hex, hmac_hex, verify_hmac_hex, DigestWidth};
pub use password::{hash_password, verify_password, DEFAULT_COST};

/// Errors produced by the primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Key length is not 16, 24 or 32 bytes.
    #[error("invalid key size: {0} bytes (must be 16, 24 or 32)")]
    InvalidKeySize(usize),

    /// Input is not valid base64.
    #[error("ciphertext is not valid base64")]
    InvalidBase64,

    /// Ciphertext is truncated or not block aligned.
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    /// PKCS7 padding did not verify (CBC).
    #[error("invalid padding")]
    InvalidPadding,

    /// Authentication tag did not verify (GCM).
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The cipher refused to encrypt.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Password hashing failed (bad cost factor or hash format).
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

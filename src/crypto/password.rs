//! Adaptive password hashing (bcrypt).

use super::CryptoError;

/// Work factor used when the caller passes 0.
pub const DEFAULT_COST: u32 = 10;

/// Hash `password` with a random salt. A `cost` of 0 selects [`DEFAULT_COST`].
pub fn hash_password(password: &str, cost: u32) -> Result<String, CryptoError> {
    let cost = if cost == 0 { DEFAULT_COST } else { cost };
    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        CryptoError::PasswordHash(e.to_string())
    })
}

/// Check `candidate` against a stored hash. Malformed hashes never verify.
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    bcrypt::verify(candidate, stored_hash).unwrap_or(false)
}

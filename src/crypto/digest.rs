//! Keyed and unkeyed digests, hex encoded.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Digest width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestWidth {
    Sha256,
    Sha512,
}

/// HMAC over `message`, returned as raw bytes.
pub fn hmac_bytes(width: DigestWidth, key: &[u8], message: &[u8]) -> Vec<u8> {
    match width {
        DigestWidth::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        DigestWidth::Sha512 => {
            let mut mac =
                HmacSha512::new_from_slice(key).expect("HMAC can take key of any size");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// HMAC over `message`, lowercase hex.
pub fn hmac_hex(width: DigestWidth, key: &[u8], message: &[u8]) -> String {
    hex::encode(hmac_bytes(width, key, message))
}

/// Recompute the HMAC and compare against `candidate` in constant time.
///
/// Hex case is significant: signers must emit lowercase.
pub fn verify_hmac_hex(width: DigestWidth, key: &[u8], message: &[u8], candidate: &str) -> bool {
    let expected = hmac_hex(width, key, message);
    constant_time_eq(expected.as_bytes(), candidate.as_bytes())
}

/// Unkeyed content digest, lowercase hex.
pub fn hash_hex(width: DigestWidth, data: &[u8]) -> String {
    match width {
        DigestWidth::Sha256 => hex::encode(Sha256::digest(data)),
        DigestWidth::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// Byte equality without early exit. Length mismatch returns false.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

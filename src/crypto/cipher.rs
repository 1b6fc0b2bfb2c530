//! Symmetric encryption: AES-CBC (legacy) and AES-GCM (preferred).
//!
//! Both modes prepend their random IV/nonce to the ciphertext and return the
//! result as standard base64. The two layouts are not interchangeable.

use aes::{Aes128, Aes192, Aes256};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::CryptoError;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// AES block size in bytes (also the CBC IV length).
pub const BLOCK_SIZE: usize = 16;

/// GCM nonce length in bytes.
pub const GCM_NONCE_SIZE: usize = 12;

/// GCM authentication tag length in bytes.
pub const GCM_TAG_SIZE: usize = 16;

/// Cipher mode for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherMode {
    /// AES-CBC with PKCS7 padding, IV prefixed.
    Cbc,
    /// AES-GCM, nonce prefixed.
    #[default]
    Gcm,
}

impl std::fmt::Display for CipherMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CipherMode::Cbc => write!(f, "cbc"),
            CipherMode::Gcm => write!(f, "gcm"),
        }
    }
}

impl std::str::FromStr for CipherMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cbc" => Ok(CipherMode::Cbc),
            "gcm" => Ok(CipherMode::Gcm),
            other => Err(format!("unknown cipher mode: {other}")),
        }
    }
}

/// Encrypt `plaintext` and return base64(iv_or_nonce || ciphertext).
pub fn encrypt(mode: CipherMode, key: &[u8], plaintext: &[u8]) -> Result<String, CryptoError> {
    let raw = match mode {
        CipherMode::Cbc => cbc_encrypt(key, plaintext)?,
        CipherMode::Gcm => match key.len() {
            16 => gcm_seal::<Aes128Gcm>(key, plaintext)?,
            24 => gcm_seal::<Aes192Gcm>(key, plaintext)?,
            32 => gcm_seal::<Aes256Gcm>(key, plaintext)?,
            n => return Err(CryptoError::InvalidKeySize(n)),
        },
    };
    Ok(STANDARD.encode(raw))
}

/// Decode base64 and decrypt with the given mode.
pub fn decrypt(mode: CipherMode, key: &[u8], encoded: &str) -> Result<Vec<u8>, CryptoError> {
    check_key_size(key)?;
    let raw = STANDARD
        .decode(encoded.trim())
        .map_err(|_| CryptoError::InvalidBase64)?;

    match mode {
        CipherMode::Cbc => cbc_decrypt(key, &raw),
        CipherMode::Gcm => match key.len() {
            16 => gcm_open::<Aes128Gcm>(key, &raw),
            24 => gcm_open::<Aes192Gcm>(key, &raw),
            _ => gcm_open::<Aes256Gcm>(key, &raw),
        },
    }
}

/// Generate a random key of 16, 24 or 32 bytes.
pub fn generate_key(size: usize) -> Result<Vec<u8>, CryptoError> {
    let mut key = vec![0u8; size];
    check_key_size(&key)?;
    rand::thread_rng().fill_bytes(&mut key);
    Ok(key)
}

fn check_key_size(key: &[u8]) -> Result<(), CryptoError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CryptoError::InvalidKeySize(n)),
    }
}

fn cbc_encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let invalid = |_| CryptoError::InvalidKeySize(key.len());
    let body = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, &iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, &iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, &iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        n => return Err(CryptoError::InvalidKeySize(n)),
    };

    let mut out = Vec::with_capacity(BLOCK_SIZE + body.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    Ok(out)
}

fn cbc_decrypt(key: &[u8], raw: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if raw.len() < BLOCK_SIZE {
        return Err(CryptoError::MalformedCiphertext);
    }
    let (iv, body) = raw.split_at(BLOCK_SIZE);
    if body.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::MalformedCiphertext);
    }

    let invalid = |_| CryptoError::InvalidKeySize(key.len());
    let result = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<Pkcs7>(body),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<Pkcs7>(body),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<Pkcs7>(body),
        n => return Err(CryptoError::InvalidKeySize(n)),
    };

    result.map_err(|_| CryptoError::InvalidPadding)
}

fn gcm_seal<A>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    A: Aead + AeadCore + KeyInit,
{
    let cipher = A::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize(key.len()))?;
    let nonce = A::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(nonce.len() + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn gcm_open<A>(key: &[u8], raw: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    A: Aead + AeadCore + KeyInit,
{
    if raw.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
        return Err(CryptoError::MalformedCiphertext);
    }
    let cipher = A::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize(key.len()))?;
    let (nonce, sealed) = raw.split_at(GCM_NONCE_SIZE);

    cipher
        .decrypt(aes_gcm::aead::Nonce::<A>::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

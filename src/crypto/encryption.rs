//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `decrypt` splits the nonce back out
//! before decrypting.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! `seal` / `open` wrap the same layout in standard base64, which is the
//! self-contained blob stored for every secret in `secrets.json`.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroizing;

use crate::errors::{Result, StrongboxError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StrongboxError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| StrongboxError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt data that was produced by `encrypt`.
///
/// Expects the first 12 bytes to be the nonce, followed by the ciphertext.
/// The plaintext is returned in a buffer that is wiped when dropped.
pub fn decrypt(key: &[u8], ciphertext_with_nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    // A valid blob holds at least a nonce and a tag, even for empty plaintext.
    if ciphertext_with_nonce.len() < NONCE_LEN + TAG_LEN {
        return Err(StrongboxError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StrongboxError::DecryptionFailed)?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| StrongboxError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt `plaintext` and return `base64(nonce || ciphertext)`.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<String> {
    let raw = encrypt(key, plaintext)?;
    Ok(BASE64.encode(raw))
}

/// Decode and decrypt a blob produced by `seal`.
///
/// Invalid base64, a truncated blob, a wrong key and a tampered blob all
/// fail the same way so callers cannot distinguish them.
pub fn open(key: &[u8], sealed: &str) -> Result<Zeroizing<Vec<u8>>> {
    let raw = BASE64
        .decode(sealed.trim())
        .map_err(|_| StrongboxError::DecryptionFailed)?;
    decrypt(key, &raw)
}

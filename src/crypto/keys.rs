//! The master key: generation, in-memory handling and file encoding.
//!
//! On disk the key is stored as the base64 text of its 32 raw bytes.
//! Raw 32-byte files are accepted on read as well.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Result, StrongboxError};

/// Length of the master key (256 bits).
pub const KEY_LEN: usize = 32;

/// Generate a fresh random 256-bit key from a CSPRNG.
pub fn generate_key() -> MasterKey {
    let mut bytes = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut bytes);
    let key = MasterKey::new(bytes);
    bytes.zeroize();
    key
}

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize, Clone)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to pass to encryption).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Encode the key for the `master.key` file.
    pub fn to_file_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(BASE64.encode(self.bytes).into_bytes())
    }

    /// Parse the contents of a `master.key` file.
    pub fn from_file_bytes(data: &[u8]) -> Result<Self> {
        if data.len() == KEY_LEN {
            let mut bytes = [0u8; KEY_LEN];
            bytes.copy_from_slice(data);
            let key = Self::new(bytes);
            bytes.zeroize();
            return Ok(key);
        }

        let text = std::str::from_utf8(data)
            .map_err(|_| StrongboxError::InvalidMasterKey("not base64 text".into()))?;
        let decoded = Zeroizing::new(
            BASE64
                .decode(text.trim())
                .map_err(|_| StrongboxError::InvalidMasterKey("not valid base64".into()))?,
        );

        if decoded.len() != KEY_LEN {
            return Err(StrongboxError::InvalidMasterKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        let key = Self::new(bytes);
        bytes.zeroize();
        Ok(key)
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;

        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

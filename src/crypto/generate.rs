//! Random secret value generation.
//!
//! Values are drawn uniformly from `CHARSET` using rejection sampling:
//! random bytes at or above the largest multiple of the charset size
//! below 256 are discarded, so every character is equally likely.

use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::{Result, StrongboxError};

/// Printable characters a generated secret is drawn from.
pub const CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+[]{}<>?";

/// Upper bound on a generated secret's length.
pub const MAX_SECRET_LENGTH: usize = 1024;

/// Generate a random secret of `length` characters.
pub fn generate_secret_value(length: usize) -> Result<Zeroizing<String>> {
    if length == 0 || length > MAX_SECRET_LENGTH {
        return Err(StrongboxError::InvalidInput(format!(
            "secret length must be between 1 and {MAX_SECRET_LENGTH}, got {length}"
        )));
    }

    let charset_len = CHARSET.len();
    // Largest multiple of the charset size that fits in a byte.
    let limit = 256 - (256 % charset_len);

    let mut rng = rand::rng();
    let mut out = Zeroizing::new(String::with_capacity(length));
    let mut buf = Zeroizing::new([0u8; 64]);

    while out.len() < length {
        rng.fill_bytes(&mut buf[..]);
        for &b in buf.iter() {
            if usize::from(b) >= limit {
                continue;
            }
            out.push(char::from(CHARSET[usize::from(b) % charset_len]));
            if out.len() == length {
                break;
            }
        }
    }

    Ok(out)
}

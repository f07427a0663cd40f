//! Cryptographic primitives for Strongbox.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption, raw and base64-sealed (`encryption`)
//! - The in-memory `MasterKey` and its on-disk encoding (`keys`)
//! - Random secret value generation (`generate`)

pub mod encryption;
pub mod generate;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, MasterKey, ...};
pub use encryption::{decrypt, encrypt, open, seal};
pub use generate::{generate_secret_value, CHARSET, MAX_SECRET_LENGTH};
pub use keys::{generate_key, MasterKey, KEY_LEN};

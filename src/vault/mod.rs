//! Vault module: the encrypted secret store.
//!
//! This module provides:
//! - `Secret`, `SecretMetadata` and `SecretEntry` types (`secret`)
//! - The versioned `secrets.json` document and legacy migration (`format`)
//! - The lock-guarded `SecretStore` exposing the secret lifecycle (`store`)

pub mod format;
pub mod secret;
pub mod store;

// Re-export the most commonly used items.
pub use format::{CURRENT_VERSION, MASTER_KEY_FILE, SECRETS_FILE};
pub use secret::{Secret, SecretEntry, SecretMetadata};
pub use store::SecretStore;

//! Configuration for Strongbox.
//!
//! `Settings` is the optional `config.json` inside the store directory;
//! `StoreConfig` is what constructors actually receive.

pub mod settings;

pub use settings::{Settings, StoreConfig, DEFAULT_ROTATION_BACKUP_COUNT};

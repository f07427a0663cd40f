pub mod audit;
pub mod backup;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod rotation;
pub mod storage;
pub mod vault;

pub use backup::{BackupInfo, BackupKind, BackupManager, RestoreReport};
pub use cancel::CancelToken;
pub use config::{Settings, StoreConfig};
pub use errors::{Result, StrongboxError};
pub use rotation::{RotationEngine, RotationPhase, RotationReport};
pub use storage::{FsBackend, MemoryBackend, StorageBackend};
pub use vault::{SecretEntry, SecretMetadata, SecretStore};

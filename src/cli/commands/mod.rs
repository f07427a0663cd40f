//! One module per subcommand, each exposing an `execute` function.

pub mod audit_cmd;
pub mod backup;
pub mod backups;
pub mod delete;
pub mod disable;
pub mod enable;
pub mod generate;
pub mod get;
pub mod init;
pub mod list;
pub mod restore;
pub mod restore_secret;
pub mod rotate;
pub mod set;

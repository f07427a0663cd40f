//! Backup directory names.
//!
//! `<kind>-<YYYYMMDD-HHMMSS>[-<seq>]`, where `kind` is `rotate`, `manual`
//! or `pre-restore` and the optional sequence number keeps names unique
//! (and ordered) when several backups are taken within the same second.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout embedded in backup directory names (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Length of a formatted `TIMESTAMP_FORMAT` timestamp.
const TIMESTAMP_LEN: usize = 15;

/// Why a backup was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupKind {
    /// Taken automatically before a master-key rotation. Subject to retention.
    Rotate,
    /// Taken on request, or before a rotation the caller labelled manual.
    Manual,
    /// Safety snapshot of the live state taken before a restore.
    PreRestore,
}

impl BackupKind {
    pub const ALL: [BackupKind; 3] = [
        BackupKind::PreRestore,
        BackupKind::Rotate,
        BackupKind::Manual,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            BackupKind::Rotate => "rotate-",
            BackupKind::Manual => "manual-",
            BackupKind::PreRestore => "pre-restore-",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Rotate => "rotate",
            BackupKind::Manual => "manual",
            BackupKind::PreRestore => "pre-restore",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a backup directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedName {
    pub kind: BackupKind,
    /// Embedded timestamp, or the Unix epoch if it could not be parsed.
    pub timestamp: DateTime<Utc>,
    pub sequence: u32,
}

/// Build a directory name for a backup of `kind` taken at `timestamp`.
pub fn format_name(kind: BackupKind, timestamp: DateTime<Utc>, sequence: u32) -> String {
    let stamp = timestamp.format(TIMESTAMP_FORMAT);
    if sequence == 0 {
        format!("{}{stamp}", kind.prefix())
    } else {
        format!("{}{stamp}-{sequence}", kind.prefix())
    }
}

/// Parse a directory name.
///
/// Returns `None` if the name does not start with a known prefix.  A
/// missing or malformed timestamp is not an error: it yields the epoch.
pub fn parse_name(name: &str) -> Option<ParsedName> {
    let (kind, rest) = BackupKind::ALL
        .iter()
        .find_map(|kind| name.strip_prefix(kind.prefix()).map(|rest| (*kind, rest)))?;

    let (stamp, tail) = if rest.len() >= TIMESTAMP_LEN && rest.is_char_boundary(TIMESTAMP_LEN) {
        rest.split_at(TIMESTAMP_LEN)
    } else {
        (rest, "")
    };

    let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or_default();

    let sequence = tail
        .strip_prefix('-')
        .and_then(|seq| seq.parse().ok())
        .unwrap_or(0);

    Some(ParsedName {
        kind,
        timestamp,
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_and_parse_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 59).unwrap();
        let name = format_name(BackupKind::Rotate, ts, 0);
        assert_eq!(name, "rotate-20240309-140559");

        let parsed = parse_name(&name).unwrap();
        assert_eq!(parsed.kind, BackupKind::Rotate);
        assert_eq!(parsed.timestamp, ts);
        assert_eq!(parsed.sequence, 0);
    }

    #[test]
    fn sequence_suffix_is_parsed() {
        let parsed = parse_name("manual-20240309-140559-3").unwrap();
        assert_eq!(parsed.kind, BackupKind::Manual);
        assert_eq!(parsed.sequence, 3);
    }

    #[test]
    fn pre_restore_prefix_is_recognised() {
        let parsed = parse_name("pre-restore-20240309-140559").unwrap();
        assert_eq!(parsed.kind, BackupKind::PreRestore);
    }

    #[test]
    fn bad_timestamp_yields_epoch() {
        let parsed = parse_name("rotate-garbage").unwrap();
        assert_eq!(parsed.timestamp, DateTime::<Utc>::default());

        let parsed = parse_name("rotate-").unwrap();
        assert_eq!(parsed.timestamp, DateTime::<Utc>::default());
    }

    #[test]
    fn unknown_prefix_is_ignored() {
        assert!(parse_name("snapshot-20240309-140559").is_none());
        assert!(parse_name(".DS_Store").is_none());
    }
}

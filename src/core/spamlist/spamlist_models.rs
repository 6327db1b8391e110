// Spam list domain models - identities, lookup results and the persisted snapshot.
//
// These are pure domain types with no HTTP or Telegram dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric user identifier on the chat platform.
pub type UserId = i64;

/// Result of checking one user against the spam list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    /// The user is a known spammer.
    ///
    /// `from_local` is true when the user was already in the in-memory set and
    /// false when the remote authority confirmed it just now (the caller should
    /// add the user to the registry).
    Known { from_local: bool },
    /// Neither the local set nor the remote authority know this user
    Unknown,
    /// The remote lookup could not be completed. Callers treat this as "not spam".
    LookupFailed(String),
}

impl CheckResult {
    /// Whether the user should be moderated.
    #[cfg(test)]
    pub fn is_spam(&self) -> bool {
        matches!(self, CheckResult::Known { .. })
    }
}

/// The spam list as it is written to disk:
/// `{ "user_ids": [1, 2, 3], "date": "2024-01-01T00:00:00Z" }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpamListSnapshot {
    #[serde(default)]
    pub user_ids: Vec<UserId>,
    /// When the list was last refreshed. Older snapshots may not carry it.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Where the registry got its initial contents from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    RemoteExport,
    LocalSnapshot,
    /// Both the export and the snapshot failed - degraded mode
    Empty,
}

impl std::fmt::Display for SeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedSource::RemoteExport => write!(f, "remote export"),
            SeedSource::LocalSnapshot => write!(f, "local snapshot"),
            SeedSource::Empty => write!(f, "empty"),
        }
    }
}

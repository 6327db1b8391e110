// Spam registry - core business logic for the known-spammer set.
//
// This service handles:
// - Seeding from the remote denylist export, with the local snapshot as fallback
// - Membership checks (local set first, then one remote lookup)
// - Growing the set as new spammers are confirmed
// - Writing the set back to disk on shutdown
//
// NO Telegram or HTTP dependencies here - the remote authority and the snapshot
// file are reached through the ports below.

use super::spamlist_models::{CheckResult, SeedSource, SpamListSnapshot, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::RwLock;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SpamListError {
    #[error("Denylist request failed: {0}")]
    Request(String),

    #[error("Malformed denylist response: {0}")]
    MalformedResponse(String),

    #[error("Malformed export row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Unable to load spam list snapshot: {0}")]
    SnapshotLoad(String),

    #[error("Unable to persist spam list: {0}")]
    PersistFailed(String),

    #[error("Spam list bootstrap failed (export: {remote}; snapshot: {snapshot})")]
    BootstrapFailed { remote: String, snapshot: String },
}

// ============================================================================
// PORTS
// ============================================================================

/// The remote denylist authority (CAS).
#[async_trait]
pub trait DenylistSource: Send + Sync {
    /// Download and parse the bulk export.
    ///
    /// Rows that are not a numeric identity are skipped, not fatal.
    async fn fetch_all(&self) -> Result<Vec<UserId>, SpamListError>;

    /// Ask the remote authority whether a single user is listed.
    async fn lookup_one(&self, user_id: UserId) -> Result<bool, SpamListError>;
}

/// Durable storage for the spam list between restarts.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<SpamListSnapshot, SpamListError>;

    /// Replace the stored snapshot. A crash mid-write must not leave a
    /// half-written snapshot behind.
    async fn save(&self, snapshot: &SpamListSnapshot) -> Result<(), SpamListError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

struct RegistryState {
    known: HashSet<UserId>,
    last_refreshed: DateTime<Utc>,
}

/// In-memory set of known spam accounts, shared by every moderation task.
///
/// The set only ever grows during the process lifetime. A single reader/writer
/// lock guards it and is never held across a network call.
pub struct SpamRegistry<S: DenylistSource, P: SnapshotStore> {
    source: S,
    snapshots: P,
    state: RwLock<RegistryState>,
    seeded_from: SeedSource,
}

impl<S: DenylistSource, P: SnapshotStore> SpamRegistry<S, P> {
    /// Build the registry, preferring the remote export over the local snapshot.
    ///
    /// Never fails: if both sources are unavailable the registry starts empty and
    /// every check falls through to a per-user remote lookup.
    pub async fn bootstrap(source: S, snapshots: P) -> Self {
        let (known, last_refreshed, seeded_from) = match Self::seed(&source, &snapshots).await
        {
            Ok(seed) => seed,
            Err(e) => {
                tracing::warn!(error = %e, "Starting with an empty spam list");
                (HashSet::new(), Utc::now(), SeedSource::Empty)
            }
        };

        tracing::info!(
            count = known.len(),
            source = %seeded_from,
            "Spam list imported"
        );

        Self {
            source,
            snapshots,
            state: RwLock::new(RegistryState {
                known,
                last_refreshed,
            }),
            seeded_from,
        }
    }

    /// Export first, snapshot second.
    async fn seed(
        source: &S,
        snapshots: &P,
    ) -> Result<(HashSet<UserId>, DateTime<Utc>, SeedSource), SpamListError> {
        let remote_error = match source.fetch_all().await {
            Ok(ids) => {
                return Ok((ids.into_iter().collect(), Utc::now(), SeedSource::RemoteExport))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unable to import spam list export, trying local snapshot");
                e
            }
        };

        match snapshots.load().await {
            Ok(snapshot) => Ok((
                snapshot.user_ids.into_iter().collect(),
                snapshot.date.unwrap_or_else(Utc::now),
                SeedSource::LocalSnapshot,
            )),
            Err(e) => Err(SpamListError::BootstrapFailed {
                remote: remote_error.to_string(),
                snapshot: e.to_string(),
            }),
        }
    }

    /// Check a user against the local set, then against the remote authority.
    ///
    /// The lock is only held for the local probe. A failed remote lookup yields
    /// `LookupFailed`, which callers must treat as "not spam".
    pub async fn check(&self, user_id: UserId) -> CheckResult {
        if self.state.read().await.known.contains(&user_id) {
            return CheckResult::Known { from_local: true };
        }

        match self.source.lookup_one(user_id).await {
            Ok(true) => CheckResult::Known { from_local: false },
            Ok(false) => CheckResult::Unknown,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Unable to check user");
                CheckResult::LookupFailed(e.to_string())
            }
        }
    }

    /// Add a confirmed spammer. Returns `false` if the user was already known.
    pub async fn add(&self, user_id: UserId) -> bool {
        self.state.write().await.known.insert(user_id)
    }

    #[cfg(test)]
    pub async fn contains(&self, user_id: UserId) -> bool {
        self.state.read().await.known.contains(&user_id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.known.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.known.is_empty()
    }

    /// When the contents were last imported from the remote export, or the date
    /// carried by the snapshot they were loaded from.
    pub async fn last_refreshed(&self) -> DateTime<Utc> {
        self.state.read().await.last_refreshed
    }

    pub fn seeded_from(&self) -> SeedSource {
        self.seeded_from
    }

    /// Current contents, sorted so the file diffs cleanly between runs.
    ///
    /// The date is the last refresh, not the time of the call: saving a stale
    /// list must not make it look fresh.
    pub async fn snapshot(&self) -> SpamListSnapshot {
        let state = self.state.read().await;
        let mut user_ids: Vec<UserId> = state.known.iter().copied().collect();
        let date = state.last_refreshed;
        drop(state); // Sorting doesn't need the lock
        user_ids.sort_unstable();

        SpamListSnapshot {
            user_ids,
            date: Some(date),
        }
    }

    /// Write the whole set to the snapshot store.
    pub async fn persist(&self) -> Result<(), SpamListError> {
        let snapshot = self.snapshot().await;
        let count = snapshot.user_ids.len();
        self.snapshots.save(&snapshot).await?;
        tracing::info!(count, "Spam list saved");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

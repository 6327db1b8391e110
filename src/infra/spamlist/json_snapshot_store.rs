use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::spamlist::{SnapshotStore, SpamListError, SpamListSnapshot};

/// Spam list snapshot kept in a single JSON file.
///
/// Writes go to a sibling temp file first and are then renamed over the real
/// one, so a crash can't leave a half-written snapshot.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<SpamListSnapshot, SpamListError> {
        let text = fs::read_to_string(&self.path).await.map_err(|e| {
            SpamListError::SnapshotLoad(format!("{}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&text).map_err(|e| {
            SpamListError::SnapshotLoad(format!("{}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, snapshot: &SpamListSnapshot) -> Result<(), SpamListError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SpamListError::PersistFailed(e.to_string()))?;
            }
        }

        let text = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SpamListError::PersistFailed(e.to_string()))?;

        let tmp = self.temp_path();
        fs::write(&tmp, text)
            .await
            .map_err(|e| SpamListError::PersistFailed(format!("{}: {}", tmp.display(), e)))?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            // Don't leave the temp file next to the old snapshot
            let _ = fs::remove_file(&tmp).await;
            return Err(SpamListError::PersistFailed(format!(
                "{}: {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("nested").join("cas.json"));
        let snapshot = SpamListSnapshot {
            user_ids: vec![1, 2, 3],
            date: Some(Utc::now()),
        };

        store.save(&snapshot).await.unwrap();

        // Reload from a fresh store
        let reloaded = JsonSnapshotStore::new(dir.path().join("nested").join("cas.json"))
            .load()
            .await
            .unwrap();
        assert_eq!(reloaded, snapshot);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("cas.json"));

        store
            .save(&SpamListSnapshot {
                user_ids: vec![1],
                date: None,
            })
            .await
            .unwrap();
        store
            .save(&SpamListSnapshot {
                user_ids: vec![1, 2],
                date: None,
            })
            .await
            .unwrap();

        assert_eq!(store.load().await.unwrap().user_ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_load_accepts_snapshot_without_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cas.json");
        std::fs::write(&path, r#"{"user_ids":[7,8,9]}"#).unwrap();

        let snapshot = JsonSnapshotStore::new(&path).load().await.unwrap();
        assert_eq!(snapshot.user_ids, vec![7, 8, 9]);
        assert_eq!(snapshot.date, None);
    }

    #[tokio::test]
    async fn test_load_missing_or_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let missing = JsonSnapshotStore::new(dir.path().join("missing.json"));
        assert!(matches!(
            missing.load().await,
            Err(SpamListError::SnapshotLoad(_))
        ));

        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{\"user_ids\": [1, 2").unwrap();
        assert!(matches!(
            JsonSnapshotStore::new(&path).load().await,
            Err(SpamListError::SnapshotLoad(_))
        ));
    }

    #[tokio::test]
    async fn test_save_writes_pretty_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cas.json");
        let store = JsonSnapshotStore::new(&path);

        store
            .save(&SpamListSnapshot {
                user_ids: vec![1, 2],
                date: None,
            })
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"user_ids\""));
    }

    #[tokio::test]
    async fn test_save_under_a_regular_file_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = JsonSnapshotStore::new(blocker.join("cas.json"));

        let result = store
            .save(&SpamListSnapshot {
                user_ids: vec![1],
                date: None,
            })
            .await;

        assert!(matches!(result, Err(SpamListError::PersistFailed(_))));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory can't be replaced by a file
        let target = dir.path().join("cas.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();
        let store = JsonSnapshotStore::new(&target);

        let result = store
            .save(&SpamListSnapshot {
                user_ids: vec![1],
                date: None,
            })
            .await;

        assert!(matches!(result, Err(SpamListError::PersistFailed(_))));
        assert!(!store.temp_path().exists());
        assert!(target.join("keep").exists());
    }
}

use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::conf::PoolConfig;
use crate::cryptography::pre_params::{unix_seconds, PreParams};
use crate::error::Error;

pub const POOL_FILE_NAME: &str = "prime_pool.json";

#[derive(Serialize)]
struct PoolFile<'a> {
    pre_params: &'a [PreParams],
    saved_at: i64,
    /// Informational copy of the active configuration; never re-applied on
    /// load.
    config: &'a PoolConfig,
}

/// Single-file persistence for the pool. One service instance owns the file
/// exclusively; saves are atomic from a reader's perspective.
pub struct PoolStore {
    pool_file: PathBuf,
}

impl PoolStore {
    pub fn new(pool_file: PathBuf) -> Self {
        Self { pool_file }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.pool_file
    }

    /// Load the persisted pool. An absent or unreadable file yields an empty
    /// pool; entries that fail to decode are dropped with a warning. Never an
    /// error to the caller.
    pub async fn load(&self) -> Vec<PreParams> {
        let bytes = match tokio::fs::read(&self.pool_file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    file = %self.pool_file.display(),
                    "pool file does not exist, starting with empty pool"
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(file = %self.pool_file.display(), "failed to read pool file: {e}");
                return Vec::new();
            }
        };

        let document: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(file = %self.pool_file.display(), "failed to parse pool file: {e}");
                return Vec::new();
            }
        };

        let entries = match document.get("pre_params").and_then(|v| v.as_array()) {
            Some(entries) => entries,
            None => {
                tracing::warn!(
                    file = %self.pool_file.display(),
                    "pool file has no pre_params array, starting with empty pool"
                );
                return Vec::new();
            }
        };

        let mut loaded = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for entry in entries {
            match serde_json::from_value::<PreParams>(entry.clone()) {
                Ok(params) => loaded.push(params),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("dropping undecodable pool entry: {e}");
                }
            }
        }

        tracing::info!(
            file = %self.pool_file.display(),
            loaded = loaded.len(),
            skipped,
            "pool loaded from disk"
        );
        loaded
    }

    /// Persist a snapshot. The file is written to a sibling temp path with
    /// mode 0600 and renamed over the target, so a concurrent load never
    /// sees a torn file.
    pub async fn save(&self, snapshot: &[PreParams], config: &PoolConfig) -> Result<(), Error> {
        let document = PoolFile {
            pre_params: snapshot,
            saved_at: unix_seconds(SystemTime::now()),
            config,
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = self.pool_file.with_extension("json.tmp");
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.pool_file).await?;
        tracing::info!(
            file = %self.pool_file.display(),
            size = snapshot.len(),
            "pool saved to disk"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pre_params;

    fn store_in(dir: &std::path::Path) -> PoolStore {
        PoolStore::new(dir.join(POOL_FILE_NAME))
    }

    #[tokio::test]
    async fn load_of_absent_file_yields_empty_pool() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(dir.path()).load().await.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let snapshot = vec![test_pre_params(1), test_pre_params(2), test_pre_params(3)];

        store.save(&snapshot, &PoolConfig::default()).await.unwrap();
        let loaded = store.load().await;
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&[test_pre_params(1)], &PoolConfig::default())
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(POOL_FILE_NAME)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pool_file_is_owner_readable_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&[test_pre_params(1)], &PoolConfig::default())
            .await
            .unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn corrupt_entries_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let snapshot = vec![test_pre_params(1), test_pre_params(2), test_pre_params(3)];
        store.save(&snapshot, &PoolConfig::default()).await.unwrap();

        // Strip n_tilde from the middle entry.
        let mut document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        document["pre_params"][1]
            .as_object_mut()
            .unwrap()
            .remove("n_tilde");
        std::fs::write(store.path(), serde_json::to_vec(&document).unwrap()).unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded, vec![test_pre_params(1), test_pre_params(3)]);
    }

    #[tokio::test]
    async fn unparsable_file_yields_empty_pool() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(store.path(), b"{ not json").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn saved_file_carries_timestamp_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&[test_pre_params(1)], &PoolConfig::default())
            .await
            .unwrap();

        let document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert!(document["saved_at"].as_i64().unwrap() > 0);
        assert_eq!(
            document["config"]["min_size"].as_u64().unwrap() as usize,
            PoolConfig::default().min_size
        );
    }
}

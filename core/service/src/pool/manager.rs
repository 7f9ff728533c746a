use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::conf::PoolConfig;
use crate::cryptography::generator::PreParamsGenerator;
use crate::cryptography::pre_params::PreParams;
use crate::error::Error;
use crate::pool::core::{PoolCore, PoolSnapshot};
use crate::pool::refill;
use crate::pool::store::{PoolStore, POOL_FILE_NAME};

/// Largest batch a single request may consume.
pub const MAX_BATCH_SIZE: u32 = 100;

/// State shared between the facade, the refill worker and scheduled saves.
pub(crate) struct PoolInner {
    pub(crate) config: PoolConfig,
    pub(crate) core: PoolCore,
    pub(crate) store: PoolStore,
    pub(crate) generator: Arc<dyn PreParamsGenerator>,
    pub(crate) refill_nudge: Notify,
    pub(crate) cancel: CancellationToken,
    pub(crate) tracker: TaskTracker,
    pub(crate) started_at: Instant,
    is_saving: AtomicBool,
}

impl PoolInner {
    /// Persist the current snapshot. Concurrent callers coalesce: whoever
    /// loses the flag race becomes a no-op, which is sound because every save
    /// writes the state current at flush time.
    pub(crate) async fn save_now(&self) {
        if self
            .is_saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let snapshot = self.core.items_snapshot().await;
        if let Err(e) = self.store.save(&snapshot, &self.config).await {
            tracing::warn!("failed to save pool to disk: {e}");
        }
        self.is_saving.store(false, Ordering::Release);
    }

    pub(crate) fn schedule_save(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.tracker.spawn(async move { inner.save_now().await });
    }
}

/// Facade over the warm pool: construction loads the persisted state,
/// `start` spawns background refill, `get_pre_params`/`status` serve
/// consumers, `stop` drains and saves.
pub struct PoolManager {
    inner: Arc<PoolInner>,
}

impl PoolManager {
    pub async fn new(config: PoolConfig, generator: Arc<dyn PreParamsGenerator>) -> Self {
        if let Err(e) = tokio::fs::create_dir_all(&config.pool_dir).await {
            tracing::warn!(
                dir = %config.pool_dir.display(),
                "failed to create pool directory, saves will fail: {e}"
            );
        }

        let store = PoolStore::new(config.pool_dir.join(POOL_FILE_NAME));
        let mut loaded = store.load().await;
        if loaded.len() > config.max_size {
            tracing::warn!(
                loaded = loaded.len(),
                max_size = config.max_size,
                "pool file exceeds max_size, keeping oldest entries"
            );
            loaded.truncate(config.max_size);
        }

        Self {
            inner: Arc::new(PoolInner {
                core: PoolCore::new(config.clone(), loaded),
                store,
                config,
                generator,
                refill_nudge: Notify::new(),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                started_at: Instant::now(),
                is_saving: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Spawn the background refill worker when enabled. The worker's first
    /// tick covers the initial fill of a cold pool.
    pub fn start(&self) {
        tracing::info!("starting pre-params pool manager");
        if self.inner.config.background_enabled {
            let inner = Arc::clone(&self.inner);
            self.inner.tracker.spawn(refill::run_background(inner));
        }
    }

    /// Cancel background work, wait for in-flight generator tasks to observe
    /// the token, then persist the final state synchronously.
    pub async fn stop(&self) {
        tracing::info!("stopping pre-params pool manager");
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.save_now().await;
    }

    /// Retrieve and consume `count` parameter sets: the warm pool covers
    /// what it can (oldest first) and the deficit is generated synchronously.
    /// All-or-nothing: if any synchronous generation fails the whole call
    /// fails and the sets already taken from the pool are consumed.
    pub async fn get_pre_params(&self, count: u32) -> Result<Vec<PreParams>, Error> {
        if count > MAX_BATCH_SIZE {
            return Err(Error::InvalidArgument(format!(
                "count must be between 1 and {MAX_BATCH_SIZE}, got {count}"
            )));
        }
        let count = count.max(1) as usize;

        let (mut result, shortfall) = self.inner.core.take(count).await;
        let remaining = self.inner.core.depth().await;
        if !result.is_empty() {
            tracing::info!(taken = result.len(), remaining, "served pre-params from pool");
        }
        if remaining <= self.inner.config.refill_threshold {
            self.inner.refill_nudge.notify_one();
        }

        if shortfall > 0 {
            tracing::warn!(shortfall, "pool insufficient, generating synchronously");
            for _ in 0..shortfall {
                let generator = Arc::clone(&self.inner.generator);
                let token = self.inner.cancel.clone();
                let generated =
                    tokio::task::spawn_blocking(move || generator.generate(&token))
                        .await
                        .map_err(|e| Error::GenerationFailure(e.to_string()))??;
                result.push(generated);
            }
            self.inner.core.record_sync_generated(shortfall as u64).await;
        }

        if self.inner.config.auto_save {
            self.inner.schedule_save();
        }
        Ok(result)
    }

    pub async fn status(&self) -> PoolSnapshot {
        self.inner.core.snapshot().await
    }

    /// Direct save, exercised by shutdown paths and tests.
    pub async fn save(&self) {
        self.inner.save_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryptography::generator::MockPreParamsGenerator;
    use crate::testing::{test_pre_params, CountingGenerator, FailingGenerator};

    fn test_config(dir: &std::path::Path) -> PoolConfig {
        PoolConfig {
            min_size: 2,
            max_size: 4,
            refill_threshold: 1,
            pool_dir: dir.to_path_buf(),
            auto_save: false,
            background_enabled: false,
            ..PoolConfig::default()
        }
    }

    #[tokio::test]
    async fn count_above_limit_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PoolManager::new(test_config(dir.path()), Arc::new(CountingGenerator::default()))
                .await;
        assert!(matches!(
            manager.get_pre_params(101).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn zero_count_behaves_as_one() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PoolManager::new(test_config(dir.path()), Arc::new(CountingGenerator::default()))
                .await;
        let params = manager.get_pre_params(0).await.unwrap();
        assert_eq!(params.len(), 1);
    }

    #[tokio::test]
    async fn empty_pool_generates_exactly_count_and_updates_counters() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PoolManager::new(test_config(dir.path()), Arc::new(CountingGenerator::default()))
                .await;

        let params = manager.get_pre_params(3).await.unwrap();
        assert_eq!(params.len(), 3);

        let snapshot = manager.status().await;
        assert_eq!(snapshot.total_served, 3);
        assert_eq!(snapshot.total_generated, 3);
        assert_eq!(snapshot.available, 0);
    }

    #[tokio::test]
    async fn sync_generation_failure_fails_whole_call() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PoolManager::new(test_config(dir.path()), Arc::new(FailingGenerator)).await;

        // Seed the pool so the request is partially coverable.
        manager.inner.core.deposit(test_pre_params(1)).await;
        let err = manager.get_pre_params(3).await.unwrap_err();
        assert!(matches!(err, Error::GenerationFailure(_)));

        // The taken item is consumed, not returned to the pool.
        let snapshot = manager.status().await;
        assert_eq!(snapshot.available, 0);
        assert_eq!(snapshot.total_served, 1);
    }

    #[tokio::test]
    async fn mocked_generator_covers_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = MockPreParamsGenerator::new();
        generator
            .expect_generate()
            .times(2)
            .returning(|_| Ok(test_pre_params(42)));

        let manager = PoolManager::new(test_config(dir.path()), Arc::new(generator)).await;
        let params = manager.get_pre_params(2).await.unwrap();
        assert_eq!(params, vec![test_pre_params(42), test_pre_params(42)]);
    }
}

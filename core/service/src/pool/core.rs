use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use tokio::sync::RwLock;

use crate::conf::PoolConfig;
use crate::cryptography::pre_params::PreParams;

/// Consistent view of the pool at one serialization point.
#[derive(Clone, Debug)]
pub struct PoolSnapshot {
    pub available: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub refill_threshold: usize,
    pub is_refilling: bool,
    pub total_generated: u64,
    pub total_served: u64,
    pub oldest: Option<SystemTime>,
    pub newest: Option<SystemTime>,
    pub last_refill: Option<SystemTime>,
}

struct PoolState {
    items: VecDeque<PreParams>,
    total_generated: u64,
    total_served: u64,
    last_refill: Option<SystemTime>,
}

/// In-memory ordered pool with FIFO consumption. All mutation goes through
/// the single lock; the refill and save flags are CAS gates beside it.
pub struct PoolCore {
    config: PoolConfig,
    state: RwLock<PoolState>,
    is_refilling: AtomicBool,
}

impl PoolCore {
    pub fn new(config: PoolConfig, initial: Vec<PreParams>) -> Self {
        Self {
            config,
            state: RwLock::new(PoolState {
                items: initial.into(),
                total_generated: 0,
                total_served: 0,
                last_refill: None,
            }),
            is_refilling: AtomicBool::new(false),
        }
    }

    /// Remove up to `n` items from the front, oldest first. Returns the
    /// items and how many more the caller still needs.
    pub async fn take(&self, n: usize) -> (Vec<PreParams>, usize) {
        let mut state = self.state.write().await;
        let take = n.min(state.items.len());
        let taken: Vec<PreParams> = state.items.drain(..take).collect();
        state.total_served += taken.len() as u64;
        (taken, n - take)
    }

    /// Append one generated set; items beyond `max_size` are discarded but
    /// still counted as generated (the work happened).
    pub async fn deposit(&self, params: PreParams) -> bool {
        let mut state = self.state.write().await;
        state.total_generated += 1;
        if state.items.len() < self.config.max_size {
            state.items.push_back(params);
            true
        } else {
            false
        }
    }

    /// Account for sets generated synchronously for a consumer: they were
    /// both produced and handed out without ever touching `items`.
    pub async fn record_sync_generated(&self, n: u64) {
        let mut state = self.state.write().await;
        state.total_generated += n;
        state.total_served += n;
    }

    pub async fn depth(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Clone of the current items for persistence, taken outside any disk
    /// I/O.
    pub async fn items_snapshot(&self) -> Vec<PreParams> {
        self.state.read().await.items.iter().cloned().collect()
    }

    pub async fn mark_refilled(&self) {
        self.state.write().await.last_refill = Some(SystemTime::now());
    }

    /// True iff this caller won the false → true transition.
    pub fn try_begin_refill(&self) -> bool {
        self.is_refilling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_refill(&self) {
        self.is_refilling.store(false, Ordering::Release);
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.read().await;
        PoolSnapshot {
            available: state.items.len(),
            min_size: self.config.min_size,
            max_size: self.config.max_size,
            refill_threshold: self.config.refill_threshold,
            is_refilling: self.is_refilling.load(Ordering::Acquire),
            total_generated: state.total_generated,
            total_served: state.total_served,
            oldest: state.items.front().map(|p| p.generated_at),
            newest: state.items.back().map(|p| p.generated_at),
            last_refill: state.last_refill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pre_params;

    fn config(min: usize, max: usize, threshold: usize) -> PoolConfig {
        PoolConfig {
            min_size: min,
            max_size: max,
            refill_threshold: threshold,
            ..PoolConfig::default()
        }
    }

    #[tokio::test]
    async fn take_is_fifo_and_reports_shortfall() {
        let core = PoolCore::new(
            config(3, 5, 1),
            vec![test_pre_params(1), test_pre_params(2), test_pre_params(3)],
        );

        let (taken, shortfall) = core.take(2).await;
        assert_eq!(shortfall, 0);
        assert_eq!(taken, vec![test_pre_params(1), test_pre_params(2)]);

        let (taken, shortfall) = core.take(4).await;
        assert_eq!(taken, vec![test_pre_params(3)]);
        assert_eq!(shortfall, 3);
        assert_eq!(core.depth().await, 0);

        let snapshot = core.snapshot().await;
        assert_eq!(snapshot.total_served, 3);
    }

    #[tokio::test]
    async fn deposit_respects_max_size_but_counts_everything() {
        let core = PoolCore::new(config(2, 2, 1), Vec::new());
        for i in 0..5 {
            let kept = core.deposit(test_pre_params(i)).await;
            assert_eq!(kept, i < 2);
        }
        let snapshot = core.snapshot().await;
        assert_eq!(snapshot.available, 2);
        assert_eq!(snapshot.total_generated, 5);
    }

    #[tokio::test]
    async fn concurrent_deposits_never_exceed_max_size() {
        let core = std::sync::Arc::new(PoolCore::new(config(2, 2, 1), Vec::new()));
        let mut handles = Vec::new();
        for i in 0..5u64 {
            let core = std::sync::Arc::clone(&core);
            handles.push(tokio::spawn(
                async move { core.deposit(test_pre_params(i)).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snapshot = core.snapshot().await;
        assert_eq!(snapshot.available, 2);
        assert_eq!(snapshot.total_generated, 5);
    }

    #[tokio::test]
    async fn refill_flag_is_exclusive() {
        let core = PoolCore::new(config(2, 4, 1), Vec::new());
        assert!(core.try_begin_refill());
        assert!(!core.try_begin_refill());
        core.end_refill();
        assert!(core.try_begin_refill());
        core.end_refill();
    }

    #[tokio::test]
    async fn snapshot_exposes_item_timestamps() {
        let core = PoolCore::new(config(2, 4, 1), Vec::new());
        let snapshot = core.snapshot().await;
        assert!(snapshot.oldest.is_none());
        assert!(snapshot.newest.is_none());

        core.deposit(test_pre_params(1)).await;
        core.deposit(test_pre_params(2)).await;
        let snapshot = core.snapshot().await;
        assert_eq!(snapshot.oldest, Some(test_pre_params(1).generated_at));
        assert_eq!(snapshot.newest, Some(test_pre_params(2).generated_at));
    }

    #[tokio::test]
    async fn served_never_exceeds_generated_plus_loaded() {
        let loaded = vec![test_pre_params(1), test_pre_params(2)];
        let loaded_count = loaded.len() as u64;
        let core = PoolCore::new(config(2, 4, 1), loaded);
        core.deposit(test_pre_params(3)).await;
        core.take(3).await;
        core.record_sync_generated(2).await;

        let snapshot = core.snapshot().await;
        assert!(snapshot.total_served <= snapshot.total_generated + loaded_count);
    }
}

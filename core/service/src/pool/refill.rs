use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::error::Error;
use crate::pool::manager::PoolInner;

/// Hosts with at most this many cores get a single generation worker no
/// matter what the configuration asks for, leaving CPU for co-resident work.
const CPU_GOVERNOR_CORE_LIMIT: usize = 3;

/// Pause between generations within one worker, yielding CPU between the
/// long prime searches.
const WORKER_BACKOFF: Duration = Duration::from_secs(1);

/// Worker-count policy for one refill round.
pub(crate) fn effective_workers(max_concurrent: usize, cores: usize, needed: usize) -> usize {
    let cap = if cores <= CPU_GOVERNOR_CORE_LIMIT {
        1
    } else {
        max_concurrent.max(1)
    };
    cap.min(needed).max(1)
}

/// Background maintenance loop: a periodic tick plus best-effort nudges from
/// the request path, both funneling into exclusive refill rounds.
pub(crate) async fn run_background(inner: Arc<PoolInner>) {
    let interval = inner.config.refill_interval();
    tracing::info!(?interval, "started background pre-params generation");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => {
                tracing::info!("background pre-params generation stopped");
                return;
            }
            _ = ticker.tick() => {
                let depth = inner.core.depth().await;
                if depth <= inner.config.refill_threshold {
                    tracing::info!(depth, "background refill triggered");
                    refill_round(&inner).await;
                }
            }
            _ = inner.refill_nudge.notified() => {
                refill_round(&inner).await;
            }
        }
    }
}

/// One refill round: fill from the current depth up to `min_size` with a
/// bounded set of concurrent generator workers. At most one round runs at a
/// time; losers of the flag race return immediately.
pub(crate) async fn refill_round(inner: &Arc<PoolInner>) {
    let warmup = inner.config.warmup();
    if inner.started_at.elapsed() < warmup {
        tracing::info!("skipping pre-params generation during warm-up window");
        return;
    }

    if !inner.core.try_begin_refill() {
        return;
    }

    let depth = inner.core.depth().await;
    let min_size = inner.config.min_size;
    if depth >= min_size {
        inner.core.end_refill();
        return;
    }

    let needed = min_size - depth;
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = effective_workers(inner.config.max_concurrent, cores, needed);
    if workers < inner.config.max_concurrent.min(needed) {
        tracing::info!("limiting pre-params generation to 1 worker on a CPU-limited host");
    }
    tracing::info!(depth, needed, workers, "starting pool refill round");

    let started = Instant::now();
    let mut tasks = JoinSet::new();
    for _ in 0..workers {
        tasks.spawn(worker_loop(Arc::clone(inner)));
    }
    while tasks.join_next().await.is_some() {}

    inner.core.mark_refilled().await;
    inner.core.end_refill();
    tracing::info!(elapsed = ?started.elapsed(), "pool refill round finished");

    if inner.config.auto_save {
        inner.save_now().await;
    }
}

/// One generator worker: keep producing until the pool is at `min_size`,
/// shutdown is requested, or generation fails.
async fn worker_loop(inner: Arc<PoolInner>) {
    loop {
        if inner.cancel.is_cancelled() {
            return;
        }
        if inner.core.depth().await >= inner.config.min_size {
            return;
        }

        let generator = Arc::clone(&inner.generator);
        let token = inner.cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || generator.generate(&token)).await;

        match outcome {
            Ok(Ok(params)) => {
                if inner.core.deposit(params).await {
                    let depth = inner.core.depth().await;
                    tracing::info!(depth, "deposited generated pre-params");
                    if inner.config.auto_save {
                        inner.schedule_save();
                    }
                } else {
                    tracing::info!("pool at capacity, discarding generated pre-params");
                }
            }
            Ok(Err(Error::Cancelled)) => return,
            Ok(Err(e)) => {
                tracing::warn!("pre-params generation failed during refill: {e}");
                return;
            }
            Err(e) => {
                tracing::warn!("pre-params generation task panicked: {e}");
                return;
            }
        }

        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            _ = tokio::time::sleep(WORKER_BACKOFF) => {}
        }
    }
}

//! Periodic schedulers
//!
//! One loop drives cell scans (first firing immediate), the other drives
//! partial exports (first firing after one full period). Each firing
//! spawns the actual work through the pool, so a slow snapshot or delivery
//! never delays the next firing.

use crate::export::ExportSink;
use crate::orchestrator::Orchestrator;
use crate::source::CellSource;
use crate::workers::WorkerPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Scan loop: fires immediately, then every `interval`. Each firing
/// increments the tick id and hands a fresh snapshot to the orchestrator,
/// fire-and-forget.
pub async fn scan_loop(
    source: Arc<dyn CellSource>,
    orchestrator: Arc<Orchestrator>,
    workers: Arc<WorkerPool>,
    tick: Arc<AtomicU64>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let tick_id = tick.fetch_add(1, Ordering::Relaxed) + 1;
        let source = Arc::clone(&source);
        let orchestrator = Arc::clone(&orchestrator);
        workers.spawn_ungated(async move {
            match source.snapshot().await {
                Ok(cells) => orchestrator.process_snapshot(tick_id, &cells),
                Err(e) => warn!(tick = tick_id, error = %e, "cell snapshot failed"),
            }
        });
    }
}

/// Export loop: fires after one full `interval`, then periodically
pub async fn export_loop(
    exporter: Arc<ExportSink>,
    workers: Arc<WorkerPool>,
    tick: Arc<AtomicU64>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let exporter = Arc::clone(&exporter);
        let current_tick = tick.load(Ordering::Relaxed);
        workers.spawn_ungated(async move { exporter.export_partial(current_tick).await });
    }
}

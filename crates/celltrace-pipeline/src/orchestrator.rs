//! Resolution orchestrator
//!
//! Per-tick coordinator: normalizes the raw snapshot, appends canonical
//! records to the trace and spawns one bounded resolution task per
//! observation. Resolution is a side effect decoupled from the append
//! path, so a record can reach the trace before its cell resolves.

use crate::export::ExportSink;
use crate::normalize::normalize;
use crate::source::RawCellRecord;
use crate::workers::WorkerPool;
use celltrace_common::TIMESTAMP_FORMAT;
use celltrace_geo::LocationCache;
use celltrace_storage::{AppendOutcome, TraceStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-tick pipeline coordinator
pub struct Orchestrator {
    cache: Arc<LocationCache>,
    store: Arc<TraceStore>,
    exporter: Arc<ExportSink>,
    workers: Arc<WorkerPool>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        cache: Arc<LocationCache>,
        store: Arc<TraceStore>,
        exporter: Arc<ExportSink>,
        workers: Arc<WorkerPool>,
    ) -> Self {
        Self {
            cache,
            store,
            exporter,
            workers,
        }
    }

    /// Process one raw snapshot under tick `tick`
    pub fn process_snapshot(&self, tick: u64, cells: &[RawCellRecord]) {
        if cells.is_empty() {
            debug!(tick, "no cell info available");
            return;
        }
        debug!(tick, cells = cells.len(), "snapshot received");

        // One timestamp for every observation of the tick.
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();

        for raw in cells {
            let Some(observation) = normalize(raw, &timestamp) else {
                continue;
            };

            match self.store.append(&observation) {
                Ok(AppendOutcome::Wrapped) => {
                    info!(tick, "ring cycle completed, scheduling merge export");
                    let exporter = Arc::clone(&self.exporter);
                    self.workers
                        .spawn_ungated(async move { exporter.export_merged().await });
                }
                Ok(_) => {}
                Err(e) => {
                    // This record is lost; the pipeline carries on with the
                    // next one.
                    warn!(tick, error = %e, "trace append failed");
                }
            }

            let cache = Arc::clone(&self.cache);
            let key = observation.key.clone();
            let radio = observation.radio;
            self.workers.spawn(async move {
                cache.resolve(&key, radio, tick).await;
            });
        }
    }
}

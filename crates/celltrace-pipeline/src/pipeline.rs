//! Pipeline context
//!
//! One explicit object owns every component and the scheduler loops;
//! lifecycle is `start`/`stop`, not ambient process state. `stop` cancels
//! future firings, grants in-flight work a grace period and drains the
//! durable cache writer before returning.

use crate::export::ExportSink;
use crate::orchestrator::Orchestrator;
use crate::scheduler::{export_loop, scan_loop};
use crate::source::CellSource;
use crate::workers::WorkerPool;
use celltrace_common::{Config, Result};
use celltrace_geo::{CellLocator, LocationCache, UnwiredClient};
use celltrace_storage::TraceStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// The assembled observation-to-location pipeline.
///
/// Must be constructed inside a tokio runtime: the location cache starts
/// its durable-writer task at build time.
pub struct Pipeline {
    config: Config,
    source: Arc<dyn CellSource>,
    cache: Arc<LocationCache>,
    store: Arc<TraceStore>,
    exporter: Arc<ExportSink>,
    orchestrator: Arc<Orchestrator>,
    workers: Arc<WorkerPool>,
    tick: Arc<AtomicU64>,
    loops: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Build every component from the configuration. Missing geolocation
    /// credential or sink URL degrade to local-only resolution and
    /// export-disabled; neither is an error.
    pub fn new(config: Config, source: Arc<dyn CellSource>) -> Result<Self> {
        let locator: Option<Arc<dyn CellLocator>> = match &config.geolocation.api_token {
            Some(token) => Some(Arc::new(UnwiredClient::new(
                config.geolocation.endpoint.clone(),
                token.clone(),
                Duration::from_secs(config.geolocation.connect_timeout_secs),
                Duration::from_secs(config.geolocation.request_timeout_secs),
            )?)),
            None => None,
        };

        std::fs::create_dir_all(&config.storage.data_dir)?;
        let cache = Arc::new(LocationCache::open(
            config.cache.reference_dataset.as_deref(),
            &config.cache_file_path(),
            locator,
        )?);
        let store = Arc::new(TraceStore::create(
            &config.storage.data_dir,
            config.storage.max_files,
            config.storage.events_per_file,
        )?);
        let exporter = Arc::new(ExportSink::new(
            config.export.sink_url.clone(),
            Arc::clone(&store),
            Arc::clone(&cache),
        )?);
        let workers = Arc::new(WorkerPool::new(config.scan.max_concurrent_resolutions));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&cache),
            Arc::clone(&store),
            Arc::clone(&exporter),
            Arc::clone(&workers),
        ));

        Ok(Self {
            config,
            source,
            cache,
            store,
            exporter,
            orchestrator,
            workers,
            tick: Arc::new(AtomicU64::new(0)),
            loops: Vec::new(),
        })
    }

    /// Spawn the scan and export loops; idempotent
    pub fn start(&mut self) {
        if !self.loops.is_empty() {
            return;
        }
        info!(
            scan_interval_secs = self.config.scan.interval_secs,
            export_interval_secs = self.config.export.interval_secs,
            export_enabled = self.exporter.enabled(),
            resolvable_cells = self.cache.len(),
            "pipeline starting"
        );

        self.loops.push(tokio::spawn(scan_loop(
            Arc::clone(&self.source),
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.workers),
            Arc::clone(&self.tick),
            Duration::from_secs(self.config.scan.interval_secs),
        )));
        self.loops.push(tokio::spawn(export_loop(
            Arc::clone(&self.exporter),
            Arc::clone(&self.workers),
            Arc::clone(&self.tick),
            Duration::from_secs(self.config.export.interval_secs),
        )));

        let exporter = Arc::clone(&self.exporter);
        self.workers
            .spawn_ungated(async move { exporter.notify_status("started").await });
    }

    /// Cancel future firings, let in-flight work finish within the grace
    /// period, then drain the durable cache writer.
    pub async fn stop(&mut self) {
        info!("pipeline stopping");
        for handle in self.loops.drain(..) {
            handle.abort();
        }
        let grace = Duration::from_secs(self.config.scan.shutdown_grace_secs);
        self.workers.shutdown(grace).await;
        self.exporter.notify_status("stopped").await;
        self.cache.close().await;
        info!("pipeline stopped");
    }

    /// Tick id of the most recent scan firing
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Location cache shared with the pipeline
    #[must_use]
    pub fn cache(&self) -> &Arc<LocationCache> {
        &self.cache
    }

    /// Trace store shared with the pipeline
    #[must_use]
    pub fn store(&self) -> &Arc<TraceStore> {
        &self.store
    }
}

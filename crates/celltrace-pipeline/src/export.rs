//! Export sink adapter
//!
//! Two independent export paths, both no-ops without a configured sink:
//! a periodic partial export of the active trace file (snapshot copy plus
//! a human-readable digest of the last records) and a wrap-triggered merge
//! export of the completed ring. Ring files are purged only after a
//! confirmed delivery; a failed delivery leaves every file untouched.

use celltrace_common::{Error, Result, TraceRecord};
use celltrace_geo::LocationCache;
use celltrace_storage::{merge_ring, ring_files, TraceStore, MERGED_TRACE_FILE};
use reqwest::multipart::{Form, Part};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records summarized in the partial-export digest
const DIGEST_RECORDS: usize = 5;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers trace data to the external sink
pub struct ExportSink {
    http_client: reqwest::Client,
    sink_url: Option<String>,
    store: Arc<TraceStore>,
    cache: Arc<LocationCache>,
}

impl ExportSink {
    /// Build the sink adapter; `sink_url: None` disables both export paths
    pub fn new(
        sink_url: Option<String>,
        store: Arc<TraceStore>,
        cache: Arc<LocationCache>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::configuration(e.to_string()))?;
        Ok(Self {
            http_client,
            sink_url,
            store,
            cache,
        })
    }

    /// Whether a sink endpoint is configured
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.sink_url.is_some()
    }

    /// Periodic partial export: deliver a snapshot copy of the active file
    /// plus a digest of its last records. The snapshot copy is removed
    /// after the attempt regardless of outcome.
    pub async fn export_partial(&self, tick: u64) {
        let Some(sink_url) = self.sink_url.clone() else {
            debug!("no sink configured, partial export skipped, not sent");
            return;
        };

        let active = self.store.active_file_path();
        let populated = fs::metadata(&active).map(|m| m.len() > 0).unwrap_or(false);
        if !populated {
            info!("active trace file empty, nothing to export");
            return;
        }

        // Copy first so the digest and the delivered bytes cannot race the
        // appender.
        let snapshot = active.with_extension("ndjson.snapshot");
        if let Err(e) = fs::copy(&active, &snapshot) {
            warn!(error = %e, "trace snapshot copy failed");
            return;
        }

        match self.deliver_partial(&sink_url, &active, &snapshot, tick).await {
            Ok(()) => info!("partial report delivered"),
            Err(e) => warn!(error = %e, "partial export failed"),
        }

        if let Err(e) = fs::remove_file(&snapshot) {
            warn!(path = %snapshot.display(), error = %e, "snapshot cleanup failed");
        }
    }

    async fn deliver_partial(
        &self,
        sink_url: &str,
        active: &Path,
        snapshot: &Path,
        tick: u64,
    ) -> Result<()> {
        let content = fs::read_to_string(snapshot)?;
        let lines: Vec<&str> = content.lines().collect();
        let skip = lines.len().saturating_sub(DIGEST_RECORDS);
        let mut entries = Vec::with_capacity(DIGEST_RECORDS);
        for line in &lines[skip..] {
            entries.push(self.digest_line(line, tick).await);
        }

        let file_name = active
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trace.ndjson".to_string());
        let payload = serde_json::json!({
            "content": "partial trace report",
            "file": file_name,
            "events": lines.len(),
            "size_kb": content.len() / 1024,
            "entries": entries,
            "timestamp": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        });

        let part = Part::bytes(content.into_bytes())
            .file_name(file_name)
            .mime_str("application/json")
            .map_err(|e| Error::export(e.to_string()))?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", part);

        self.deliver(sink_url, form).await
    }

    /// One digest entry: radio label, signal and resolved location (or
    /// `not found` when the cell resolves nowhere).
    async fn digest_line(&self, line: &str, tick: u64) -> String {
        let Some(record) = TraceRecord::parse(line) else {
            return "unreadable record".to_string();
        };
        let label = record.radio.map_or("unknown", |radio| radio.label());
        let signal = record
            .signal_dbm()
            .map_or_else(|| "?".to_string(), |dbm| format!("{dbm} dBm"));
        let location = match (record.key(), record.radio) {
            (Some(key), Some(radio)) => self.cache.resolve(&key, radio, tick).await,
            (Some(key), None) => self.cache.lookup(&key),
            _ => None,
        };
        let location = location.map_or_else(|| "not found".to_string(), |c| c.to_string());
        format!("{label} | signal {signal} -> {location}")
    }

    /// Full-cycle merge export, triggered when the ring wraps to index 1.
    ///
    /// Without a sink the merged trace is retained and nothing is deleted.
    /// With a sink, the ring files and the merged trace are deleted only on
    /// a confirmed delivery; on failure every file stays on disk and the
    /// next wrap merges again.
    pub async fn export_merged(&self) {
        let dir = self.store.dir().to_path_buf();
        let max_files = self.store.max_files();

        let merged = match merge_ring(&dir, max_files) {
            Ok(Some(path)) => path,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "ring merge failed");
                return;
            }
        };

        let Some(sink_url) = self.sink_url.clone() else {
            info!(path = %merged.display(), "no sink configured, merged trace retained, not sent");
            return;
        };

        let files = ring_files(&dir, max_files);
        match self.deliver_merged(&sink_url, &merged, files.len()).await {
            Ok(()) => {
                info!("full trace delivered, purging ring");
                for path in files.iter().chain(std::iter::once(&merged)) {
                    if let Err(e) = fs::remove_file(path) {
                        warn!(path = %path.display(), error = %e, "ring purge failed");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "full trace delivery failed, files retained");
            }
        }
    }

    async fn deliver_merged(
        &self,
        sink_url: &str,
        merged: &Path,
        file_count: usize,
    ) -> Result<()> {
        let content = fs::read(merged)?;
        let payload = serde_json::json!({
            "content": format!("full trace collected ({file_count} files merged)"),
        });
        let part = Part::bytes(content)
            .file_name(MERGED_TRACE_FILE)
            .mime_str("application/json")
            .map_err(|e| Error::export(e.to_string()))?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", part);
        self.deliver(sink_url, form).await
    }

    /// Pipeline start/stop notice, best effort
    pub async fn notify_status(&self, action: &str) {
        let Some(sink_url) = self.sink_url.clone() else {
            debug!(action, "no sink configured, status notice skipped");
            return;
        };
        let payload = serde_json::json!({
            "content": format!("celltrace logger {action}"),
            "timestamp": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        });
        match self.http_client.post(&sink_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(action, "status notice delivered");
            }
            Ok(response) => {
                warn!(action, status = %response.status(), "status notice rejected");
            }
            Err(e) => warn!(action, error = %e, "status notice failed"),
        }
    }

    async fn deliver(&self, sink_url: &str, form: Form) -> Result<()> {
        let response = self
            .http_client
            .post(sink_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::export(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::export(format!(
                "sink returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

//! Durable cache file
//!
//! The read-write tier of the location cache is a CSV file with header
//! `radio,mcc,mnc,area,cell,unit,lon,lat`. Longitude precedes latitude,
//! the inverse column order of the reference dataset; reader and writer
//! here must stay in agreement or coordinates get transposed.
//!
//! All mutations run through [`CacheFileWriter`], a single-writer task that
//! owns the file handle and the set of keys already on disk, so concurrent
//! resolutions cannot race a read-then-append into duplicate rows.

use celltrace_common::{CellKey, Coordinate, RadioType, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Header row of the durable cache file
pub const CACHE_FILE_HEADER: &str = "radio,mcc,mnc,area,cell,unit,lon,lat";

/// Load the durable cache file at `path`, handing each entry to `insert`.
/// A missing file is an empty tier, not an error. Returns the number of
/// entries offered.
pub fn load_cache_file(
    path: &Path,
    mut insert: impl FnMut(CellKey, Coordinate),
) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let reader = BufReader::new(File::open(path)?);
    let mut loaded = 0usize;
    for line in reader.lines().skip(1) {
        let line = line?;
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 8 {
            continue;
        }
        // lon at column 6, lat at column 7 (see module docs).
        let Ok(lon) = parts[6].trim().parse::<f64>() else {
            continue;
        };
        let Ok(lat) = parts[7].trim().parse::<f64>() else {
            continue;
        };
        let Ok(key) = CellKey::new(
            parts[1].trim(),
            parts[2].trim(),
            parts[3].trim(),
            parts[4].trim(),
        ) else {
            continue;
        };
        insert(key, Coordinate::new(lat, lon));
        loaded += 1;
    }
    Ok(loaded)
}

struct CacheAppend {
    radio: RadioType,
    key: CellKey,
    coordinate: Coordinate,
}

/// Single-writer handle for durable cache appends.
///
/// Appends are enqueued and applied by one background task; a key already
/// present in the file is never written a second time.
pub struct CacheFileWriter {
    tx: Mutex<Option<mpsc::UnboundedSender<CacheAppend>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CacheFileWriter {
    /// Start the writer task for `path`. `known` seeds the set of keys the
    /// file already holds (from [`load_cache_file`]).
    #[must_use]
    pub fn spawn(path: PathBuf, known: HashSet<CellKey>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(path, known, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue one append; returns immediately. Dropped silently if the
    /// writer has been closed.
    pub fn enqueue(&self, radio: RadioType, key: CellKey, coordinate: Coordinate) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(CacheAppend {
                radio,
                key,
                coordinate,
            });
        }
    }

    /// Stop accepting appends, drain the queue to disk and join the task.
    pub async fn close(&self) {
        self.tx.lock().take();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_writer(
    path: PathBuf,
    mut known: HashSet<CellKey>,
    mut rx: mpsc::UnboundedReceiver<CacheAppend>,
) {
    while let Some(entry) = rx.recv().await {
        if !known.insert(entry.key.clone()) {
            debug!(key = %entry.key, "durable cache already holds key");
            continue;
        }
        if let Err(e) = append_row(&path, &entry) {
            warn!(key = %entry.key, error = %e, "durable cache append failed");
            known.remove(&entry.key);
        }
    }
}

fn append_row(path: &Path, entry: &CacheAppend) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let new_file = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if new_file {
        writeln!(file, "{CACHE_FILE_HEADER}")?;
    }
    writeln!(
        file,
        "{},{},{},{},{},,{},{}",
        entry.radio.as_str(),
        entry.key.mcc(),
        entry.key.mnc(),
        entry.key.area(),
        entry.key.cell(),
        entry.coordinate.lon,
        entry.coordinate.lat,
    )?;
    Ok(())
}

//! Ring merge
//!
//! Concatenates a completed ring into one merged trace file, in index
//! order. The merge is skipped silently while the ring has not yet
//! produced all of its files.

use crate::store::ring_file_path;
use celltrace_common::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the merged trace artifact
pub const MERGED_TRACE_FILE: &str = "celltrace_full_trace.ndjson";

/// Path of the merged trace artifact under a ring directory
#[must_use]
pub fn merged_trace_path(dir: &Path) -> PathBuf {
    dir.join(MERGED_TRACE_FILE)
}

/// Ring files currently present on disk, in index order
#[must_use]
pub fn ring_files(dir: &Path, max_files: u32) -> Vec<PathBuf> {
    (1..=max_files)
        .map(|index| ring_file_path(dir, index))
        .filter(|path| path.exists())
        .collect()
}

/// Merge all ring files into the merged trace artifact.
///
/// Returns `Ok(None)` when fewer than `max_files` ring files exist (the
/// ring has not completed a full cycle since the last purge). The merged
/// file is overwritten on every merge.
pub fn merge_ring(dir: &Path, max_files: u32) -> Result<Option<PathBuf>> {
    let files = ring_files(dir, max_files);
    if files.len() < max_files as usize {
        debug!(
            present = files.len(),
            expected = max_files,
            "ring incomplete, merge skipped"
        );
        return Ok(None);
    }

    let merged = merged_trace_path(dir);
    let mut writer = BufWriter::new(File::create(&merged)?);
    let mut lines = 0usize;
    for path in &files {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            writer.write_all(line?.as_bytes())?;
            writer.write_all(b"\n")?;
            lines += 1;
        }
    }
    writer.flush()?;
    info!(files = files.len(), lines, "merged trace generated");
    Ok(Some(merged))
}

//! Bounded trace file ring
//!
//! One "active" file receives appends; the ring holds `max_files` files
//! (index 1..=max_files) of `events_per_file` records each. Rotation
//! advances the index, wrapping back to 1 after a full cycle. The file a
//! rotation lands on is overwritten lazily, on the first append to it, so
//! a wrap-triggered merge always reads complete files.

use celltrace_common::{CellObservation, Error, Result};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Deterministic ring file name for an index: `celltrace_events_NNN.ndjson`
#[must_use]
pub fn ring_file_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("celltrace_events_{index:03}.ndjson"))
}

/// Outcome of one append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Record written, active file unchanged
    Appended,
    /// Record written and the active file rotated forward
    Rotated,
    /// Record written and rotation wrapped back to index 1: a full ring
    /// cycle completed and the ring is ready to merge
    Wrapped,
}

struct ActiveState {
    index: u32,
    count: u32,
    /// Open handle of the active file; `None` until the first append after
    /// start or rotation, at which point the file is created (truncating
    /// leftovers from the previous cycle).
    file: Option<File>,
}

/// Append-only ring of trace files
pub struct TraceStore {
    dir: PathBuf,
    max_files: u32,
    events_per_file: u32,
    state: Mutex<ActiveState>,
}

impl TraceStore {
    /// Create a trace store rooted at `dir`; the active index starts at 1
    /// regardless of leftover ring files from a prior run.
    pub fn create(dir: impl AsRef<Path>, max_files: u32, events_per_file: u32) -> Result<Self> {
        if max_files == 0 || events_per_file == 0 {
            return Err(Error::storage(
                "max_files and events_per_file must both be at least 1",
            ));
        }
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_files,
            events_per_file,
            state: Mutex::new(ActiveState {
                index: 1,
                count: 0,
                file: None,
            }),
        })
    }

    /// Append one canonical record as a JSON line, then evaluate rotation
    pub fn append(&self, observation: &CellObservation) -> Result<AppendOutcome> {
        let line = observation.to_json_line()?;
        let mut state = self.state.lock();

        if state.file.is_none() {
            let path = ring_file_path(&self.dir, state.index);
            state.file = Some(File::create(&path)?);
        }
        let file = state.file.as_mut().unwrap();
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        state.count += 1;

        if state.count >= self.events_per_file {
            state.index = if state.index >= self.max_files {
                1
            } else {
                state.index + 1
            };
            state.count = 0;
            state.file = None;
            debug!(index = state.index, "trace ring rotated");
            if state.index == 1 {
                return Ok(AppendOutcome::Wrapped);
            }
            return Ok(AppendOutcome::Rotated);
        }
        Ok(AppendOutcome::Appended)
    }

    /// Index of the file currently receiving appends
    #[must_use]
    pub fn active_index(&self) -> u32 {
        self.state.lock().index
    }

    /// Records written to the active file so far
    #[must_use]
    pub fn active_count(&self) -> u32 {
        self.state.lock().count
    }

    /// Path of the file currently receiving appends
    #[must_use]
    pub fn active_file_path(&self) -> PathBuf {
        ring_file_path(&self.dir, self.active_index())
    }

    /// Ring directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files in the ring
    #[must_use]
    pub fn max_files(&self) -> u32 {
        self.max_files
    }

    /// Records per file before rotation
    #[must_use]
    pub fn events_per_file(&self) -> u32 {
        self.events_per_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celltrace_common::{CellKey, RadioType, SignalMetrics};
    use tempfile::tempdir;

    fn observation(n: i64) -> CellObservation {
        CellObservation {
            radio: RadioType::Lte,
            key: CellKey::new("732", "101", "100", n.to_string()).unwrap(),
            signal: SignalMetrics::Lte {
                rsrp: -95,
                rsrq: -12,
                rssnr: 8,
            },
            timestamp: "2026-08-07T12:00:00.000-0500".to_string(),
        }
    }

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_append_until_rotation() {
        let dir = tempdir().unwrap();
        let store = TraceStore::create(dir.path(), 3, 2).unwrap();

        assert_eq!(store.append(&observation(1)).unwrap(), AppendOutcome::Appended);
        assert_eq!(store.append(&observation(2)).unwrap(), AppendOutcome::Rotated);
        assert_eq!(store.active_index(), 2);
        assert_eq!(store.active_count(), 0);
        assert_eq!(line_count(&ring_file_path(dir.path(), 1)), 2);
    }

    #[test]
    fn test_full_cycle_wraps_once() {
        let dir = tempdir().unwrap();
        let store = TraceStore::create(dir.path(), 3, 2).unwrap();

        let mut wraps = 0;
        for n in 0..6 {
            if store.append(&observation(n)).unwrap() == AppendOutcome::Wrapped {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert_eq!(store.active_index(), 1);
        for index in 1..=3 {
            assert_eq!(line_count(&ring_file_path(dir.path(), index)), 2);
        }
    }

    #[test]
    fn test_seven_records_in_a_two_by_three_ring() {
        let dir = tempdir().unwrap();
        let store = TraceStore::create(dir.path(), 3, 2).unwrap();

        let mut wraps = 0;
        for n in 0..7 {
            if store.append(&observation(n)).unwrap() == AppendOutcome::Wrapped {
                wraps += 1;
            }
        }
        // The wrap lands on index 1 and the 7th record overwrites it.
        assert_eq!(wraps, 1);
        assert_eq!(store.active_index(), 1);
        assert_eq!(store.active_count(), 1);
        assert_eq!(line_count(&ring_file_path(dir.path(), 1)), 1);
        assert_eq!(line_count(&ring_file_path(dir.path(), 2)), 2);
        assert_eq!(line_count(&ring_file_path(dir.path(), 3)), 2);
    }

    #[test]
    fn test_wrap_preserves_ring_until_next_append() {
        let dir = tempdir().unwrap();
        let store = TraceStore::create(dir.path(), 2, 1).unwrap();

        store.append(&observation(1)).unwrap();
        let outcome = store.append(&observation(2)).unwrap();
        assert_eq!(outcome, AppendOutcome::Wrapped);
        // File 1 still holds the first cycle's record: overwrite happens on
        // the next append, not at rotation time.
        assert_eq!(line_count(&ring_file_path(dir.path(), 1)), 1);
        let first_cycle = std::fs::read_to_string(ring_file_path(dir.path(), 1)).unwrap();
        assert!(first_cycle.contains(r#""cellid":1"#));

        store.append(&observation(3)).unwrap();
        let second_cycle = std::fs::read_to_string(ring_file_path(dir.path(), 1)).unwrap();
        assert!(second_cycle.contains(r#""cellid":3"#));
        assert!(!second_cycle.contains(r#""cellid":1"#));
    }

    #[test]
    fn test_index_resets_on_restart() {
        let dir = tempdir().unwrap();
        {
            let store = TraceStore::create(dir.path(), 3, 2).unwrap();
            for n in 0..4 {
                store.append(&observation(n)).unwrap();
            }
            assert_eq!(store.active_index(), 3);
        }
        let store = TraceStore::create(dir.path(), 3, 2).unwrap();
        assert_eq!(store.active_index(), 1);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_rejects_zero_sized_ring() {
        let dir = tempdir().unwrap();
        assert!(TraceStore::create(dir.path(), 0, 2).is_err());
        assert!(TraceStore::create(dir.path(), 3, 0).is_err());
    }
}

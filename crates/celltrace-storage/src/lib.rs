//! Trace storage for Celltrace
//!
//! A bounded ring of append-only NDJSON trace files with index-wrapping
//! rotation, plus the merge step that concatenates a completed ring into a
//! single trace artifact for export.

pub mod merge;
pub mod store;

pub use merge::{merge_ring, merged_trace_path, ring_files, MERGED_TRACE_FILE};
pub use store::{ring_file_path, AppendOutcome, TraceStore};

//! Observation pipeline for Celltrace
//!
//! Wires the scan scheduler, event normalizer, resolution orchestrator,
//! trace store and export sink into one explicitly-managed [`Pipeline`]
//! context object with `start`/`stop` lifecycle methods.

pub mod export;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod workers;

pub use export::ExportSink;
pub use normalize::normalize;
pub use orchestrator::Orchestrator;
pub use pipeline::Pipeline;
pub use source::{
    CellSource, RawCellRecord, RawLteCell, RawNrCell, RawWcdmaCell, ReplayCellSource,
};
pub use workers::WorkerPool;

//! Common types and utilities for Celltrace
//!
//! This crate provides the error type, configuration structures and core
//! domain types shared by the rest of the system.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{
    CellKey, CellKeyError, CellObservation, Coordinate, RadioType, SignalMetrics, TraceRecord,
    TIMESTAMP_FORMAT,
};

//! Raw radio records and the cell-source collaborator
//!
//! [`RawCellRecord`] is the shape the radio collaborator hands the pipeline
//! each tick, tagged by radio type so normalization dispatches by
//! exhaustive match. Identity fields are optional; telephony stacks also
//! report "unavailable" as the maximum integer value, which the normalizer
//! treats the same as absent.

use async_trait::async_trait;
use celltrace_common::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One raw cell observation as reported by the radio collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "radio", rename_all = "lowercase")]
pub enum RawCellRecord {
    Lte(RawLteCell),
    Nr(RawNrCell),
    Wcdma(RawWcdmaCell),
}

/// Raw LTE cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLteCell {
    /// True when the device is registered on this cell
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub mcc: Option<String>,
    #[serde(default)]
    pub mnc: Option<String>,
    /// Tracking area code
    #[serde(default)]
    pub tac: Option<i32>,
    /// Cell identity
    #[serde(default)]
    pub ci: Option<i32>,
    /// Physical cell id; collected but not part of the canonical record
    #[serde(default)]
    pub pci: Option<i32>,
    pub rsrp: i32,
    pub rsrq: i32,
    pub rssnr: i32,
}

/// Raw 5G NR cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNrCell {
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub mcc: Option<String>,
    #[serde(default)]
    pub mnc: Option<String>,
    #[serde(default)]
    pub tac: Option<i32>,
    /// NR cell identity (wider than LTE's)
    #[serde(default)]
    pub nci: Option<i64>,
    #[serde(default)]
    pub pci: Option<i32>,
    /// SS-prefixed source metrics
    pub ss_rsrp: i32,
    pub ss_rsrq: i32,
    pub ss_sinr: i32,
}

/// Raw WCDMA cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWcdmaCell {
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub mcc: Option<String>,
    #[serde(default)]
    pub mnc: Option<String>,
    /// Location area code
    #[serde(default)]
    pub lac: Option<i32>,
    #[serde(default)]
    pub cid: Option<i32>,
    /// Primary scrambling code
    #[serde(default)]
    pub psc: Option<i32>,
    /// Received signal code power in dBm
    pub rscp: i32,
}

/// Supplier of raw cell snapshots (the radio/telephony collaborator).
///
/// An empty snapshot and a failed snapshot are both no-op ticks, never
/// pipeline errors.
#[async_trait]
pub trait CellSource: Send + Sync {
    /// A fresh snapshot of currently visible cells
    async fn snapshot(&self) -> Result<Vec<RawCellRecord>>;
}

/// Replays raw records from an NDJSON file, one snapshot per tick, cycling
/// back to the start when exhausted. A line may hold one record or a JSON
/// array forming a multi-cell snapshot. Lets the pipeline run without
/// modem hardware.
pub struct ReplayCellSource {
    snapshots: Vec<Vec<RawCellRecord>>,
    cursor: AtomicUsize,
}

impl ReplayCellSource {
    /// Load snapshots from an NDJSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut snapshots = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                snapshots.push(serde_json::from_str::<Vec<RawCellRecord>>(line)?);
            } else {
                snapshots.push(vec![serde_json::from_str::<RawCellRecord>(line)?]);
            }
        }
        Ok(Self {
            snapshots,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build directly from in-memory snapshots
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<Vec<RawCellRecord>>) -> Self {
        Self {
            snapshots,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CellSource for ReplayCellSource {
    async fn snapshot(&self) -> Result<Vec<RawCellRecord>> {
        if self.snapshots.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.snapshots.len();
        Ok(self.snapshots[index].clone())
    }
}

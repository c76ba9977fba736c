//! Core type definitions for Celltrace
//!
//! This module defines the fundamental types used throughout the system:
//! radio technologies, cell identity keys, coordinates and the canonical
//! observation record written to the trace.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Timestamp format for canonical records: ISO-8601 with millisecond
/// precision and numeric timezone offset (e.g. `2026-08-07T12:34:56.789-0500`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Radio access technology of an observed cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioType {
    Lte,
    Nr,
    Wcdma,
}

impl RadioType {
    /// Wire name used in canonical records and the durable cache file
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lte => "lte",
            Self::Nr => "nr",
            Self::Wcdma => "wcdma",
        }
    }

    /// Radio code expected by the remote geolocation provider
    #[must_use]
    pub const fn provider_code(&self) -> &'static str {
        match self {
            Self::Nr => "nr",
            Self::Lte => "lte",
            Self::Wcdma => "umts",
        }
    }

    /// Human-readable label used in export digests
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Lte => "4G LTE",
            Self::Nr => "5G NR",
            Self::Wcdma => "3G WCDMA",
        }
    }
}

impl fmt::Display for RadioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when creating a cell key
#[derive(Debug, Clone, thiserror::Error)]
pub enum CellKeyError {
    #[error("cell key component `{0}` is empty")]
    EmptyComponent(&'static str),
}

/// Identity of one cell: mobile country code, mobile network code, area
/// code and cell id, all kept in their textual form so operator codes with
/// leading zeros (MNC `01`) survive intact.
///
/// Canonical form is `mcc-mnc-area-cell`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    mcc: String,
    mnc: String,
    area: String,
    cell: String,
}

impl CellKey {
    /// Create a new cell key; every component must be non-empty
    pub fn new(
        mcc: impl Into<String>,
        mnc: impl Into<String>,
        area: impl Into<String>,
        cell: impl Into<String>,
    ) -> Result<Self, CellKeyError> {
        let key = Self {
            mcc: mcc.into(),
            mnc: mnc.into(),
            area: area.into(),
            cell: cell.into(),
        };
        if key.mcc.is_empty() {
            return Err(CellKeyError::EmptyComponent("mcc"));
        }
        if key.mnc.is_empty() {
            return Err(CellKeyError::EmptyComponent("mnc"));
        }
        if key.area.is_empty() {
            return Err(CellKeyError::EmptyComponent("area"));
        }
        if key.cell.is_empty() {
            return Err(CellKeyError::EmptyComponent("cell"));
        }
        Ok(key)
    }

    #[must_use]
    pub fn mcc(&self) -> &str {
        &self.mcc
    }

    #[must_use]
    pub fn mnc(&self) -> &str {
        &self.mnc
    }

    #[must_use]
    pub fn area(&self) -> &str {
        &self.area
    }

    #[must_use]
    pub fn cell(&self) -> &str {
        &self.cell
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.mcc, self.mnc, self.area, self.cell)
    }
}

impl fmt::Debug for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellKey({self})")
    }
}

/// WGS-84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

/// Signal metrics specific to one radio technology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMetrics {
    Lte { rsrp: i32, rsrq: i32, rssnr: i32 },
    Nr { rsrp: i32, rsrq: i32, rssinr: i32 },
    Wcdma { psc: Option<i32>, rscp: i32 },
}

impl SignalMetrics {
    /// Primary received-power figure in dBm (RSRP for LTE/NR, RSCP for WCDMA)
    #[must_use]
    pub const fn dbm(&self) -> i32 {
        match self {
            Self::Lte { rsrp, .. } | Self::Nr { rsrp, .. } => *rsrp,
            Self::Wcdma { rscp, .. } => *rscp,
        }
    }
}

/// Canonical record of one observed cell at one point in time.
///
/// Immutable once created by the normalizer; written exactly once to the
/// trace as a single JSON line.
#[derive(Debug, Clone, PartialEq)]
pub struct CellObservation {
    pub radio: RadioType,
    pub key: CellKey,
    pub signal: SignalMetrics,
    pub timestamp: String,
}

impl CellObservation {
    /// Serialize to one canonical JSON line (no trailing newline)
    pub fn to_json_line(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn numeric(component: &str) -> Option<i64> {
    component.parse().ok()
}

impl Serialize for CellObservation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Identity fields are rendered as JSON numbers; a component that is
        // not numeric serializes as null.
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("radio", &self.radio)?;
        map.serialize_entry("mcc", &numeric(self.key.mcc()))?;
        map.serialize_entry("mnc", &numeric(self.key.mnc()))?;
        map.serialize_entry("lac", &numeric(self.key.area()))?;
        map.serialize_entry("cellid", &numeric(self.key.cell()))?;
        match &self.signal {
            SignalMetrics::Lte { rsrp, rsrq, rssnr } => {
                map.serialize_entry("rsrp", rsrp)?;
                map.serialize_entry("rsrq", rsrq)?;
                map.serialize_entry("rssnr", rssnr)?;
            }
            SignalMetrics::Nr { rsrp, rsrq, rssinr } => {
                map.serialize_entry("rsrp", rsrp)?;
                map.serialize_entry("rsrq", rsrq)?;
                map.serialize_entry("rssinr", rssinr)?;
            }
            SignalMetrics::Wcdma { psc, rscp } => {
                map.serialize_entry("psc", psc)?;
                map.serialize_entry("rscp", rscp)?;
            }
        }
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.end()
    }
}

/// Loosely-typed view of one trace line, used when reading the trace back
/// (export digests, tooling). Every field is optional so partial or foreign
/// lines never fail the reader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceRecord {
    #[serde(default)]
    pub radio: Option<RadioType>,
    #[serde(default)]
    pub mcc: Option<i64>,
    #[serde(default)]
    pub mnc: Option<i64>,
    #[serde(default)]
    pub lac: Option<i64>,
    #[serde(default)]
    pub cellid: Option<i64>,
    #[serde(default)]
    pub rsrp: Option<i32>,
    #[serde(default)]
    pub rscp: Option<i32>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl TraceRecord {
    /// Parse one trace line; returns `None` for lines that are not JSON objects
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }

    /// Rebuild the cell key from the parsed numeric identity, if complete
    #[must_use]
    pub fn key(&self) -> Option<CellKey> {
        let (mcc, mnc, lac, cellid) = (self.mcc?, self.mnc?, self.lac?, self.cellid?);
        CellKey::new(
            mcc.to_string(),
            mnc.to_string(),
            lac.to_string(),
            cellid.to_string(),
        )
        .ok()
    }

    /// Primary signal figure in dBm, whichever metric the radio carries
    #[must_use]
    pub fn signal_dbm(&self) -> Option<i32> {
        self.rsrp.or(self.rscp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(mcc: &str, mnc: &str, area: &str, cell: &str) -> CellKey {
        CellKey::new(mcc, mnc, area, cell).unwrap()
    }

    #[test]
    fn test_cell_key_display() {
        let k = key("732", "01", "100", "500");
        assert_eq!(k.to_string(), "732-01-100-500");
    }

    #[test]
    fn test_cell_key_rejects_empty_component() {
        let err = CellKey::new("732", "", "100", "500").unwrap_err();
        assert!(matches!(err, CellKeyError::EmptyComponent("mnc")));
    }

    #[test]
    fn test_cell_key_preserves_leading_zeros() {
        let k = key("732", "01", "100", "500");
        assert_eq!(k.mnc(), "01");
    }

    #[test]
    fn test_provider_codes() {
        assert_eq!(RadioType::Lte.provider_code(), "lte");
        assert_eq!(RadioType::Nr.provider_code(), "nr");
        assert_eq!(RadioType::Wcdma.provider_code(), "umts");
    }

    #[test]
    fn test_lte_observation_json_shape() {
        let obs = CellObservation {
            radio: RadioType::Lte,
            key: key("732", "101", "1234", "56789"),
            signal: SignalMetrics::Lte {
                rsrp: -95,
                rsrq: -12,
                rssnr: 8,
            },
            timestamp: "2026-08-07T12:00:00.000-0500".to_string(),
        };
        let line = obs.to_json_line().unwrap();
        assert_eq!(
            line,
            r#"{"radio":"lte","mcc":732,"mnc":101,"lac":1234,"cellid":56789,"rsrp":-95,"rsrq":-12,"rssnr":8,"timestamp":"2026-08-07T12:00:00.000-0500"}"#
        );
    }

    #[test]
    fn test_nr_observation_uses_rssinr() {
        let obs = CellObservation {
            radio: RadioType::Nr,
            key: key("732", "101", "1234", "123456789"),
            signal: SignalMetrics::Nr {
                rsrp: -80,
                rsrq: -10,
                rssinr: 20,
            },
            timestamp: "2026-08-07T12:00:00.000-0500".to_string(),
        };
        let line = obs.to_json_line().unwrap();
        assert!(line.contains(r#""rssinr":20"#));
        assert!(!line.contains("rssnr"));
    }

    #[test]
    fn test_wcdma_observation_null_psc() {
        let obs = CellObservation {
            radio: RadioType::Wcdma,
            key: key("732", "101", "1234", "56789"),
            signal: SignalMetrics::Wcdma {
                psc: None,
                rscp: -90,
            },
            timestamp: "2026-08-07T12:00:00.000-0500".to_string(),
        };
        let line = obs.to_json_line().unwrap();
        assert!(line.contains(r#""psc":null"#));
        assert!(line.contains(r#""rscp":-90"#));
    }

    #[test]
    fn test_trace_record_roundtrip() {
        let obs = CellObservation {
            radio: RadioType::Lte,
            key: key("732", "101", "100", "500"),
            signal: SignalMetrics::Lte {
                rsrp: -95,
                rsrq: -12,
                rssnr: 8,
            },
            timestamp: "2026-08-07T12:00:00.000-0500".to_string(),
        };
        let record = TraceRecord::parse(&obs.to_json_line().unwrap()).unwrap();
        assert_eq!(record.radio, Some(RadioType::Lte));
        assert_eq!(record.signal_dbm(), Some(-95));
        assert_eq!(record.key().unwrap().to_string(), "732-101-100-500");
    }

    #[test]
    fn test_trace_record_tolerates_partial_lines() {
        let record = TraceRecord::parse(r#"{"radio":"lte","mcc":732}"#).unwrap();
        assert_eq!(record.key(), None);
        assert_eq!(record.signal_dbm(), None);
        assert!(TraceRecord::parse("not json").is_none());
    }
}

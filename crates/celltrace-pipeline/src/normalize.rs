//! Event normalizer
//!
//! Pure conversion of one raw radio record into the canonical observation.
//! Unregistered cells are noise (their identity is unreliable) and produce
//! nothing; so do records missing any of the four identity components.

use crate::source::{RawCellRecord, RawLteCell, RawNrCell, RawWcdmaCell};
use celltrace_common::{CellKey, CellObservation, RadioType, SignalMetrics};

/// Normalize one raw record observed at `timestamp`, or `None` when the
/// record cannot yield a resolvable observation.
#[must_use]
pub fn normalize(raw: &RawCellRecord, timestamp: &str) -> Option<CellObservation> {
    match raw {
        RawCellRecord::Lte(cell) => normalize_lte(cell, timestamp),
        RawCellRecord::Nr(cell) => normalize_nr(cell, timestamp),
        RawCellRecord::Wcdma(cell) => normalize_wcdma(cell, timestamp),
    }
}

fn normalize_lte(cell: &RawLteCell, timestamp: &str) -> Option<CellObservation> {
    if !cell.registered {
        return None;
    }
    let area = i64::from(available_i32(cell.tac)?);
    let id = i64::from(available_i32(cell.ci)?);
    let key = identity_key(cell.mcc.as_deref(), cell.mnc.as_deref(), area, id)?;
    Some(CellObservation {
        radio: RadioType::Lte,
        key,
        signal: SignalMetrics::Lte {
            rsrp: cell.rsrp,
            rsrq: cell.rsrq,
            rssnr: cell.rssnr,
        },
        timestamp: timestamp.to_string(),
    })
}

fn normalize_nr(cell: &RawNrCell, timestamp: &str) -> Option<CellObservation> {
    if !cell.registered {
        return None;
    }
    let area = i64::from(available_i32(cell.tac)?);
    let id = available_i64(cell.nci)?;
    let key = identity_key(cell.mcc.as_deref(), cell.mnc.as_deref(), area, id)?;
    Some(CellObservation {
        radio: RadioType::Nr,
        key,
        signal: SignalMetrics::Nr {
            rsrp: cell.ss_rsrp,
            rsrq: cell.ss_rsrq,
            rssinr: cell.ss_sinr,
        },
        timestamp: timestamp.to_string(),
    })
}

fn normalize_wcdma(cell: &RawWcdmaCell, timestamp: &str) -> Option<CellObservation> {
    if !cell.registered {
        return None;
    }
    let area = i64::from(available_i32(cell.lac)?);
    let id = i64::from(available_i32(cell.cid)?);
    let key = identity_key(cell.mcc.as_deref(), cell.mnc.as_deref(), area, id)?;
    Some(CellObservation {
        radio: RadioType::Wcdma,
        key,
        signal: SignalMetrics::Wcdma {
            psc: available_i32(cell.psc),
            rscp: cell.rscp,
        },
        timestamp: timestamp.to_string(),
    })
}

/// Telephony stacks report "unavailable" as the maximum integer value
fn available_i32(value: Option<i32>) -> Option<i32> {
    value.filter(|&v| v != i32::MAX)
}

fn available_i64(value: Option<i64>) -> Option<i64> {
    value.filter(|&v| v != i64::MAX)
}

fn identity_key(
    mcc: Option<&str>,
    mnc: Option<&str>,
    area: i64,
    cell: i64,
) -> Option<CellKey> {
    let mcc = usable_code(mcc)?;
    let mnc = usable_code(mnc)?;
    CellKey::new(mcc, mnc, area.to_string(), cell.to_string()).ok()
}

fn usable_code(code: Option<&str>) -> Option<&str> {
    code.map(str::trim)
        .filter(|code| !code.is_empty() && *code != "unknown")
}

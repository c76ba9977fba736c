//! Reference dataset loader
//!
//! The bundled read-only dataset is a CSV with a header row and at least 8
//! columns per row; the columns of interest by index are [1]=mcc, [2]=mnc,
//! [3]=area, [4]=cell, [6]=lat, [7]=lon. Rows that are too short or carry
//! unparseable coordinates are skipped.

use celltrace_common::{CellKey, Coordinate, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Load the reference dataset at `path`, handing each entry to `insert`.
/// Returns the number of entries offered.
pub fn load_reference_dataset(
    path: &Path,
    mut insert: impl FnMut(CellKey, Coordinate),
) -> Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut loaded = 0usize;
    for line in reader.lines().skip(1) {
        let line = line?;
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 8 {
            continue;
        }
        let Ok(lat) = parts[6].trim().parse::<f64>() else {
            continue;
        };
        let Ok(lon) = parts[7].trim().parse::<f64>() else {
            continue;
        };
        let Ok(key) = CellKey::new(
            parts[1].trim(),
            parts[2].trim(),
            parts[3].trim(),
            parts[4].trim(),
        ) else {
            debug!(line = %line, "reference row with incomplete identity skipped");
            continue;
        };
        insert(key, Coordinate::new(lat, lon));
        loaded += 1;
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_reference_dataset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("732.csv");
        fs::write(
            &path,
            "id,mcc,mnc,area,cell,unit,lat,lon\n\
             1,732,101,100,500,0,4.6,-74.1\n\
             2,732,01,200,600,0,3.45,-76.53\n\
             short,row\n\
             3,732,101,300,700,0,not-a-number,-74.0\n",
        )
        .unwrap();

        let mut entries = HashMap::new();
        let loaded = load_reference_dataset(&path, |key, coordinate| {
            entries.insert(key.to_string(), coordinate);
        })
        .unwrap();

        assert_eq!(loaded, 2);
        let first = entries.get("732-101-100-500").unwrap();
        assert_eq!((first.lat, first.lon), (4.6, -74.1));
        // Leading-zero MNC survives as-is.
        assert!(entries.contains_key("732-01-200-600"));
    }

    #[test]
    fn test_missing_dataset_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        assert!(load_reference_dataset(&missing, |_, _| {}).is_err());
    }
}

//! # Tabular Export
//!
//! Writes the merged table view as comma-separated text.
//!
//! The header row is `,emg,accX,accY,accZ`; the first column is the
//! synchronization key. Absent values are written as empty cells and read
//! back as absent, never as zero.

use std::path::Path;
use tracing::debug;

use crate::dataset::{FinishedDataset, TableRow};
use crate::error::Result;

/// Header row; the key column is unnamed
pub const TABLE_HEADER: [&str; 5] = ["", "emg", "accX", "accY", "accZ"];

/// Write `dataset`'s table view to `path`
///
/// # Errors
///
/// Returns error if the file cannot be created or written
pub fn write_table<P: AsRef<Path>>(path: P, dataset: &FinishedDataset) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path.as_ref())?;
    let rows = dataset.table_view();

    writer.write_record(TABLE_HEADER)?;

    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} rows to {}", rows.len(), path.as_ref().display());
    Ok(rows.len())
}

/// Parse a table written by [`write_table`]
///
/// # Errors
///
/// Returns error if the file cannot be read or a row is malformed
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Vec<TableRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SynchronizedDataset;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_dataset() -> FinishedDataset {
        let mut dataset = SynchronizedDataset::new();
        dataset.stamp_iteration(Utc.timestamp_nanos(1_700_000_000_000_000_000));
        dataset.append_telemetry(1.0, -2.5, 0.125).unwrap();
        dataset.append_signal(&[100, -100, 0]).unwrap();
        dataset.stamp_iteration(Utc.timestamp_nanos(1_700_000_000_023_000_000));
        dataset.append_signal(&[5, 6, 7]).unwrap();
        dataset.finish()
    }

    #[test]
    fn test_header_and_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.csv");

        let written = write_table(&path, &sample_dataset()).unwrap();
        assert_eq!(written, 6);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ",emg,accX,accY,accZ");
        assert_eq!(lines[1], "1700000000000000_00000000_0000,100,1.0,-2.5,0.125");
        assert_eq!(lines[2], "1700000000000000_00000000_0001,-100,,,");
        assert_eq!(lines[4], "1700000000023000_00000001_0000,5,,,");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_round_trip_preserves_absence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.csv");
        let dataset = sample_dataset();

        write_table(&path, &dataset).unwrap();
        let rows = read_table(&path).unwrap();

        assert_eq!(rows, dataset.table_view());
        assert_eq!(rows[1].acc_x, None);
        assert_eq!(rows[2].emg, Some(0));
    }

    #[test]
    fn test_empty_dataset_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");

        let written = write_table(&path, &SynchronizedDataset::new().finish()).unwrap();
        assert_eq!(written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ",emg,accX,accY,accZ\n");
        assert!(read_table(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let result = write_table("/nonexistent/dir/capture.csv", &sample_dataset());
        assert!(result.is_err());
    }
}

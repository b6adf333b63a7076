//! # Synchronized Dataset
//!
//! Timestamp-keyed store merging telemetry and signal samples.
//!
//! [`SynchronizedDataset`] is the append-only writer used while capturing.
//! [`SynchronizedDataset::finish`] consumes it into a [`FinishedDataset`],
//! the read-only snapshot both exporters take by shared reference.

pub mod key;

pub use key::{CaptureClock, TimestampKey, MAX_CHUNK_SAMPLES};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{RecorderError, Result};

/// Sub-index shared by the three telemetry axes
pub const TELEMETRY_SUB_INDEX: u32 = 0;

/// One row of the merged tabular view
///
/// Field names double as the CSV header: `,emg,accX,accY,accZ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "")]
    pub key: TimestampKey,
    pub emg: Option<i16>,
    #[serde(rename = "accX")]
    pub acc_x: Option<f64>,
    #[serde(rename = "accY")]
    pub acc_y: Option<f64>,
    #[serde(rename = "accZ")]
    pub acc_z: Option<f64>,
}

impl TableRow {
    fn empty(key: TimestampKey) -> Self {
        Self {
            key,
            emg: None,
            acc_x: None,
            acc_y: None,
            acc_z: None,
        }
    }
}

/// Per-iteration key prefix
#[derive(Debug, Clone, Copy)]
struct Stamp {
    micros: i64,
    iteration: u64,
}

/// Append-only store filled by the acquisition loop
#[derive(Debug, Default)]
pub struct SynchronizedDataset {
    emg: BTreeMap<TimestampKey, i16>,
    acc_x: BTreeMap<TimestampKey, f64>,
    acc_y: BTreeMap<TimestampKey, f64>,
    acc_z: BTreeMap<TimestampKey, f64>,
    stamp: Option<Stamp>,
    next_iteration: u64,
    collisions: u64,
}

impl SynchronizedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new iteration stamped with `now` at microsecond resolution
    pub fn stamp_iteration(&mut self, now: DateTime<Utc>) {
        self.stamp = Some(Stamp {
            micros: now.timestamp_micros(),
            iteration: self.next_iteration,
        });
        self.next_iteration += 1;
    }

    /// Insert one value per axis at sub-index 0 of the current iteration
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no iteration has been stamped
    pub fn append_telemetry(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        let key = self.key(TELEMETRY_SUB_INDEX)?;
        insert(&mut self.acc_x, key, x, &mut self.collisions);
        insert(&mut self.acc_y, key, y, &mut self.collisions);
        insert(&mut self.acc_z, key, z, &mut self.collisions);
        Ok(())
    }

    /// Insert each sample at the sub-index equal to its position in the chunk
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no iteration has been stamped or the chunk
    /// holds more than [`MAX_CHUNK_SAMPLES`] samples
    pub fn append_signal(&mut self, samples: &[i16]) -> Result<()> {
        if samples.len() > MAX_CHUNK_SAMPLES {
            return Err(RecorderError::InvalidState(format!(
                "Chunk of {} samples exceeds the {} sub-indices of one iteration",
                samples.len(),
                MAX_CHUNK_SAMPLES
            )));
        }
        for (i, &sample) in samples.iter().enumerate() {
            let key = self.key(i as u32)?;
            insert(&mut self.emg, key, sample, &mut self.collisions);
        }
        Ok(())
    }

    /// Iterations stamped so far
    pub fn iterations(&self) -> u64 {
        self.next_iteration
    }

    /// Freeze the dataset for export
    pub fn finish(self) -> FinishedDataset {
        FinishedDataset {
            emg: self.emg,
            acc_x: self.acc_x,
            acc_y: self.acc_y,
            acc_z: self.acc_z,
            iterations: self.next_iteration,
            collisions: self.collisions,
        }
    }

    fn key(&self, sub_index: u32) -> Result<TimestampKey> {
        let stamp = self.stamp.ok_or_else(|| {
            RecorderError::InvalidState("Append before the first iteration was stamped".to_string())
        })?;
        Ok(TimestampKey::new(stamp.micros, stamp.iteration, sub_index))
    }
}

fn insert<V>(
    map: &mut BTreeMap<TimestampKey, V>,
    key: TimestampKey,
    value: V,
    collisions: &mut u64,
) {
    if map.insert(key, value).is_some() {
        *collisions += 1;
        warn!("Timestamp key collision at {}", key);
    }
}

/// Read-only snapshot of a completed capture window
#[derive(Debug, Clone, Default)]
pub struct FinishedDataset {
    emg: BTreeMap<TimestampKey, i16>,
    acc_x: BTreeMap<TimestampKey, f64>,
    acc_y: BTreeMap<TimestampKey, f64>,
    acc_z: BTreeMap<TimestampKey, f64>,
    iterations: u64,
    collisions: u64,
}

impl FinishedDataset {
    /// Merged view: one row per key across all four mappings, in key order
    pub fn table_view(&self) -> Vec<TableRow> {
        let mut rows: BTreeMap<TimestampKey, TableRow> = BTreeMap::new();

        for (&key, &value) in &self.emg {
            rows.entry(key).or_insert_with(|| TableRow::empty(key)).emg = Some(value);
        }
        for (&key, &value) in &self.acc_x {
            rows.entry(key).or_insert_with(|| TableRow::empty(key)).acc_x = Some(value);
        }
        for (&key, &value) in &self.acc_y {
            rows.entry(key).or_insert_with(|| TableRow::empty(key)).acc_y = Some(value);
        }
        for (&key, &value) in &self.acc_z {
            rows.entry(key).or_insert_with(|| TableRow::empty(key)).acc_z = Some(value);
        }

        rows.into_values().collect()
    }

    /// Signal samples in key order
    pub fn ordered_signal_samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.emg.values().copied()
    }

    /// Signal samples in key order as little-endian 16-bit PCM
    pub fn ordered_signal_bytes(&self) -> Vec<u8> {
        self.ordered_signal_samples().flat_map(i16::to_le_bytes).collect()
    }

    /// Number of signal samples
    pub fn signal_len(&self) -> usize {
        self.emg.len()
    }

    /// Number of telemetry records
    pub fn telemetry_len(&self) -> usize {
        self.acc_x.len()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Key collisions seen while appending; non-zero indicates a clock bug
    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn is_empty(&self) -> bool {
        self.emg.is_empty() && self.acc_x.is_empty()
    }

    /// Signal keys in order
    pub fn signal_keys(&self) -> impl Iterator<Item = &TimestampKey> + '_ {
        self.emg.keys()
    }

    /// Telemetry keys in order
    pub fn telemetry_keys(&self) -> impl Iterator<Item = &TimestampKey> + '_ {
        self.acc_x.keys()
    }
}

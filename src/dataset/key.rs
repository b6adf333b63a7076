//! # Timestamp Keys
//!
//! Join keys shared by the telemetry and signal streams, and the clock that
//! produces their timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::RecorderError;

/// Most samples one iteration may key; sub-indices render with four digits
pub const MAX_CHUNK_SAMPLES: usize = 10_000;

/// Composite key: arrival time, iteration tiebreaker, position within the iteration
///
/// Ordering is field by field, so sorting keys reproduces arrival order.
/// The textual form pads every field to a fixed width, which keeps
/// lexicographic order of the strings identical to key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampKey {
    /// Wall-clock arrival time in microseconds since the Unix epoch
    pub micros: i64,
    /// Loop iteration that stamped this key
    pub iteration: u64,
    /// Position within the iteration; telemetry axes share 0
    pub sub_index: u32,
}

impl TimestampKey {
    pub fn new(micros: i64, iteration: u64, sub_index: u32) -> Self {
        Self {
            micros,
            iteration,
            sub_index,
        }
    }
}

impl fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016}_{:08}_{:04}", self.micros, self.iteration, self.sub_index)
    }
}

impl FromStr for TimestampKey {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RecorderError::InvalidKey(format!("{:?}", s));

        let mut parts = s.split('_');
        let (Some(micros), Some(iteration), Some(sub_index), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(bad());
        };

        Ok(Self {
            micros: micros.parse().map_err(|_| bad())?,
            iteration: iteration.parse().map_err(|_| bad())?,
            sub_index: sub_index.parse().map_err(|_| bad())?,
        })
    }
}

impl Serialize for TimestampKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimestampKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Wall clock anchored at capture start and advanced monotonically
///
/// Timestamps never go backwards even if the system clock is stepped
/// during a capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureClock {
    wall_start: DateTime<Utc>,
    started: Instant,
}

impl CaptureClock {
    pub fn start() -> Self {
        Self {
            wall_start: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Wall-clock time at which the capture started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.wall_start
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Current wall-clock time
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_start + elapsed
    }
}

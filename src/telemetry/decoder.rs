//! # Telemetry Line Decoder
//!
//! Decodes one JSON telemetry line from the accelerometer board.

use super::TelemetryRecord;
use crate::error::{RecorderError, Result};

/// Decode a single telemetry line
///
/// # Arguments
///
/// * `line` - One frame without its line terminator, e.g.
///   `{"accX": 0.1, "accY": -0.9, "accZ": 0.0}`
///
/// # Errors
///
/// Returns `TelemetryDecode` if:
/// - The line is not valid UTF-8
/// - The line is not valid JSON
/// - Any of the three axes is missing or not a number
pub fn decode_line(line: &[u8]) -> Result<TelemetryRecord> {
    let text = std::str::from_utf8(line)
        .map_err(|e| RecorderError::TelemetryDecode(format!("Invalid UTF-8: {}", e)))?;

    serde_json::from_str(text.trim())
        .map_err(|e| RecorderError::TelemetryDecode(format!("Invalid frame {:?}: {}", text, e)))
}

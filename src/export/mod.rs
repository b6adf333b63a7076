//! # Export Module
//!
//! Serializes a finished capture into its two artifacts.
//!
//! This module handles:
//! - Naming artifacts after the capture start time (`YYYYMMDDHHMMSS`)
//! - Writing the merged table as CSV
//! - Writing the signal as a mono 16-bit WAV file

pub mod table;
pub mod waveform;

pub use table::{read_table, write_table};
pub use waveform::write_waveform;

use chrono::{DateTime, TimeZone};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::recorder::Capture;

/// Timestamp format used for artifact names
pub const ARTIFACT_STEM_FORMAT: &str = "%Y%m%d%H%M%S";

/// Paths of the artifacts written for one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub csv: PathBuf,
    pub wav: PathBuf,
}

/// Sortable file stem for a capture started at `started_at`
pub fn artifact_stem<Tz: TimeZone>(started_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    started_at.format(ARTIFACT_STEM_FORMAT).to_string()
}

/// Write `<stem>.csv` and `<stem>.wav` for `capture` into `dir`
///
/// # Errors
///
/// Returns error if either file cannot be written. A CSV written before a
/// WAV failure is left in place.
///
/// # Examples
///
/// ```no_run
/// use emg_recorder::export::export_capture;
/// # fn demo(capture: &emg_recorder::recorder::Capture) -> emg_recorder::error::Result<()> {
/// let files = export_capture(capture, "./recordings")?;
/// println!("{} / {}", files.csv.display(), files.wav.display());
/// # Ok(())
/// # }
/// ```
pub fn export_capture<P: AsRef<Path>>(capture: &Capture, dir: P) -> Result<ExportedFiles> {
    let stem = artifact_stem(&capture.started_at);
    let base = dir.as_ref().join(stem);
    let files = ExportedFiles {
        csv: base.with_extension("csv"),
        wav: base.with_extension("wav"),
    };

    let rows = write_table(&files.csv, &capture.dataset)?;
    let samples = write_waveform(&files.wav, &capture.dataset, &capture.signal_format)?;

    info!(
        "Saved {} ({} rows) and {} ({} samples)",
        files.csv.display(),
        rows,
        files.wav.display(),
        samples
    );
    Ok(files)
}

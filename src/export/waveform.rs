//! # Waveform Export
//!
//! Writes the captured signal as an uncompressed PCM WAV file.

use std::path::Path;
use tracing::debug;

use crate::dataset::FinishedDataset;
use crate::error::Result;
use crate::signal::SignalFormat;

/// WAV header describing `format`
pub fn wav_spec(format: &SignalFormat) -> hound::WavSpec {
    hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write `dataset`'s signal samples to `path` in key order
///
/// The payload is byte-for-byte [`FinishedDataset::ordered_signal_bytes`].
///
/// # Errors
///
/// Returns error if the file cannot be created or written
pub fn write_waveform<P: AsRef<Path>>(
    path: P,
    dataset: &FinishedDataset,
    format: &SignalFormat,
) -> Result<usize> {
    let mut writer = hound::WavWriter::create(path.as_ref(), wav_spec(format))?;

    let mut written = 0;
    for sample in dataset.ordered_signal_samples() {
        writer.write_sample(sample)?;
        written += 1;
    }
    writer.finalize()?;

    debug!("Wrote {} samples to {}", written, path.as_ref().display());
    Ok(written)
}

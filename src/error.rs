//! # Error Types
//!
//! Custom error types for EMG Recorder using `thiserror`.

use thiserror::Error;

/// Main error type for EMG Recorder
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Serial link errors (port unavailable, configuration rejected)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Audio capture device could not be opened
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Capture stream failed while running
    #[error("Signal stream error: {0}")]
    SignalStream(String),

    /// A telemetry line could not be decoded
    #[error("Telemetry decode error: {0}")]
    TelemetryDecode(String),

    /// A synchronization key could not be parsed
    #[error("Invalid timestamp key: {0}")]
    InvalidKey(String),

    /// Operation not allowed in the recorder's current state
    #[error("Invalid recorder state: {0}")]
    InvalidState(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Waveform export errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type alias for EMG Recorder
pub type Result<T> = std::result::Result<T, RecorderError>;

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::dataset::MAX_CHUNK_SAMPLES;
use crate::error::{RecorderError, Result};
use crate::serial::{DEFAULT_DEVICE_PATH, TELEMETRY_BAUD_RATE};
use crate::signal::SignalFormat;

const STANDARD_BAUD_RATES: [u32; 8] =
    [9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 921_600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link to the accelerometer board
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Audio-style capture device carrying the EMG signal
#[derive(Debug, Deserialize, Clone)]
pub struct SignalConfig {
    /// Input device name; empty selects the host default
    #[serde(default)]
    pub device: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks the capture thread may queue before the stream overflows
    #[serde(default = "default_queue_chunks")]
    pub queue_chunks: usize,
}

/// Capture window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_duration_s")]
    pub duration_s: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path; empty logs to stderr only
    #[serde(default)]
    pub file: String,
}

// Default value functions
fn default_serial_port() -> String { DEFAULT_DEVICE_PATH.to_string() }
fn default_baud_rate() -> u32 { TELEMETRY_BAUD_RATE }

fn default_sample_rate() -> u32 { 44100 }
fn default_channels() -> u16 { 1 }
fn default_chunk_size() -> usize { 1024 }
fn default_queue_chunks() -> usize { 64 }

fn default_duration_s() -> u64 { 10 }
fn default_output_dir() -> String { ".".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            chunk_size: default_chunk_size(),
            queue_chunks: default_queue_chunks(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_s: default_duration_s(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

impl SignalConfig {
    /// Stream format requested from the capture device
    pub fn format(&self) -> SignalFormat {
        SignalFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
            chunk_size: self.chunk_size,
        }
    }

    /// Input device name, or `None` for the host default
    pub fn device_name(&self) -> Option<&str> {
        if self.device.is_empty() {
            None
        } else {
            Some(&self.device)
        }
    }
}

impl CaptureConfig {
    /// Capture window length
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_s)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use emg_recorder::config::Config;
    ///
    /// let config = Config::load("recorder.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first out-of-range value
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !STANDARD_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(RecorderError::InvalidConfig(format!(
                "baud_rate must be one of: {:?}",
                STANDARD_BAUD_RATES
            )));
        }

        if !(8000..=192_000).contains(&self.signal.sample_rate) {
            return Err(invalid("sample_rate must be between 8000 and 192000"));
        }

        if !(1..=2).contains(&self.signal.channels) {
            return Err(invalid("channels must be 1 or 2"));
        }

        if !(1..=MAX_CHUNK_SAMPLES).contains(&self.signal.chunk_size) {
            return Err(RecorderError::InvalidConfig(format!(
                "chunk_size must be between 1 and {}",
                MAX_CHUNK_SAMPLES
            )));
        }

        if self.signal.chunk_size % self.signal.channels as usize != 0 {
            return Err(invalid("chunk_size must hold whole frames (a multiple of channels)"));
        }

        if self.signal.queue_chunks == 0 {
            return Err(invalid("queue_chunks must be greater than 0"));
        }

        if self.capture.output_dir.is_empty() {
            return Err(invalid("output_dir cannot be empty"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> RecorderError {
    RecorderError::InvalidConfig(msg.to_string())
}

//! # EMG Recorder
//!
//! Record accelerometer telemetry and an EMG signal for a fixed duration.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse command line and optional TOML configuration
//!    - Set up logging with tracing subscriber
//!
//! 2. **Capture**
//!    - Open the serial link, then the capture device
//!    - Poll both until the duration has elapsed
//!    - Close the capture device, then the serial link
//!
//! 3. **Export**
//!    - Write `<YYYYMMDDHHMMSS>.csv` and `<YYYYMMDDHHMMSS>.wav`
//!
//! # Examples
//!
//! ```bash
//! emg-recorder --duration 10 --path ./recordings --arduino-port /dev/ttyACM0
//! ```
//!
//! Expected output:
//! ```text
//! INFO emg_recorder: EMG Recorder v0.1.0 starting...
//! INFO emg_recorder::telemetry: Telemetry link open on /dev/ttyACM0 at 115200 baud
//! INFO emg_recorder::recorder: Start recording for 10.00 s
//! INFO emg_recorder::recorder: End recording. Recording time is 10.01 s (431 iterations)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use emg_recorder::config::{Config, LoggingConfig};
use emg_recorder::export::export_capture;
use emg_recorder::recorder::DataRecorder;
use emg_recorder::signal::SignalChannel;
use emg_recorder::telemetry::TelemetryChannel;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Recording duration in seconds
    #[clap(short, long)]
    duration: Option<u64>,
    /// Directory to save the CSV and WAV files into
    #[clap(short, long)]
    path: Option<String>,
    /// Serial device of the accelerometer board
    #[clap(long = "arduino-port")]
    arduino_port: Option<String>,
}

impl Args {
    /// Command line flags override the configuration file
    fn apply(&self, config: &mut Config) {
        if let Some(duration) = self.duration {
            config.capture.duration_s = duration;
        }
        if let Some(path) = &self.path {
            config.capture.output_dir = path.clone();
        }
        if let Some(port) = &self.arduino_port {
            config.serial.port = port.clone();
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let path = Path::new(&logging.file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("log file '{}' has no file name", logging.file))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let _log_guard = init_logging(&config.logging)?;
    info!("EMG Recorder v{} starting...", env!("CARGO_PKG_VERSION"));

    let telemetry = TelemetryChannel::new(config.serial.port.clone(), config.serial.baud_rate);
    let signal = SignalChannel::new(
        config.signal.format(),
        config.signal.device_name().map(str::to_string),
        config.signal.queue_chunks,
    );
    let mut recorder = DataRecorder::new(telemetry, signal);

    let capture = recorder.record(config.capture.duration()).await?;
    info!(
        "Captured {} signal samples and {} telemetry records ({} telemetry lines dropped)",
        capture.dataset.signal_len(),
        capture.dataset.telemetry_len(),
        recorder.telemetry().decode_failures()
    );

    export_capture(&capture, &config.capture.output_dir)?;
    Ok(())
}

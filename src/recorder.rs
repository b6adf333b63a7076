//! # Acquisition Loop
//!
//! Drives the telemetry and signal channels for one capture window and
//! merges everything they produce into a [`SynchronizedDataset`].
//!
//! ## Concurrency
//!
//! The loop runs on a single task. The capture device fills its chunk queue
//! from its own thread, and the serial driver buffers telemetry in the OS, so
//! both sources keep arriving while the loop waits. Each iteration:
//!
//! 1. stamps the dataset with the current time
//! 2. takes at most one telemetry record, without waiting
//! 3. waits for exactly one signal chunk
//!
//! Loop cadence is therefore paced by the signal device, and telemetry is
//! sampled once per chunk period.

use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dataset::{CaptureClock, FinishedDataset, SynchronizedDataset};
use crate::error::{RecorderError, Result};
use crate::signal::{SignalFormat, SignalSource};
use crate::telemetry::TelemetrySource;

/// Recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Connecting,
    Capturing,
    Draining,
    Closed,
}

/// Result of one capture window
#[derive(Debug, Clone)]
pub struct Capture {
    /// Local wall-clock time the capture started
    pub started_at: DateTime<Local>,
    /// Measured capture length; at least the requested duration
    pub elapsed: Duration,
    /// Format the signal was captured in
    pub signal_format: SignalFormat,
    pub dataset: FinishedDataset,
}

impl Capture {
    pub fn iterations(&self) -> u64 {
        self.dataset.iterations()
    }
}

/// Acquisition loop over a telemetry source and a signal source
pub struct DataRecorder<T: TelemetrySource, S: SignalSource> {
    telemetry: T,
    signal: S,
    state: RecorderState,
}

impl<T: TelemetrySource, S: SignalSource> DataRecorder<T, S> {
    pub fn new(telemetry: T, signal: S) -> Self {
        Self {
            telemetry,
            signal,
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// Record both channels for `duration`
    ///
    /// Connects telemetry first, then signal; a telemetry failure never opens
    /// the signal device. The iteration in progress when `duration` elapses
    /// is completed, so the capture runs up to one chunk period longer.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Either channel fails to connect
    /// - The signal stream fails while capturing
    /// - The recorder is already inside a capture window
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use emg_recorder::recorder::DataRecorder;
    /// use emg_recorder::signal::{SignalChannel, SignalFormat};
    /// use emg_recorder::telemetry::TelemetryChannel;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let telemetry = TelemetryChannel::new("/dev/ttyACM0", 115_200);
    ///     let signal = SignalChannel::new(SignalFormat::default(), None, 64);
    ///     let mut recorder = DataRecorder::new(telemetry, signal);
    ///
    ///     let capture = recorder.record(Duration::from_secs(10)).await?;
    ///     println!("{} iterations", capture.iterations());
    ///     Ok(())
    /// }
    /// ```
    pub async fn record(&mut self, duration: Duration) -> Result<Capture> {
        match self.state {
            RecorderState::Idle | RecorderState::Closed => {}
            other => {
                return Err(RecorderError::InvalidState(format!(
                    "Cannot start a capture while {:?}",
                    other
                )))
            }
        }

        self.state = RecorderState::Connecting;
        if let Err(e) = self.telemetry.connect() {
            self.state = RecorderState::Idle;
            return Err(e);
        }
        if let Err(e) = self.signal.connect() {
            self.close_telemetry();
            self.state = RecorderState::Idle;
            return Err(e);
        }

        self.state = RecorderState::Capturing;
        let clock = CaptureClock::start();
        let mut dataset = SynchronizedDataset::new();
        info!("Start recording for {:.2} s", duration.as_secs_f64());

        let outcome = self.capture(&clock, duration, &mut dataset).await;
        let elapsed = clock.elapsed();

        self.state = RecorderState::Draining;
        self.close_signal();
        self.close_telemetry();
        self.state = RecorderState::Closed;

        outcome?;
        info!(
            "End recording. Recording time is {:.2} s ({} iterations)",
            elapsed.as_secs_f64(),
            dataset.iterations()
        );

        Ok(Capture {
            started_at: clock.started_at().with_timezone(&Local),
            elapsed,
            signal_format: self.signal.format(),
            dataset: dataset.finish(),
        })
    }

    async fn capture(
        &mut self,
        clock: &CaptureClock,
        duration: Duration,
        dataset: &mut SynchronizedDataset,
    ) -> Result<()> {
        while clock.elapsed() < duration {
            dataset.stamp_iteration(clock.now());

            if let Some(record) = self.telemetry.poll().await {
                dataset.append_telemetry(record.acc_x, record.acc_y, record.acc_z)?;
            }

            let chunk = self.signal.poll().await?;
            dataset.append_signal(chunk.samples())?;
        }
        debug!("Capture window elapsed after {} iterations", dataset.iterations());
        Ok(())
    }

    fn close_signal(&mut self) {
        if let Err(e) = self.signal.close() {
            warn!("Failed to close signal channel: {}", e);
        }
    }

    fn close_telemetry(&mut self) {
        if let Err(e) = self.telemetry.close() {
            warn!("Failed to close telemetry channel: {}", e);
        }
    }
}

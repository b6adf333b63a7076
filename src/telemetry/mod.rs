//! # Telemetry Module
//!
//! Accelerometer telemetry received from the sensor board over serial.
//!
//! This module handles:
//! - Opening the link and discarding frames buffered before it was opened
//! - Framing the byte stream into JSON lines
//! - Decoding lines into three-axis acceleration records
//! - Polling without ever waiting for data

pub mod decoder;
pub mod framing;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::serial::{SerialConnector, SerialPortIO, TokioSerialConnector};
use decoder::decode_line;
use framing::LineFramer;

/// One decoded three-axis acceleration sample
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "accX")]
    pub acc_x: f64,
    #[serde(rename = "accY")]
    pub acc_y: f64,
    #[serde(rename = "accZ")]
    pub acc_z: f64,
}

/// Source of telemetry records for the acquisition loop
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send {
    /// Open the link, discarding anything buffered before it was opened
    fn connect(&mut self) -> Result<()>;

    /// Next record if a full, decodable line is pending; never waits
    async fn poll(&mut self) -> Option<TelemetryRecord>;

    /// Release the link; closing twice is a no-op
    fn close(&mut self) -> Result<()>;
}

/// Serial telemetry channel to the accelerometer board
pub struct TelemetryChannel<C: SerialConnector = TokioSerialConnector> {
    connector: C,
    device_path: String,
    baud_rate: u32,
    port: Option<C::Port>,
    framer: LineFramer,
    decode_failures: u64,
    read_failures: u64,
    read_failing: bool,
}

impl<C: SerialConnector> std::fmt::Debug for TelemetryChannel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryChannel")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .field("connected", &self.port.is_some())
            .field("decode_failures", &self.decode_failures)
            .field("read_failures", &self.read_failures)
            .finish_non_exhaustive()
    }
}

impl TelemetryChannel<TokioSerialConnector> {
    /// Channel for a real serial device
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use emg_recorder::telemetry::{TelemetryChannel, TelemetrySource};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut channel = TelemetryChannel::new("/dev/ttyACM0", 115_200);
    ///     channel.connect()?;
    ///     if let Some(record) = channel.poll().await {
    ///         println!("accX = {}", record.acc_x);
    ///     }
    ///     channel.close()?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(device_path: impl Into<String>, baud_rate: u32) -> Self {
        Self::with_connector(TokioSerialConnector, device_path, baud_rate)
    }
}

impl<C: SerialConnector> TelemetryChannel<C> {
    pub fn with_connector(connector: C, device_path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            connector,
            device_path: device_path.into(),
            baud_rate,
            port: None,
            framer: LineFramer::new(),
            decode_failures: 0,
            read_failures: 0,
            read_failing: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Lines dropped because they could not be decoded or never terminated
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures + self.framer.discarded()
    }

    /// Polls whose serial read failed
    pub fn read_failures(&self) -> u64 {
        self.read_failures
    }
}

#[async_trait]
impl<C: SerialConnector> TelemetrySource for TelemetryChannel<C> {
    fn connect(&mut self) -> Result<()> {
        let mut port = self.connector.open(&self.device_path, self.baud_rate)?;
        port.clear_input().map_err(|e| {
            RecorderError::Serial(format!("Failed to flush input of {}: {}", self.device_path, e))
        })?;
        self.framer.clear();
        self.read_failing = false;
        self.port = Some(port);
        info!("Telemetry link open on {} at {} baud", self.device_path, self.baud_rate);
        Ok(())
    }

    async fn poll(&mut self) -> Option<TelemetryRecord> {
        let port = self.port.as_mut()?;

        match port.read_available(self.framer.buffer_mut()).await {
            Ok(_) => {
                if self.read_failing {
                    info!("Telemetry reads on {} recovered", self.device_path);
                    self.read_failing = false;
                }
            }
            Err(e) => {
                self.read_failures += 1;
                // Warn once per outage; a missing board fails every iteration
                if self.read_failing {
                    debug!("Telemetry read failed on {}: {}", self.device_path, e);
                } else {
                    warn!("Telemetry read failed on {}: {}", self.device_path, e);
                    self.read_failing = true;
                }
            }
        }

        let line = self.framer.next_line()?;
        match decode_line(&line) {
            Ok(record) => Some(record),
            Err(e) => {
                self.decode_failures += 1;
                debug!("Dropping telemetry line: {}", e);
                None
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            self.framer.clear();
            info!("Telemetry link on {} closed", self.device_path);
        }
        Ok(())
    }
}

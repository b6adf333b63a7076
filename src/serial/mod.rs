//! # Serial Communication Module
//!
//! Handles the serial link to the accelerometer board.
//!
//! This module handles:
//! - Opening the serial port at 115,200 baud (8N1, no flow control)
//! - Non-blocking reads of whatever the board has sent
//! - Clearing stale input when the link is (re)opened

pub mod port_trait;

pub use port_trait::{SerialConnector, SerialPortIO, TokioSerialPort};

use crate::error::{RecorderError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Baud rate used by the accelerometer board firmware
pub const TELEMETRY_BAUD_RATE: u32 = 115_200;

/// Conventional device path of a USB CDC board
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyACM0";

/// Opens real serial ports through tokio-serial
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSerialConnector;

impl SerialConnector for TokioSerialConnector {
    type Port = TokioSerialPort;

    fn open(&self, path: &str, baud_rate: u32) -> Result<TokioSerialPort> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);
        let port = open_port(path, baud_rate)?;
        info!("Successfully opened serial device at {}", path);
        Ok(TokioSerialPort::new(port))
    }
}

/// Open a specific serial port with 8N1 settings
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyACM0")
/// * `baud_rate` - Line speed
///
/// # Returns
///
/// * `Result<SerialStream>` - Opened serial port
fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| RecorderError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(TELEMETRY_BAUD_RATE, 115_200);
        assert_eq!(DEFAULT_DEVICE_PATH, "/dev/ttyACM0");
    }

    #[tokio::test]
    async fn test_open_port_with_invalid_path_returns_error() {
        let result = open_port("/dev/nonexistent_serial_device_12345", TELEMETRY_BAUD_RATE);

        match result {
            Err(RecorderError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            Err(other) => panic!("Expected Serial error, got: {:?}", other),
            Ok(_) => panic!("Opening a nonexistent device should fail"),
        }
    }

    #[tokio::test]
    async fn test_connector_propagates_open_failure() {
        let result = TokioSerialConnector.open("/dev/nonexistent0", TELEMETRY_BAUD_RATE);
        assert!(matches!(result, Err(RecorderError::Serial(_))));
    }

    // Integration test - only runs if the board is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_open_with_real_hardware() {
        match TokioSerialConnector.open(DEFAULT_DEVICE_PATH, TELEMETRY_BAUD_RATE) {
            Ok(_) => println!("Opened board at {}", DEFAULT_DEVICE_PATH),
            Err(e) => println!("No board detected (this is OK for CI/CD): {}", e),
        }
    }
}

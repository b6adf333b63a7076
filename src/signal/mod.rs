//! # Signal Module
//!
//! EMG signal captured through an audio-style input device.
//!
//! This module handles:
//! - Opening a mono, 16-bit capture stream at a fixed rate
//! - Re-slicing device buffers into fixed-size chunks
//! - Handing chunks from the device thread to the acquisition loop
//! - Reporting the stream format the waveform exporter needs

pub mod chunker;
pub mod device;

pub use device::SignalChannel;

use async_trait::async_trait;

use crate::error::Result;

/// Bytes per sample for signed 16-bit PCM
pub const SAMPLE_WIDTH: u16 = 2;

/// Fixed capture stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalFormat {
    /// Interleaved channel count
    pub channels: u16,
    /// Frames per second
    pub sample_rate: u32,
    /// Samples per chunk
    pub chunk_size: usize,
}

impl SignalFormat {
    /// Bytes per sample
    pub fn sample_width(&self) -> u16 {
        SAMPLE_WIDTH
    }

    pub fn bits_per_sample(&self) -> u16 {
        SAMPLE_WIDTH * 8
    }

    /// Bytes in one full chunk
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_size * SAMPLE_WIDTH as usize
    }

    /// Real time covered by one chunk
    pub fn chunk_period(&self) -> std::time::Duration {
        let frames = self.chunk_size as f64 / self.channels.max(1) as f64;
        std::time::Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

impl Default for SignalFormat {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 44100,
            chunk_size: 1024,
        }
    }
}

/// One fixed-size block of signed 16-bit samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalChunk {
    samples: Vec<i16>,
}

impl SignalChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Source of signal chunks for the acquisition loop
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSource: Send {
    /// Open the capture stream and acquire the device
    fn connect(&mut self) -> Result<()>;

    /// Wait for the next full chunk
    async fn poll(&mut self) -> Result<SignalChunk>;

    /// Stop the stream and release the device
    fn close(&mut self) -> Result<()>;

    /// Format reported to the waveform exporter
    fn format(&self) -> SignalFormat;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_format() {
        let format = SignalFormat::default();
        assert_eq!(format.channels, 1);
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.chunk_size, 1024);
        assert_eq!(format.sample_width(), 2);
        assert_eq!(format.bits_per_sample(), 16);
        assert_eq!(format.chunk_bytes(), 2048);
    }

    #[test]
    fn test_chunk_period() {
        let format = SignalFormat {
            channels: 1,
            sample_rate: 1000,
            chunk_size: 250,
        };
        assert_eq!(format.chunk_period(), Duration::from_millis(250));

        // Default format: 1024 / 44100 s
        let period = SignalFormat::default().chunk_period();
        assert!(period > Duration::from_millis(23) && period < Duration::from_millis(24));
    }

    #[test]
    fn test_chunk_period_stereo() {
        let format = SignalFormat {
            channels: 2,
            sample_rate: 1000,
            chunk_size: 500,
        };
        assert_eq!(format.chunk_period(), Duration::from_millis(250));
    }

    #[test]
    fn test_signal_chunk_accessors() {
        let chunk = SignalChunk::new(vec![1, -2, 3]);
        assert_eq!(chunk.len(), 3);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.samples(), &[1, -2, 3]);
    }
}

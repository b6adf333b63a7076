//! # EMG Recorder Library
//!
//! Record accelerometer telemetry and an EMG signal side by side.
//!
//! This library provides the acquisition loop that polls a serial sensor
//! board and an audio-style capture device, merges both streams under
//! shared timestamp keys, and exports the result as CSV and WAV.

pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod recorder;
pub mod serial;
pub mod signal;
pub mod telemetry;

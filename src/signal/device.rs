//! # Capture Device
//!
//! `SignalChannel` drives an audio input through cpal.
//!
//! The cpal stream lives on a dedicated capture thread for its whole life:
//! it is built and started in [`SignalSource::connect`] and dropped when
//! [`SignalSource::close`] stops the thread. The device callback re-slices
//! samples into fixed chunks and queues them for [`SignalSource::poll`].

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use super::chunker::Chunker;
use super::{SignalChunk, SignalFormat, SignalSource};
use crate::dataset::MAX_CHUNK_SAMPLES;
use crate::error::{RecorderError, Result};

/// Failure state shared between the device callbacks and the poller
#[derive(Debug, Default)]
struct CaptureShared {
    fault: Mutex<Option<String>>,
    wake: Notify,
}

impl CaptureShared {
    /// Record the first fault and wake a waiting poll
    fn fail(&self, msg: String) {
        if let Ok(mut fault) = self.fault.lock() {
            if fault.is_none() {
                *fault = Some(msg);
            }
        }
        self.wake.notify_one();
    }

    fn fault(&self) -> Option<String> {
        self.fault.lock().ok().and_then(|fault| fault.clone())
    }
}

/// Callback side of the chunk queue
struct ChunkSink {
    tx: mpsc::Sender<SignalChunk>,
    shared: Arc<CaptureShared>,
}

impl ChunkSink {
    fn deliver(&self, chunk: SignalChunk) {
        match self.tx.try_send(chunk) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared.fail("Input overflowed: chunk queue is full".to_string());
            }
            // Poller gone; the stream is being torn down
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Running capture thread and the receiving end of its queue
struct CaptureThread {
    chunks: mpsc::Receiver<SignalChunk>,
    shared: Arc<CaptureShared>,
    stop_tx: std_mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureThread {
    fn stop(mut self) -> Result<()> {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| RecorderError::SignalStream("Capture thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

/// Audio-style capture channel carrying the EMG signal
pub struct SignalChannel {
    format: SignalFormat,
    device_name: Option<String>,
    queue_chunks: usize,
    capture: Option<CaptureThread>,
}

impl std::fmt::Debug for SignalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalChannel")
            .field("format", &self.format)
            .field("device_name", &self.device_name)
            .field("connected", &self.capture.is_some())
            .finish_non_exhaustive()
    }
}

impl SignalChannel {
    /// Create a channel for `device_name`, or the default input device when `None`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use emg_recorder::signal::{SignalChannel, SignalFormat, SignalSource};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut channel = SignalChannel::new(SignalFormat::default(), None, 64);
    ///     channel.connect()?;
    ///     let chunk = channel.poll().await?;
    ///     assert_eq!(chunk.len(), 1024);
    ///     channel.close()?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(format: SignalFormat, device_name: Option<String>, queue_chunks: usize) -> Self {
        Self {
            format,
            device_name,
            queue_chunks,
            capture: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.capture.is_some()
    }
}

#[async_trait]
impl SignalSource for SignalChannel {
    fn connect(&mut self) -> Result<()> {
        if self.capture.is_some() {
            return Err(RecorderError::InvalidState("Signal channel already connected".to_string()));
        }
        if !(1..=MAX_CHUNK_SAMPLES).contains(&self.format.chunk_size) {
            return Err(RecorderError::AudioDevice(format!(
                "Chunk size must be between 1 and {}, got {}",
                MAX_CHUNK_SAMPLES, self.format.chunk_size
            )));
        }
        if self.queue_chunks == 0 {
            return Err(RecorderError::AudioDevice("Queue length must be positive".to_string()));
        }

        let capture = start_capture(self.device_name.clone(), self.format, self.queue_chunks)?;
        self.capture = Some(capture);
        Ok(())
    }

    async fn poll(&mut self) -> Result<SignalChunk> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| RecorderError::SignalStream("Capture stream is not open".to_string()))?;

        if let Some(msg) = capture.shared.fault() {
            return Err(RecorderError::SignalStream(msg));
        }

        tokio::select! {
            biased;
            chunk = capture.chunks.recv() => {
                chunk.ok_or_else(|| {
                    RecorderError::SignalStream("Capture thread stopped".to_string())
                })
            }
            _ = capture.shared.wake.notified() => {
                let msg = capture
                    .shared
                    .fault()
                    .unwrap_or_else(|| "Capture stream failed".to_string());
                Err(RecorderError::SignalStream(msg))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.capture.take() {
            Some(capture) => {
                capture.stop()?;
                info!("Signal capture stream closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn format(&self) -> SignalFormat {
        self.format
    }
}

impl Drop for SignalChannel {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to release capture device: {}", e);
        }
    }
}

/// Spawn the capture thread and wait until its stream is running
fn start_capture(
    device_name: Option<String>,
    format: SignalFormat,
    queue_chunks: usize,
) -> Result<CaptureThread> {
    let (chunk_tx, chunk_rx) = mpsc::channel(queue_chunks);
    let shared = Arc::new(CaptureShared::default());
    let (ready_tx, ready_rx) = std_mpsc::channel::<Result<String>>();
    let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

    let sink = ChunkSink {
        tx: chunk_tx,
        shared: Arc::clone(&shared),
    };

    let handle = std::thread::Builder::new()
        .name("signal-capture".to_string())
        .spawn(move || {
            let stream = match open_stream(device_name.as_deref(), format, sink) {
                Ok((stream, name)) => {
                    let _ = ready_tx.send(Ok(name));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Returns on close() or when the channel owner is gone
            let _ = stop_rx.recv();
            if let Err(e) = stream.pause() {
                debug!("Pausing capture stream failed: {}", e);
            }
            drop(stream);
        })?;

    match ready_rx.recv() {
        Ok(Ok(name)) => {
            info!(
                "Capturing from '{}' ({} ch, {} Hz, {} samples/chunk)",
                name, format.channels, format.sample_rate, format.chunk_size
            );
            Ok(CaptureThread {
                chunks: chunk_rx,
                shared,
                stop_tx,
                handle: Some(handle),
            })
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            let _ = handle.join();
            Err(RecorderError::AudioDevice(
                "Capture thread exited before the stream started".to_string(),
            ))
        }
    }
}

/// Open and start the input stream; runs on the capture thread
fn open_stream(
    device_name: Option<&str>,
    format: SignalFormat,
    sink: ChunkSink,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = find_input_device(&host, device_name)?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device.default_input_config().map_err(|e| {
        RecorderError::AudioDevice(format!("No input config for '{}': {}", name, e))
    })?;

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, format.chunk_size, sink)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, format.chunk_size, sink)?,
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, format.chunk_size, sink)?,
        other => {
            return Err(RecorderError::AudioDevice(format!(
                "Unsupported native sample format {:?} on '{}'",
                other, name
            )))
        }
    };

    stream.play().map_err(|e| {
        RecorderError::AudioDevice(format!("Failed to start stream on '{}': {}", name, e))
    })?;

    Ok((stream, name))
}

fn find_input_device(host: &cpal::Host, device_name: Option<&str>) -> Result<cpal::Device> {
    match device_name {
        Some(wanted) => {
            let mut devices = host.input_devices().map_err(|e| {
                RecorderError::AudioDevice(format!("Failed to list input devices: {}", e))
            })?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| {
                    RecorderError::AudioDevice(format!("Input device '{}' not found", wanted))
                })
        }
        None => host
            .default_input_device()
            .ok_or_else(|| RecorderError::AudioDevice("No default input device".to_string())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    chunk_size: usize,
    sink: ChunkSink,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    let mut chunker = Chunker::new(chunk_size);
    let error_shared = Arc::clone(&sink.shared);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|&s| i16::from_sample(s));
                chunker.push(samples, |chunk| sink.deliver(chunk));
            },
            move |err| error_shared.fail(format!("Stream error: {}", err)),
            None,
        )
        .map_err(|e| RecorderError::AudioDevice(format!("Failed to build input stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Channel wired to a queue fed by the test instead of a device
    fn fake_channel(queue: usize) -> (SignalChannel, ChunkSink) {
        let (tx, rx) = mpsc::channel(queue);
        let shared = Arc::new(CaptureShared::default());
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let _ = stop_rx.recv();
        });

        let mut channel = SignalChannel::new(SignalFormat::default(), None, queue);
        channel.capture = Some(CaptureThread {
            chunks: rx,
            shared: Arc::clone(&shared),
            stop_tx,
            handle: Some(handle),
        });
        (channel, ChunkSink { tx, shared })
    }

    #[tokio::test]
    async fn test_poll_returns_chunks_in_order() {
        let (mut channel, sink) = fake_channel(4);
        sink.deliver(SignalChunk::new(vec![1; 1024]));
        sink.deliver(SignalChunk::new(vec![2; 1024]));

        assert_eq!(channel.poll().await.unwrap().samples()[0], 1);
        assert_eq!(channel.poll().await.unwrap().samples()[0], 2);
        channel.close().unwrap();
    }

    #[tokio::test]
    async fn test_overflow_is_fatal() {
        let (mut channel, sink) = fake_channel(1);
        sink.deliver(SignalChunk::new(vec![0; 8]));
        sink.deliver(SignalChunk::new(vec![0; 8]));

        match channel.poll().await {
            Err(RecorderError::SignalStream(msg)) => assert!(msg.contains("overflowed")),
            other => panic!("Expected SignalStream error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_error_wakes_waiting_poll() {
        let (mut channel, sink) = fake_channel(4);
        let shared = Arc::clone(&sink.shared);

        let failer = tokio::spawn(async move {
            tokio::task::yield_now().await;
            shared.fail("Stream error: device unplugged".to_string());
        });

        match channel.poll().await {
            Err(RecorderError::SignalStream(msg)) => assert!(msg.contains("unplugged")),
            other => panic!("Expected SignalStream error, got: {:?}", other),
        }
        failer.await.unwrap();
        drop(sink);
    }

    #[tokio::test]
    async fn test_poll_after_sender_dropped() {
        let (mut channel, sink) = fake_channel(4);
        drop(sink);
        assert!(matches!(channel.poll().await, Err(RecorderError::SignalStream(_))));
    }

    #[tokio::test]
    async fn test_poll_without_connect() {
        let mut channel = SignalChannel::new(SignalFormat::default(), None, 4);
        assert!(matches!(channel.poll().await, Err(RecorderError::SignalStream(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut channel, _sink) = fake_channel(4);
        assert!(channel.is_connected());
        assert!(channel.close().is_ok());
        assert!(!channel.is_connected());
        assert!(channel.close().is_ok());
    }

    #[test]
    fn test_connect_twice_is_rejected() {
        let (mut channel, _sink) = fake_channel(4);
        assert!(matches!(channel.connect(), Err(RecorderError::InvalidState(_))));
    }

    #[test]
    fn test_connect_rejects_empty_chunks() {
        let format = SignalFormat {
            chunk_size: 0,
            ..SignalFormat::default()
        };
        let mut channel = SignalChannel::new(format, None, 4);
        assert!(matches!(channel.connect(), Err(RecorderError::AudioDevice(_))));
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_connect_rejects_chunks_beyond_key_width() {
        let format = SignalFormat {
            chunk_size: MAX_CHUNK_SAMPLES + 1,
            ..SignalFormat::default()
        };
        let mut channel = SignalChannel::new(format, None, 4);
        match channel.connect() {
            Err(RecorderError::AudioDevice(msg)) => assert!(msg.contains("10000")),
            other => panic!("Expected AudioDevice error, got: {:?}", other),
        }
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_connect_rejects_empty_queue() {
        let mut channel = SignalChannel::new(SignalFormat::default(), None, 0);
        assert!(matches!(channel.connect(), Err(RecorderError::AudioDevice(_))));
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_first_fault_wins() {
        let shared = CaptureShared::default();
        shared.fail("first".to_string());
        shared.fail("second".to_string());
        assert_eq!(shared.fault().as_deref(), Some("first"));
    }

    #[test]
    fn test_format_is_reported() {
        let format = SignalFormat {
            channels: 1,
            sample_rate: 8000,
            chunk_size: 256,
        };
        let channel = SignalChannel::new(format, None, 4);
        assert_eq!(channel.format(), format);
    }

    // Integration test - only runs with a capture device present
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_capture_with_real_hardware() {
        let mut channel = SignalChannel::new(SignalFormat::default(), None, 64);
        if channel.connect().is_err() {
            println!("No capture device detected (this is OK for CI/CD)");
            return;
        }
        let chunk = channel.poll().await.unwrap();
        assert_eq!(chunk.len(), 1024);
        channel.close().unwrap();
    }
}

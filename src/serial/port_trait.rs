//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use bytes::BytesMut;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::Result;

/// Most bytes taken from the driver per read
const READ_CHUNK: usize = 1024;

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Append whatever bytes are ready to `buf` without waiting for more.
    ///
    /// Returns the number of bytes appended; `0` when nothing is pending.
    async fn read_available(&mut self, buf: &mut BytesMut) -> io::Result<usize>;

    /// Discard everything buffered on the input side
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Opens serial ports; the seam between the telemetry channel and the OS
pub trait SerialConnector: Send {
    type Port: SerialPortIO;

    /// Open `path` at `baud_rate`
    fn open(&self, path: &str, baud_rate: u32) -> Result<Self::Port>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn read_available(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let port = &mut self.port;

        // Poll the read once; Pending means nothing is waiting in the driver
        let read = poll_fn(|cx| {
            let mut read_buf = ReadBuf::new(&mut chunk);
            match Pin::new(&mut *port).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
                Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                Poll::Pending => Poll::Ready(Ok(0)),
            }
        })
        .await?;

        buf.extend_from_slice(&chunk[..read]);
        Ok(read)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        use tokio_serial::SerialPort;
        self.port
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}


#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::RecorderError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock serial port for testing
    #[derive(Clone)]
    pub struct MockSerialPort {
        pub incoming: Arc<Mutex<VecDeque<u8>>>,
        pub clear_count: Arc<AtomicUsize>,
        pub read_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                incoming: Arc::new(Mutex::new(VecDeque::new())),
                clear_count: Arc::new(AtomicUsize::new(0)),
                read_error: Arc::new(Mutex::new(None)),
            }
        }

        /// Simulate bytes arriving from the board
        pub fn push_bytes(&self, data: &[u8]) {
            self.incoming.lock().unwrap().extend(data.iter().copied());
        }

        pub fn pending(&self) -> usize {
            self.incoming.lock().unwrap().len()
        }

        pub fn clears(&self) -> usize {
            self.clear_count.load(Ordering::SeqCst)
        }

        pub fn set_read_error(&self, error: io::ErrorKind) {
            *self.read_error.lock().unwrap() = Some(error);
        }

        pub fn clear_read_error(&self) {
            *self.read_error.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn read_available(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
            if let Some(error) = *self.read_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock read error"));
            }
            let mut incoming = self.incoming.lock().unwrap();
            let count = incoming.len();
            buf.extend(incoming.drain(..));
            Ok(count)
        }

        fn clear_input(&mut self) -> io::Result<()> {
            self.incoming.lock().unwrap().clear();
            self.clear_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Mock connector handing out clones of one shared port
    #[derive(Clone)]
    pub struct MockConnector {
        pub port: MockSerialPort,
        pub fail: bool,
        pub open_count: Arc<AtomicUsize>,
    }

    impl MockConnector {
        pub fn new(port: MockSerialPort) -> Self {
            Self {
                port,
                fail: false,
                open_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(MockSerialPort::new())
            }
        }

        pub fn opens(&self) -> usize {
            self.open_count.load(Ordering::SeqCst)
        }
    }

    impl SerialConnector for MockConnector {
        type Port = MockSerialPort;

        fn open(&self, path: &str, _baud_rate: u32) -> Result<MockSerialPort> {
            self.open_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RecorderError::Serial(format!("Failed to open {}: mock", path)));
            }
            Ok(self.port.clone())
        }
    }
}

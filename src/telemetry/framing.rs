//! # Line Framing
//!
//! Splits the raw serial byte stream into newline-terminated frames.

use bytes::{Bytes, BytesMut};

/// Longest partial line kept while waiting for its terminator
pub const MAX_LINE_LEN: usize = 1024;

/// Accumulates serial bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: BytesMut,
    discarded: u64,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer that serial reads append to
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Take the next complete line, terminator stripped.
    ///
    /// Returns `None` while only a partial line is buffered. A partial line
    /// longer than [`MAX_LINE_LEN`] is dropped as garbled.
    pub fn next_line(&mut self) -> Option<Bytes> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                Some(line.freeze())
            }
            None => {
                if self.buffer.len() > MAX_LINE_LEN {
                    self.buffer.clear();
                    self.discarded += 1;
                }
                None
            }
        }
    }

    /// Drop any buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently buffered
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Overlong partial lines dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

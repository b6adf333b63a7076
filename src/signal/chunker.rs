//! Re-slices arbitrarily sized device buffers into fixed-size chunks.

use super::SignalChunk;

/// Collects samples until a full chunk is available
#[derive(Debug)]
pub struct Chunker {
    chunk_size: usize,
    pending: Vec<i16>,
}

impl Chunker {
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
        }
    }

    /// Feed samples, calling `emit` once per completed chunk in order
    pub fn push<I, F>(&mut self, samples: I, mut emit: F)
    where
        I: IntoIterator<Item = i16>,
        F: FnMut(SignalChunk),
    {
        for sample in samples {
            self.pending.push(sample);
            if self.pending.len() == self.chunk_size {
                let next = Vec::with_capacity(self.chunk_size);
                let full = std::mem::replace(&mut self.pending, next);
                emit(SignalChunk::new(full));
            }
        }
    }

    /// Samples waiting for the rest of their chunk
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

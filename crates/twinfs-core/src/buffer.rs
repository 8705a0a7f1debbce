//! Growable content buffers for file entries.
//!
//! Length is tracked as a first-class field rather than derived from the
//! data, so content containing zero bytes reports its full size. Growth
//! beyond the previous end zero-fills the gap.

use crate::error::{FsError, Result};

/// Byte storage for a single file entry.
///
/// The backing allocation only ever grows; truncation is not part of the
/// contract.
#[derive(Debug, Default, Clone)]
pub struct FileBuffer {
    data: Vec<u8>,
    len: usize,
}

impl FileBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        FileBuffer {
            data: Vec::new(),
            len: 0,
        }
    }

    /// Apparent file length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no byte has ever been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `bytes` into `[offset, offset + bytes.len())`, growing the
    /// buffer as needed. Returns the number of bytes written.
    ///
    /// Growth failure leaves the buffer untouched and surfaces as
    /// [`FsError::ResourceExhausted`].
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<usize> {
        let end = offset + bytes.len();
        if end > self.data.len() {
            let additional = end - self.data.len();
            self.data
                .try_reserve(additional)
                .map_err(|_| FsError::ResourceExhausted { bytes: additional })?;
            // Zero-fills any gap between the old end and `offset`.
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
        self.len = self.len.max(end);
        Ok(bytes.len())
    }

    /// Up to `size` bytes starting at `offset`, clamped to the tracked
    /// length. Reads at or past the end yield an empty slice.
    pub fn read(&self, offset: usize, size: usize) -> &[u8] {
        if offset >= self.len {
            return &[];
        }
        let end = self.len.min(offset.saturating_add(size));
        &self.data[offset..end]
    }
}

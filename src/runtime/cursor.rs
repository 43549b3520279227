//! Shared byte buffer plus read offset.

use crate::error::DecodeError;
use std::sync::Arc;

/// Read-only bytes shared by every cursor, pointer and instance of one decode.
pub type Buffer = Arc<[u8]>;

/// A position in a shared buffer. Every byte a decoder consumes goes through
/// [`Cursor::read`].
///
/// The offset is not checked on construction: a cursor produced from a pointer
/// may sit past the end of the buffer and only fails once it is read through,
/// even for a zero-width read.
#[derive(Debug, Clone)]
pub struct Cursor {
    buffer: Buffer,
    offset: usize,
}

impl Cursor {
    pub fn new(buffer: impl Into<Buffer>, offset: usize) -> Self {
        Cursor {
            buffer: buffer.into(),
            offset,
        }
    }

    /// A cursor on the same buffer at another position.
    pub fn at(&self, offset: usize) -> Cursor {
        Cursor {
            buffer: Arc::clone(&self.buffer),
            offset,
        }
    }

    /// Independent copy: advancing either cursor leaves the other untouched.
    pub fn snapshot(&self) -> Cursor {
        self.clone()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Bytes left between the offset and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume `width` bytes. Fails without moving when fewer remain or when
    /// the offset is past the end of the buffer.
    pub fn read(&mut self, width: usize) -> Result<&[u8], DecodeError> {
        let available = self.remaining();
        if self.offset > self.buffer.len() || width > available {
            return Err(DecodeError::BufferUnderrun {
                offset: self.offset,
                wanted: width,
                available,
            });
        }
        let start = self.offset;
        self.offset += width;
        Ok(&self.buffer[start..self.offset])
    }

    /// Consume `width` bytes without looking at them.
    pub fn skip(&mut self, width: usize) -> Result<(), DecodeError> {
        self.read(width).map(|_| ())
    }
}

//! Coded-frame accumulation buffer and its start-code list.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CollatorError, Result};
use crate::types::StartCode;

/// Append-only byte buffer for the frame currently being assembled.
///
/// The tail may be wound back (to release a PES header that was collected
/// in-line with the payload) but bytes are never inserted anywhere else.
#[derive(Debug)]
pub struct CodedFrameBuffer {
    data: BytesMut,
    max_size: usize,
}

impl CodedFrameBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(max_size.min(64 * 1024)),
            max_size,
        }
    }

    /// Append bytes, failing if the frame would exceed its maximum size.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let size = self.data.len() + bytes.len();
        if size > self.max_size {
            return Err(CollatorError::BufferOverflow {
                size,
                max: self.max_size,
            });
        }
        self.data.put_slice(bytes);
        Ok(())
    }

    /// Remove the last `count` bytes and return them.
    pub fn wind_back(&mut self, count: usize) -> Bytes {
        let at = self.data.len().saturating_sub(count);
        self.data.split_off(at).freeze()
    }

    /// The last `count` bytes (fewer if the buffer is shorter).
    pub fn tail(&self, count: usize) -> &[u8] {
        let at = self.data.len().saturating_sub(count);
        &self.data[at..]
    }

    /// Bytes from `offset` to the end.
    pub fn from_offset(&self, offset: usize) -> &[u8] {
        self.data.get(offset..).unwrap_or(&[])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Hand the accumulated bytes off, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}

/// Bounded list of markers found in the current frame, in discovery order.
#[derive(Debug)]
pub struct StartCodeList {
    codes: Vec<StartCode>,
    capacity: usize,
}

impl StartCodeList {
    pub fn new(capacity: usize) -> Self {
        Self {
            codes: Vec::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Record a marker. Offsets must not go backwards.
    pub fn push(&mut self, code: StartCode) -> Result<()> {
        if self.codes.len() >= self.capacity {
            return Err(CollatorError::StartCodeListFull(self.capacity));
        }
        debug_assert!(self.codes.last().map_or(true, |last| last.offset <= code.offset));
        self.codes.push(code);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn as_slice(&self) -> &[StartCode] {
        &self.codes
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }

    pub fn take(&mut self) -> Vec<StartCode> {
        std::mem::take(&mut self.codes)
    }
}

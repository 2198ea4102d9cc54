//! MSB-first bit cursor over a byte slice.
//!
//! Every read is bounds checked: running off the end of the slice yields
//! [`BitError::Exhausted`] instead of reading past the header that is being
//! parsed.

use crate::error::BitError;

/// Sequential big-endian bit reader.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    /// Absolute bit position within `data`.
    position: usize,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor positioned at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Reposition the cursor at the start of `byte_offset`.
    pub fn set_pointer(&mut self, byte_offset: usize) {
        self.position = byte_offset.saturating_mul(8);
    }

    /// Read the next `bits` bits (at most 32) as an unsigned value.
    pub fn get(&mut self, bits: u32) -> Result<u32, BitError> {
        let value = self.show(bits)?;
        self.position += bits as usize;
        Ok(value)
    }

    /// Read a single bit as a flag.
    pub fn get_flag(&mut self) -> Result<bool, BitError> {
        Ok(self.get(1)? != 0)
    }

    /// Return the next `bits` bits without advancing.
    pub fn show(&self, bits: u32) -> Result<u32, BitError> {
        if bits > 32 {
            return Err(BitError::InvalidWidth(bits));
        }
        self.ensure(bits as usize)?;

        let mut value: u64 = 0;
        let mut remaining = bits as usize;
        let mut position = self.position;
        while remaining > 0 {
            let byte = self.data[position / 8];
            let offset = position % 8;
            let take = (8 - offset).min(remaining);
            let chunk = (byte >> (8 - offset - take)) & (((1u16 << take) - 1) as u8);
            value = (value << take) | chunk as u64;
            remaining -= take;
            position += take;
        }
        Ok(value as u32)
    }

    /// Skip `bits` bits (marker and reserved fields).
    pub fn flush_unseen(&mut self, bits: usize) -> Result<(), BitError> {
        self.ensure(bits)?;
        self.position += bits;
        Ok(())
    }

    /// Number of bits left before the end of the slice.
    pub fn bits_remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.position)
    }

    /// Byte offset of the cursor, rounded down.
    pub fn byte_position(&self) -> usize {
        self.position / 8
    }

    fn ensure(&self, bits: usize) -> Result<(), BitError> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::Exhausted {
                requested: bits,
                available,
            });
        }
        Ok(())
    }
}

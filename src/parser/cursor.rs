//! Sequential little-endian reader over an in-memory byte buffer.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, TnefError};

/// A read position over a borrowed byte slice.
///
/// Every read checks availability first and fails with
/// [`TnefError::OutOfData`] instead of panicking. A failed read leaves the
/// offset untouched.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of unread bytes.
    pub fn available(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// The unread tail of the buffer, without advancing.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    /// Advance by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Advance to the next multiple of four from the start of the buffer,
    /// or to the end if the padding would overrun it.
    pub fn align4(&mut self) {
        let pad = (4 - self.offset % 4) % 4;
        self.offset = (self.offset + pad).min(self.data.len());
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.available() {
            return Err(TnefError::OutOfData {
                requested: n,
                available: self.available(),
            });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    /// Read `char_count` UTF-16LE code units and decode them.
    ///
    /// Unpaired surrogates become U+FFFD.
    pub fn read_utf16le(&mut self, char_count: usize) -> Result<String> {
        let bytes = self.read_bytes(char_count.saturating_mul(2))?;
        let units: Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
        Ok(String::from_utf16_lossy(&units))
    }
}

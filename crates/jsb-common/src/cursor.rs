//! Byte cursor for sequential reading and writing of fixed buffers.
//!
//! This module provides [`ByteCursor`], a position-tracking view over a byte
//! buffer. Reads work on any `AsRef<[u8]>`; writes additionally need
//! `AsMut<[u8]>`. The buffer never grows: every access is bounds-checked
//! against its fixed length.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// A bounds-checked cursor over a fixed-length byte buffer.
///
/// Every read or write advances the position by the width of the value. All
/// numeric values are little-endian.
///
/// # Example
///
/// ```
/// use jsb_common::ByteCursor;
///
/// let mut cursor = ByteCursor::new(vec![0u8; 8]);
/// cursor.write_i32_le(10).unwrap();
/// cursor.write_f32_le(1.5).unwrap();
///
/// cursor.seek(0).unwrap();
/// assert_eq!(cursor.read_i32_le().unwrap(), 10);
/// assert_eq!(cursor.read_f32_le().unwrap(), 1.5);
/// assert_eq!(cursor.remaining(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<B> {
    buf: B,
    position: usize,
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    /// Create a new cursor positioned at offset 0.
    #[inline]
    pub fn new(buf: B) -> Self {
        Self { buf, position: 0 }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Check if the underlying buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of bytes between the position and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position)
    }

    /// Borrow the underlying buffer.
    #[inline]
    pub fn get_ref(&self) -> &B {
        &self.buf
    }

    /// Consume the cursor and return the underlying buffer.
    #[inline]
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Move to an absolute offset.
    ///
    /// Seeking to exactly the buffer length is allowed (nothing remains to be
    /// read); anything further is out of bounds.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.len() {
            return Err(Error::OutOfBounds {
                offset,
                width: 0,
                len: self.len(),
            });
        }
        self.position = offset;
        Ok(())
    }

    /// Range of the next `width` bytes, or `OutOfBounds`.
    fn span(&self, width: usize) -> Result<std::ops::Range<usize>> {
        if width > self.remaining() {
            return Err(Error::OutOfBounds {
                offset: self.position,
                width,
                len: self.len(),
            });
        }
        Ok(self.position..self.position + width)
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, width: usize) -> Result<&[u8]> {
        let span = self.span(width)?;
        Ok(&self.buf.as_ref()[span])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, width: usize) -> Result<&[u8]> {
        let span = self.span(width)?;
        self.position = span.end;
        Ok(&self.buf.as_ref()[span])
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a little-endian i32.
    #[inline]
    pub fn read_i32_le(&mut self) -> Result<i32> {
        self.read_bytes(4).map(LittleEndian::read_i32)
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }

    /// Read a little-endian i64.
    #[inline]
    pub fn read_i64_le(&mut self) -> Result<i64> {
        self.read_bytes(8).map(LittleEndian::read_i64)
    }

    /// Read a little-endian f32.
    #[inline]
    pub fn read_f32_le(&mut self) -> Result<f32> {
        self.read_bytes(4).map(LittleEndian::read_f32)
    }

    /// Read a little-endian f64.
    #[inline]
    pub fn read_f64_le(&mut self) -> Result<f64> {
        self.read_bytes(8).map(LittleEndian::read_f64)
    }

    /// Read a fixed-width UTF-8 string.
    ///
    /// Exactly `width` bytes are consumed. Trailing `pad` bytes are not part
    /// of the value.
    pub fn read_fixed_string(&mut self, width: usize, pad: u8) -> Result<String> {
        let offset = self.position;
        let bytes = self.read_bytes(width)?;
        let end = bytes.iter().rposition(|&b| b != pad).map_or(0, |i| i + 1);

        std::str::from_utf8(&bytes[..end])
            .map(str::to_owned)
            .map_err(|source| Error::Utf8 { offset, source })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteCursor<B> {
    /// Mutable view of the next `width` bytes; advances the position.
    fn next_mut(&mut self, width: usize) -> Result<&mut [u8]> {
        let span = self.span(width)?;
        self.position = span.end;
        Ok(&mut self.buf.as_mut()[span])
    }

    /// Write raw bytes at the position.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.next_mut(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.next_mut(1)?[0] = value;
        Ok(())
    }

    /// Write a little-endian i32.
    #[inline]
    pub fn write_i32_le(&mut self, value: i32) -> Result<()> {
        LittleEndian::write_i32(self.next_mut(4)?, value);
        Ok(())
    }

    /// Write a little-endian i64.
    #[inline]
    pub fn write_i64_le(&mut self, value: i64) -> Result<()> {
        LittleEndian::write_i64(self.next_mut(8)?, value);
        Ok(())
    }

    /// Write a little-endian f32.
    #[inline]
    pub fn write_f32_le(&mut self, value: f32) -> Result<()> {
        LittleEndian::write_f32(self.next_mut(4)?, value);
        Ok(())
    }

    /// Write a little-endian f64.
    #[inline]
    pub fn write_f64_le(&mut self, value: f64) -> Result<()> {
        LittleEndian::write_f64(self.next_mut(8)?, value);
        Ok(())
    }

    /// Write a string into a fixed-width slot, filling the rest with `pad`.
    ///
    /// Strings longer than `width` are rejected; nothing is written on error.
    pub fn write_fixed_string(&mut self, value: &str, width: usize, pad: u8) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > width {
            return Err(Error::StringTooLong {
                len: bytes.len(),
                width,
            });
        }

        let slot = self.next_mut(width)?;
        slot[..bytes.len()].copy_from_slice(bytes);
        slot[bytes.len()..].fill(pad);
        Ok(())
    }
}

// modbreaker-parsers/src/reader.rs
//! Bounds-checked little-endian cursor shared by the binary parsers.
//!
//! Every read either returns the requested bytes or an [`Underrun`] naming
//! the offset it failed at; nothing here can index past the buffer.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;

/// A read needed more bytes than the buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer underrun at offset {offset}: needed {needed} bytes, {available} available")]
pub struct Underrun {
    /// Offset the read started at
    pub offset: usize,
    /// Bytes the read needed
    pub needed: usize,
    /// Bytes left from `offset`
    pub available: usize,
}

/// Forward-only reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reader positioned at `pos` (clamped to the buffer length)
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos: pos.min(data.len()) }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<(), Underrun> {
        if pos > self.data.len() {
            return Err(Underrun {
                offset: self.pos,
                needed: pos - self.pos.min(pos),
                available: self.remaining(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next `n` bytes without consuming them
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos.checked_add(n)?)
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Underrun> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(Underrun {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            }),
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Underrun> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, Underrun> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Underrun> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u24(&mut self) -> Result<u32, Underrun> {
        Ok(LittleEndian::read_u24(self.take(3)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Underrun> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Underrun> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64, Underrun> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Underrun> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// NUL-terminated string, returned without the terminator
    pub fn read_asciiz(&mut self) -> Result<&'a [u8], Underrun> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|b| *b == 0) {
            Some(len) => {
                let s = &rest[..len];
                self.pos += len + 1;
                Ok(s)
            }
            None => Err(Underrun {
                offset: self.pos,
                needed: rest.len() + 1,
                available: rest.len(),
            }),
        }
    }

    /// NUL-terminated string decoded as Windows-1252
    pub fn read_asciiz_string(&mut self) -> Result<String, Underrun> {
        self.read_asciiz().map(decode_name)
    }

    /// 7-bit variable-length integer (low groups first, high bit = continue)
    pub fn read_compressed_int(&mut self) -> Result<u32, Underrun> {
        let start = self.pos;
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        // More than five groups cannot encode a u32
        Err(Underrun {
            offset: start,
            needed: 6,
            available: self.data.len() - start,
        })
    }
}

/// Decode engine names (entry names, class names) as UTF-8, falling back
/// to Windows-1252 for byte strings that are not valid UTF-8.
///
/// Every byte maps to a character in the fallback, so names never fail to
/// decode.
pub fn decode_name(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endian-aware CDR read/write cursors.
//!
//! Alignment is computed relative to the start of the body (the byte after
//! the encapsulation header), as CDR requires.

use crate::error::ParseError;

pub type CdrResult<T> = Result<T, ParseError>;

/// Byte order of a serialized body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// Generate aligned write methods for primitive types.
macro_rules! impl_write {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) {
            self.align($size);
            match self.endianness {
                Endianness::Little => self.buffer.extend_from_slice(&value.to_le_bytes()),
                Endianness::Big => self.buffer.extend_from_slice(&value.to_be_bytes()),
            }
        }
    };
}

/// Generate aligned, bounds-checked read methods for primitive types.
macro_rules! impl_read {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CdrResult<$type> {
            self.align($size)?;
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.take($size)?);
            Ok(match self.endianness {
                Endianness::Little => <$type>::from_le_bytes(bytes),
                Endianness::Big => <$type>::from_be_bytes(bytes),
            })
        }
    };
}

/// Growable CDR writer.
pub struct CdrWriter {
    buffer: Vec<u8>,
    endianness: Endianness,
}

impl CdrWriter {
    pub fn new(endianness: Endianness) -> Self {
        Self {
            buffer: Vec::with_capacity(128),
            endianness,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn align(&mut self, alignment: usize) {
        if alignment <= 1 {
            return;
        }
        let padded = (self.buffer.len() + alignment - 1) & !(alignment - 1);
        self.buffer.resize(padded, 0);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    impl_write!(write_u16, u16, 2);
    impl_write!(write_u32, u32, 4);
    impl_write!(write_i32, i32, 4);
    impl_write!(write_u64, u64, 8);
    impl_write!(write_i64, i64, 8);

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Sequence/string length prefix.
    pub fn write_len(&mut self, len: usize) {
        self.write_u32(len as u32);
    }

    /// CDR string: u32 length (including NUL) + bytes + NUL.
    pub fn write_string(&mut self, value: &str) {
        self.write_len(value.len() + 1);
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0);
    }

    /// `sequence<octet>`: u32 length + raw bytes.
    pub fn write_octet_seq(&mut self, data: &[u8]) {
        self.write_len(data.len());
        self.buffer.extend_from_slice(data);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Bounds-checked CDR reader over a borrowed body.
pub struct CdrReader<'a> {
    buffer: &'a [u8],
    offset: usize,
    endianness: Endianness,
}

impl<'a> CdrReader<'a> {
    pub fn new(buffer: &'a [u8], endianness: Endianness) -> Self {
        Self {
            buffer,
            offset: 0,
            endianness,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn align(&mut self, alignment: usize) -> CdrResult<()> {
        if alignment <= 1 {
            return Ok(());
        }
        let aligned = (self.offset + alignment - 1) & !(alignment - 1);
        if aligned > self.buffer.len() {
            return Err(ParseError::Truncated {
                offset: self.offset,
                needed: aligned - self.offset,
            });
        }
        self.offset = aligned;
        Ok(())
    }

    fn take(&mut self, count: usize) -> CdrResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(ParseError::Truncated {
                offset: self.offset,
                needed: count,
            });
        }
        let slice = &self.buffer[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> CdrResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> CdrResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    impl_read!(read_u16, u16, 2);
    impl_read!(read_u32, u32, 4);
    impl_read!(read_i32, i32, 4);
    impl_read!(read_u64, u64, 8);
    impl_read!(read_i64, i64, 8);

    pub fn read_bytes(&mut self, count: usize) -> CdrResult<&'a [u8]> {
        self.take(count)
    }

    pub fn read_array<const N: usize>(&mut self) -> CdrResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Sequence length, checked against the bytes left (each element is at
    /// least `min_element_size` bytes) so a hostile length cannot trigger a
    /// huge allocation.
    pub fn read_len(&mut self, min_element_size: usize) -> CdrResult<usize> {
        let len = self.read_u32()? as usize;
        if len.saturating_mul(min_element_size.max(1)) > self.remaining() {
            return Err(ParseError::Truncated {
                offset: self.offset,
                needed: len.saturating_mul(min_element_size.max(1)),
            });
        }
        Ok(len)
    }

    pub fn read_string(&mut self) -> CdrResult<String> {
        let len = self.read_len(1)?;
        if len == 0 {
            return Ok(String::new());
        }
        let raw = self.take(len)?;
        let text = raw.strip_suffix(&[0]).unwrap_or(raw);
        String::from_utf8(text.to_vec())
            .map_err(|_| ParseError::InvalidValue("string is not UTF-8".into()))
    }

    pub fn read_octet_seq(&mut self) -> CdrResult<Vec<u8>> {
        let len = self.read_len(1)?;
        Ok(self.take(len)?.to_vec())
    }
}

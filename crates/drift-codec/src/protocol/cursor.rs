// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked read cursor shared by the wire protocols.

use crate::error::{CodecError, CodecResult};

/// Generate fixed-width read methods.
///
/// Each generated method checks the remaining length, decodes with the given
/// byte order and advances the offset.
macro_rules! impl_read {
    ($name:ident, $type:ty, $size:expr, $from:ident) => {
        pub fn $name(&mut self) -> CodecResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::$from(bytes))
        }
    };
}

/// Immutable cursor over an input buffer.
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read!(read_i16_be, i16, 2, from_be_bytes);
    impl_read!(read_i32_be, i32, 4, from_be_bytes);
    impl_read!(read_i64_be, i64, 8, from_be_bytes);
    impl_read!(read_u32_le, u32, 4, from_le_bytes);
    impl_read!(read_u64_le, u64, 8, from_le_bytes);

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::protocol(format!(
                "unexpected end of buffer at offset {} (need {} bytes, have {})",
                self.offset,
                len,
                self.remaining()
            )));
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_big_endian() {
        let data = [0x12, 0x34, 0x00, 0x00, 0x01, 0x02];
        let mut cursor = Cursor::new(&data);
        assert_eq!(cursor.read_i16_be().unwrap(), 0x1234);
        assert_eq!(cursor.read_i32_be().unwrap(), 0x0102);
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_read_little_endian() {
        let data = [0x78, 0x56, 0x34, 0x12];
        let mut cursor = Cursor::new(&data);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_overflow_reports_offset() {
        let data = [0u8; 3];
        let mut cursor = Cursor::new(&data);
        cursor.read_u8().unwrap();
        let err = cursor.read_i32_be().unwrap_err();
        assert!(err.to_string().contains("offset 1"));
        // offset untouched by the failed read
        assert_eq!(cursor.offset(), 1);
        assert_eq!(cursor.remaining(), 2);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thrift binary protocol (strict envelopes, big-endian fixed-width integers).

use super::cursor::Cursor;
use super::{
    checked_size, FieldHeader, ListHeader, MapHeader, MessageHeader, MessageType, ProtocolRead,
    ProtocolType, ProtocolWrite,
};
use crate::error::{CodecError, CodecResult};

/// Strict binary protocol version marker.
pub const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

/// Marker type for the binary protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryProtocol;

/// Binary protocol reader.
pub struct BinaryReader<'a> {
    cursor: Cursor<'a>,
}

impl<'a> BinaryReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
        }
    }

    fn read_size(&mut self, what: &str) -> CodecResult<usize> {
        let size = self.cursor.read_i32_be()?;
        checked_size(size as i64, self.cursor.remaining(), what)
    }
}

impl ProtocolRead for BinaryReader<'_> {
    fn read_message_begin(&mut self) -> CodecResult<MessageHeader> {
        let size = self.cursor.read_i32_be()?;
        if size < 0 {
            let version = size as u32 & VERSION_MASK;
            if version != VERSION_1 {
                return Err(CodecError::protocol(format!(
                    "bad binary protocol version {:#010x}",
                    version
                )));
            }
            let message_type = MessageType::from_u8((size as u32 & 0xff) as u8)?;
            let name = self.read_string()?;
            let sequence_id = self.cursor.read_i32_be()?;
            Ok(MessageHeader {
                name,
                message_type,
                sequence_id,
            })
        } else {
            // Pre-versioned envelope: name length first.
            let len = checked_size(size as i64, self.cursor.remaining(), "message name")?;
            let name = String::from_utf8(self.cursor.read_bytes(len)?.to_vec())?;
            let message_type = MessageType::from_u8(self.cursor.read_u8()?)?;
            let sequence_id = self.cursor.read_i32_be()?;
            Ok(MessageHeader {
                name,
                message_type,
                sequence_id,
            })
        }
    }

    fn read_struct_begin(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> CodecResult<FieldHeader> {
        let kind = ProtocolType::from_u8(self.cursor.read_u8()?)?;
        if kind == ProtocolType::Stop {
            return Ok(FieldHeader::STOP);
        }
        let id = self.cursor.read_i16_be()?;
        Ok(FieldHeader { kind, id })
    }

    fn read_list_begin(&mut self) -> CodecResult<ListHeader> {
        let element = ProtocolType::from_u8(self.cursor.read_u8()?)?;
        let size = self.read_size("list")?;
        Ok(ListHeader { element, size })
    }

    fn read_set_begin(&mut self) -> CodecResult<ListHeader> {
        let element = ProtocolType::from_u8(self.cursor.read_u8()?)?;
        let size = self.read_size("set")?;
        Ok(ListHeader { element, size })
    }

    fn read_map_begin(&mut self) -> CodecResult<MapHeader> {
        let key = ProtocolType::from_u8(self.cursor.read_u8()?)?;
        let value = ProtocolType::from_u8(self.cursor.read_u8()?)?;
        let size = self.read_size("map")?;
        Ok(MapHeader { key, value, size })
    }

    fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.cursor.read_u8()? == 1)
    }

    fn read_byte(&mut self) -> CodecResult<i8> {
        Ok(self.cursor.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> CodecResult<i16> {
        self.cursor.read_i16_be()
    }

    fn read_i32(&mut self) -> CodecResult<i32> {
        self.cursor.read_i32_be()
    }

    fn read_i64(&mut self) -> CodecResult<i64> {
        self.cursor.read_i64_be()
    }

    fn read_double(&mut self) -> CodecResult<f64> {
        Ok(f64::from_bits(self.cursor.read_i64_be()? as u64))
    }

    fn read_float(&mut self) -> CodecResult<f32> {
        Ok(f32::from_bits(self.cursor.read_i32_be()? as u32))
    }

    fn read_string(&mut self) -> CodecResult<String> {
        Ok(String::from_utf8(self.read_binary()?)?)
    }

    fn read_binary(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_size("string")?;
        Ok(self.cursor.read_bytes(len)?.to_vec())
    }

    fn remaining(&self) -> usize {
        self.cursor.remaining()
    }
}

/// Binary protocol writer appending to a byte buffer.
pub struct BinaryWriter<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> BinaryWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out }
    }

    fn write_size(&mut self, size: usize, what: &str) -> CodecResult<()> {
        let size = i32::try_from(size)
            .map_err(|_| CodecError::protocol(format!("{} size {} exceeds i32", what, size)))?;
        self.out.extend_from_slice(&size.to_be_bytes());
        Ok(())
    }
}

impl ProtocolWrite for BinaryWriter<'_> {
    fn write_message_begin(&mut self, header: &MessageHeader) -> CodecResult<()> {
        let version = VERSION_1 | header.message_type as u32;
        self.out.extend_from_slice(&version.to_be_bytes());
        self.write_string(&header.name)?;
        self.write_i32(header.sequence_id)
    }

    fn write_struct_begin(&mut self, _name: &str) -> CodecResult<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, _name: &str, kind: ProtocolType, id: i16) -> CodecResult<()> {
        self.out.push(kind.as_u8());
        self.write_i16(id)
    }

    fn write_field_stop(&mut self) -> CodecResult<()> {
        self.out.push(ProtocolType::Stop.as_u8());
        Ok(())
    }

    fn write_list_begin(&mut self, element: ProtocolType, size: usize) -> CodecResult<()> {
        self.out.push(element.as_u8());
        self.write_size(size, "list")
    }

    fn write_set_begin(&mut self, element: ProtocolType, size: usize) -> CodecResult<()> {
        self.out.push(element.as_u8());
        self.write_size(size, "set")
    }

    fn write_map_begin(
        &mut self,
        key: ProtocolType,
        value: ProtocolType,
        size: usize,
    ) -> CodecResult<()> {
        self.out.push(key.as_u8());
        self.out.push(value.as_u8());
        self.write_size(size, "map")
    }

    fn write_bool(&mut self, value: bool) -> CodecResult<()> {
        self.out.push(u8::from(value));
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> CodecResult<()> {
        self.out.push(value as u8);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_bits().to_be_bytes());
        Ok(())
    }

    fn write_float(&mut self, value: f32) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_bits().to_be_bytes());
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> CodecResult<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> CodecResult<()> {
        self.write_size(value.len(), "string")?;
        self.out.extend_from_slice(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_header_bytes() {
        let mut out = Vec::new();
        let mut writer = BinaryWriter::new(&mut out);
        writer
            .write_message_begin(&MessageHeader::new("ping", MessageType::Call, 7))
            .unwrap();
        assert_eq!(
            out,
            vec![0x80, 0x01, 0x00, 0x01, 0, 0, 0, 4, b'p', b'i', b'n', b'g', 0, 0, 0, 7]
        );

        let mut reader = BinaryReader::new(&out);
        let header = reader.read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("ping", MessageType::Call, 7));
    }

    #[test]
    fn test_non_strict_message_header() {
        let bytes = [0, 0, 0, 2, b'h', b'i', 2, 0, 0, 0, 9];
        let mut reader = BinaryReader::new(&bytes);
        let header = reader.read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("hi", MessageType::Reply, 9));
    }

    #[test]
    fn test_bad_version_rejected() {
        let bytes = [0x80, 0x02, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 1];
        let mut reader = BinaryReader::new(&bytes);
        assert!(matches!(
            reader.read_message_begin(),
            Err(CodecError::Protocol(_))
        ));
    }

    #[test]
    fn test_field_header_and_primitives() {
        let mut out = Vec::new();
        {
            let mut writer = BinaryWriter::new(&mut out);
            writer.write_field_begin("x", ProtocolType::I32, 3).unwrap();
            writer.write_i32(-2).unwrap();
            writer.write_field_begin("d", ProtocolType::Double, 4).unwrap();
            writer.write_double(1.5).unwrap();
            writer.write_field_stop().unwrap();
        }
        assert_eq!(&out[..7], &[8, 0, 3, 0xff, 0xff, 0xff, 0xfe]);

        let mut reader = BinaryReader::new(&out);
        let header = reader.read_field_begin().unwrap();
        assert_eq!(header, FieldHeader { kind: ProtocolType::I32, id: 3 });
        assert_eq!(reader.read_i32().unwrap(), -2);
        reader.read_field_begin().unwrap();
        assert_eq!(reader.read_double().unwrap(), 1.5);
        assert!(reader.read_field_begin().unwrap().is_stop());
    }

    #[test]
    fn test_oversized_string_rejected() {
        let bytes = [0, 0, 0, 100, b'a'];
        let mut reader = BinaryReader::new(&bytes);
        assert!(reader.read_string().is_err());
    }

    #[test]
    fn test_negative_list_size_rejected() {
        let bytes = [8, 0xff, 0xff, 0xff, 0xff];
        let mut reader = BinaryReader::new(&bytes);
        assert!(reader.read_list_begin().is_err());
    }
}

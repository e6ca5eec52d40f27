// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thrift compact protocol.
//!
//! Integers are zigzag varints, field ids are delta-encoded against the
//! previous field of the same struct, and boolean fields fold their value into
//! the field header.

use super::cursor::Cursor;
use super::{
    checked_size, FieldHeader, ListHeader, MapHeader, MessageHeader, MessageType, ProtocolRead,
    ProtocolType, ProtocolWrite,
};
use crate::error::{CodecError, CodecResult};

pub const PROTOCOL_ID: u8 = 0x82;
pub const VERSION: u8 = 1;
const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;

// Compact type nibbles.
const CT_STOP: u8 = 0;
const CT_BOOLEAN_TRUE: u8 = 1;
const CT_BOOLEAN_FALSE: u8 = 2;
const CT_BYTE: u8 = 3;
const CT_I16: u8 = 4;
const CT_I32: u8 = 5;
const CT_I64: u8 = 6;
const CT_DOUBLE: u8 = 7;
const CT_BINARY: u8 = 8;
const CT_LIST: u8 = 9;
const CT_SET: u8 = 10;
const CT_MAP: u8 = 11;
const CT_STRUCT: u8 = 12;
const CT_FLOAT: u8 = 13;

fn to_compact(kind: ProtocolType) -> CodecResult<u8> {
    Ok(match kind {
        ProtocolType::Stop => CT_STOP,
        ProtocolType::Bool => CT_BOOLEAN_TRUE,
        ProtocolType::Byte => CT_BYTE,
        ProtocolType::I16 => CT_I16,
        ProtocolType::I32 => CT_I32,
        ProtocolType::I64 => CT_I64,
        ProtocolType::Double => CT_DOUBLE,
        ProtocolType::String => CT_BINARY,
        ProtocolType::List => CT_LIST,
        ProtocolType::Set => CT_SET,
        ProtocolType::Map => CT_MAP,
        ProtocolType::Struct => CT_STRUCT,
        ProtocolType::Float => CT_FLOAT,
        ProtocolType::Void => {
            return Err(CodecError::protocol("void has no compact encoding"));
        }
    })
}

fn from_compact(nibble: u8) -> CodecResult<ProtocolType> {
    Ok(match nibble {
        CT_STOP => ProtocolType::Stop,
        CT_BOOLEAN_TRUE | CT_BOOLEAN_FALSE => ProtocolType::Bool,
        CT_BYTE => ProtocolType::Byte,
        CT_I16 => ProtocolType::I16,
        CT_I32 => ProtocolType::I32,
        CT_I64 => ProtocolType::I64,
        CT_DOUBLE => ProtocolType::Double,
        CT_BINARY => ProtocolType::String,
        CT_LIST => ProtocolType::List,
        CT_SET => ProtocolType::Set,
        CT_MAP => ProtocolType::Map,
        CT_STRUCT => ProtocolType::Struct,
        CT_FLOAT => ProtocolType::Float,
        other => {
            return Err(CodecError::protocol(format!(
                "unknown compact type {}",
                other
            )));
        }
    })
}

fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Marker type for the compact protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactProtocol;

/// Compact protocol reader.
pub struct CompactReader<'a> {
    cursor: Cursor<'a>,
    last_field_id: i16,
    field_id_stack: Vec<i16>,
    pending_bool: Option<bool>,
}

impl<'a> CompactReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
            last_field_id: 0,
            field_id_stack: Vec::new(),
            pending_bool: None,
        }
    }

    fn read_varint64(&mut self) -> CodecResult<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.cursor.read_u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 64 {
                return Err(CodecError::protocol(format!(
                    "varint too long at offset {}",
                    self.cursor.offset()
                )));
            }
        }
    }

    fn read_varint32(&mut self) -> CodecResult<u32> {
        let value = self.read_varint64()?;
        u32::try_from(value)
            .map_err(|_| CodecError::protocol(format!("varint {} overflows 32 bits", value)))
    }

    fn read_size(&mut self, what: &str) -> CodecResult<usize> {
        let size = self.read_varint32()?;
        checked_size(i64::from(size), self.cursor.remaining(), what)
    }

    fn read_collection_header(&mut self, what: &str) -> CodecResult<ListHeader> {
        let header = self.cursor.read_u8()?;
        let element = from_compact(header & 0x0f)?;
        let short_size = (header >> 4) & 0x0f;
        let size = if short_size == 0x0f {
            self.read_size(what)?
        } else {
            checked_size(i64::from(short_size), self.cursor.remaining(), what)?
        };
        Ok(ListHeader { element, size })
    }
}

impl ProtocolRead for CompactReader<'_> {
    fn read_message_begin(&mut self) -> CodecResult<MessageHeader> {
        let protocol_id = self.cursor.read_u8()?;
        if protocol_id != PROTOCOL_ID {
            return Err(CodecError::protocol(format!(
                "expected compact protocol id {:#04x}, got {:#04x}",
                PROTOCOL_ID, protocol_id
            )));
        }
        let version_and_type = self.cursor.read_u8()?;
        let version = version_and_type & VERSION_MASK;
        if version != VERSION {
            return Err(CodecError::protocol(format!(
                "expected compact version {}, got {}",
                VERSION, version
            )));
        }
        let message_type = MessageType::from_u8((version_and_type >> TYPE_SHIFT) & 0x07)?;
        let sequence_id = self.read_varint32()? as i32;
        let name = self.read_string()?;
        Ok(MessageHeader {
            name,
            message_type,
            sequence_id,
        })
    }

    fn read_struct_begin(&mut self) -> CodecResult<()> {
        self.field_id_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn read_struct_end(&mut self) -> CodecResult<()> {
        self.last_field_id = self
            .field_id_stack
            .pop()
            .ok_or_else(|| CodecError::IllegalState("unbalanced struct end".into()))?;
        Ok(())
    }

    fn read_field_begin(&mut self) -> CodecResult<FieldHeader> {
        let header = self.cursor.read_u8()?;
        let nibble = header & 0x0f;
        if nibble == CT_STOP {
            return Ok(FieldHeader::STOP);
        }
        let delta = (header >> 4) & 0x0f;
        let id = if delta == 0 {
            let raw = unzigzag32(self.read_varint32()?);
            i16::try_from(raw)
                .map_err(|_| CodecError::protocol(format!("field id {} out of range", raw)))?
        } else {
            self.last_field_id.wrapping_add(i16::from(delta))
        };
        let kind = from_compact(nibble)?;
        if kind == ProtocolType::Bool {
            self.pending_bool = Some(nibble == CT_BOOLEAN_TRUE);
        }
        self.last_field_id = id;
        Ok(FieldHeader { kind, id })
    }

    fn read_list_begin(&mut self) -> CodecResult<ListHeader> {
        self.read_collection_header("list")
    }

    fn read_set_begin(&mut self) -> CodecResult<ListHeader> {
        self.read_collection_header("set")
    }

    fn read_map_begin(&mut self) -> CodecResult<MapHeader> {
        let size = self.read_size("map")?;
        if size == 0 {
            // empty maps carry no key/value byte
            return Ok(MapHeader {
                key: ProtocolType::Stop,
                value: ProtocolType::Stop,
                size,
            });
        }
        let kinds = self.cursor.read_u8()?;
        Ok(MapHeader {
            key: from_compact(kinds >> 4)?,
            value: from_compact(kinds & 0x0f)?,
            size,
        })
    }

    fn read_bool(&mut self) -> CodecResult<bool> {
        if let Some(value) = self.pending_bool.take() {
            return Ok(value);
        }
        Ok(self.cursor.read_u8()? == CT_BOOLEAN_TRUE)
    }

    fn read_byte(&mut self) -> CodecResult<i8> {
        Ok(self.cursor.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> CodecResult<i16> {
        let raw = unzigzag32(self.read_varint32()?);
        i16::try_from(raw).map_err(|_| CodecError::protocol(format!("i16 {} out of range", raw)))
    }

    fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(unzigzag32(self.read_varint32()?))
    }

    fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(unzigzag64(self.read_varint64()?))
    }

    fn read_double(&mut self) -> CodecResult<f64> {
        Ok(f64::from_bits(self.cursor.read_u64_le()?))
    }

    fn read_float(&mut self) -> CodecResult<f32> {
        Ok(f32::from_bits(self.cursor.read_u32_le()?))
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

/// Compact protocol writer appending to a byte buffer.
pub struct CompactWriter<'a> {
    out: &'a mut Vec<u8>,
    last_field_id: i16,
    field_id_stack: Vec<i16>,
    pending_bool_field: Option<i16>,
}

impl<'a> CompactWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            last_field_id: 0,
            field_id_stack: Vec::new(),
            pending_bool_field: None,
        }
    }

    fn write_varint64(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.out.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.out.push(value as u8);
    }

    fn write_varint32(&mut self, value: u32) {
        self.write_varint64(u64::from(value));
    }

    fn write_size(&mut self, size: usize, what: &str) -> CodecResult<()> {
        let size = i32::try_from(size)
            .map_err(|_| CodecError::protocol(format!("{} size {} exceeds i32", what, size)))?;
        self.write_varint32(size as u32);
        Ok(())
    }

    fn write_field_header(&mut self, nibble: u8, id: i16) {
        let delta = i32::from(id) - i32::from(self.last_field_id);
        if delta > 0 && delta <= 15 {
            self.out.push(((delta as u8) << 4) | nibble);
        } else {
            self.out.push(nibble);
            self.write_varint32(zigzag32(i32::from(id)));
        }
        self.last_field_id = id;
    }

    fn write_collection_header(
        &mut self,
        element: ProtocolType,
        size: usize,
        what: &str,
    ) -> CodecResult<()> {
        let nibble = to_compact(element)?;
        if size <= 14 {
            self.out.push(((size as u8) << 4) | nibble);
            Ok(())
        } else {
            self.out.push(0xf0 | nibble);
            self.write_size(size, what)
        }
    }
}

impl ProtocolWrite for CompactWriter<'_> {
    fn write_message_begin(&mut self, header: &MessageHeader) -> CodecResult<()> {
        self.out.push(PROTOCOL_ID);
        self.out
            .push((VERSION & VERSION_MASK) | ((header.message_type as u8) << TYPE_SHIFT));
        self.write_varint32(header.sequence_id as u32);
        self.write_string(&header.name)
    }

    fn write_struct_begin(&mut self, _name: &str) -> CodecResult<()> {
        self.field_id_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn write_struct_end(&mut self) -> CodecResult<()> {
        self.last_field_id = self
            .field_id_stack
            .pop()
            .ok_or_else(|| CodecError::IllegalState("unbalanced struct end".into()))?;
        Ok(())
    }

    fn write_field_begin(&mut self, _name: &str, kind: ProtocolType, id: i16) -> CodecResult<()> {
        if kind == ProtocolType::Bool {
            // header deferred until the value is known
            self.pending_bool_field = Some(id);
            return Ok(());
        }
        let nibble = to_compact(kind)?;
        self.write_field_header(nibble, id);
        Ok(())
    }

    fn write_field_stop(&mut self) -> CodecResult<()> {
        self.out.push(CT_STOP);
        Ok(())
    }

    fn write_list_begin(&mut self, element: ProtocolType, size: usize) -> CodecResult<()> {
        self.write_collection_header(element, size, "list")
    }

    fn write_set_begin(&mut self, element: ProtocolType, size: usize) -> CodecResult<()> {
        self.write_collection_header(element, size, "set")
    }

    fn write_map_begin(
        &mut self,
        key: ProtocolType,
        value: ProtocolType,
        size: usize,
    ) -> CodecResult<()> {
        self.write_size(size, "map")?;
        if size > 0 {
            let kinds = (to_compact(key)? << 4) | to_compact(value)?;
            self.out.push(kinds);
        }
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> CodecResult<()> {
        let nibble = if value {
            CT_BOOLEAN_TRUE
        } else {
            CT_BOOLEAN_FALSE
        };
        match self.pending_bool_field.take() {
            Some(id) => self.write_field_header(nibble, id),
            None => self.out.push(nibble),
        }
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> CodecResult<()> {
        self.out.push(value as u8);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> CodecResult<()> {
        self.write_varint32(zigzag32(i32::from(value)));
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> CodecResult<()> {
        self.write_varint32(zigzag32(value));
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> CodecResult<()> {
        self.write_varint64(zigzag64(value));
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_bits().to_le_bytes());
        Ok(())
    }

    fn write_float(&mut self, value: f32) -> CodecResult<()> {
        self.out.extend_from_slice(&value.to_bits().to_le_bytes());
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
    fn test_zigzag() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag32(-2), 3);
        assert_eq!(unzigzag32(zigzag32(i32::MIN)), i32::MIN);
        assert_eq!(unzigzag64(zigzag64(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_message_header_bytes() {
        let mut out = Vec::new();
        CompactWriter::new(&mut out)
            .write_message_begin(&MessageHeader::new("ab", MessageType::Reply, 300))
            .unwrap();
        // 0x82, version 1 | reply << 5, varint 300, name
        assert_eq!(out, vec![0x82, 0x41, 0xac, 0x02, 2, b'a', b'b']);

        let header = CompactReader::new(&out).read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("ab", MessageType::Reply, 300));
    }

    #[test]
    fn test_field_delta_and_long_form() {
        let mut out = Vec::new();
        {
            let mut writer = CompactWriter::new(&mut out);
            writer.write_struct_begin("S").unwrap();
            writer.write_field_begin("a", ProtocolType::I32, 1).unwrap();
            writer.write_i32(5).unwrap();
            writer.write_field_begin("b", ProtocolType::I32, 100).unwrap();
            writer.write_i32(-1).unwrap();
            writer.write_field_stop().unwrap();
            writer.write_struct_end().unwrap();
        }
        assert_eq!(out, vec![0x15, 10, 0x05, 0xc8, 0x01, 1, 0]);

        let mut reader = CompactReader::new(&out);
        reader.read_struct_begin().unwrap();
        assert_eq!(
            reader.read_field_begin().unwrap(),
            FieldHeader { kind: ProtocolType::I32, id: 1 }
        );
        assert_eq!(reader.read_i32().unwrap(), 5);
        assert_eq!(
            reader.read_field_begin().unwrap(),
            FieldHeader { kind: ProtocolType::I32, id: 100 }
        );
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert!(reader.read_field_begin().unwrap().is_stop());
        reader.read_struct_end().unwrap();
    }

    #[test]
    fn test_bool_field_packed_in_header() {
        let mut out = Vec::new();
        {
            let mut writer = CompactWriter::new(&mut out);
            writer.write_struct_begin("S").unwrap();
            writer.write_field_begin("t", ProtocolType::Bool, 1).unwrap();
            writer.write_bool(true).unwrap();
            writer.write_field_begin("f", ProtocolType::Bool, 2).unwrap();
            writer.write_bool(false).unwrap();
            writer.write_field_stop().unwrap();
            writer.write_struct_end().unwrap();
        }
        assert_eq!(out, vec![0x11, 0x12, 0]);

        let mut reader = CompactReader::new(&out);
        reader.read_struct_begin().unwrap();
        assert_eq!(reader.read_field_begin().unwrap().kind, ProtocolType::Bool);
        assert!(reader.read_bool().unwrap());
        reader.read_field_begin().unwrap();
        assert!(!reader.read_bool().unwrap());
    }

    #[test]
    fn test_nested_struct_restores_field_id() {
        let mut out = Vec::new();
        {
            let mut writer = CompactWriter::new(&mut out);
            writer.write_struct_begin("Outer").unwrap();
            writer.write_field_begin("inner", ProtocolType::Struct, 3).unwrap();
            writer.write_struct_begin("Inner").unwrap();
            writer.write_field_begin("x", ProtocolType::Byte, 1).unwrap();
            writer.write_byte(9).unwrap();
            writer.write_field_stop().unwrap();
            writer.write_struct_end().unwrap();
            writer.write_field_begin("y", ProtocolType::Byte, 4).unwrap();
            writer.write_byte(1).unwrap();
            writer.write_field_stop().unwrap();
            writer.write_struct_end().unwrap();
        }
        let mut reader = CompactReader::new(&out);
        reader.read_struct_begin().unwrap();
        assert_eq!(reader.read_field_begin().unwrap().id, 3);
        reader.read_struct_begin().unwrap();
        assert_eq!(reader.read_field_begin().unwrap().id, 1);
        reader.read_byte().unwrap();
        assert!(reader.read_field_begin().unwrap().is_stop());
        reader.read_struct_end().unwrap();
        assert_eq!(reader.read_field_begin().unwrap().id, 4);
    }

    #[test]
    fn test_list_header_short_and_long() {
        let mut out = Vec::new();
        {
            let mut writer = CompactWriter::new(&mut out);
            writer.write_list_begin(ProtocolType::Byte, 3).unwrap();
        }
        assert_eq!(out, vec![0x33]);

        let mut out = Vec::new();
        {
            let mut writer = CompactWriter::new(&mut out);
            writer.write_list_begin(ProtocolType::Byte, 20).unwrap();
            for _ in 0..20 {
                writer.write_byte(0).unwrap();
            }
        }
        assert_eq!(&out[..2], &[0xf3, 20]);
        let header = CompactReader::new(&out).read_list_begin().unwrap();
        assert_eq!(header.size, 20);
        assert_eq!(header.element, ProtocolType::Byte);
    }

    #[test]
    fn test_empty_map_has_no_kind_byte() {
        let mut out = Vec::new();
        CompactWriter::new(&mut out)
            .write_map_begin(ProtocolType::String, ProtocolType::I32, 0)
            .unwrap();
        assert_eq!(out, vec![0]);
        assert_eq!(CompactReader::new(&out).read_map_begin().unwrap().size, 0);
    }

    #[test]
    fn test_double_little_endian() {
        let mut out = Vec::new();
        CompactWriter::new(&mut out).write_double(1.0).unwrap();
        assert_eq!(out, 1.0f64.to_bits().to_le_bytes().to_vec());
        assert_eq!(CompactReader::new(&out).read_double().unwrap(), 1.0);
    }
}

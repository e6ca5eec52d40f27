// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire protocols and the struct-shape agnostic reader/writer layer.
//!
//! Two levels live here:
//!
//! - [`ProtocolRead`] / [`ProtocolWrite`]: one concrete wire encoding
//!   ([`BinaryProtocol`] or [`CompactProtocol`]), primitive by primitive.
//! - [`FieldReader`] / [`FieldWriter`]: sequencing of field headers, typed
//!   field reads through a [`Codec`](crate::codec::Codec), bulk array paths and
//!   the format-driven [`skip`].
//!
//! ```text
//! struct  := (field-header value)* STOP
//! header  := kind:u8 id:i16          (binary)
//!          | delta<<4|kind [id:zz16] (compact)
//! list    := elem-kind count elements...
//! map     := key-kind value-kind count (key value)...
//! string  := length bytes
//! ```

mod binary;
mod compact;
mod cursor;
mod reader;
mod writer;

pub use binary::{BinaryProtocol, BinaryReader, BinaryWriter};
pub use compact::{CompactProtocol, CompactReader, CompactWriter};
pub use cursor::Cursor;
pub use reader::{
    read_bool_array, read_double_array, read_float_array, read_i16_array, read_i32_array,
    read_i64_array, skip, FieldReader, MAX_SKIP_DEPTH,
};
pub use writer::{
    write_bool_array, write_double_array, write_float_array, write_i16_array, write_i32_array,
    write_i64_array, FieldWriter,
};

use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::str::FromStr;

/// Wire kind tags (the Thrift `TType` byte of the binary protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolType {
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    /// Strings and binary share the same wire kind.
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
    Float = 19,
}

impl ProtocolType {
    /// Wire byte for this kind.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a binary-protocol kind byte.
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        Ok(match value {
            0 => Self::Stop,
            1 => Self::Void,
            2 => Self::Bool,
            3 => Self::Byte,
            4 => Self::Double,
            6 => Self::I16,
            8 => Self::I32,
            10 => Self::I64,
            11 => Self::String,
            12 => Self::Struct,
            13 => Self::Map,
            14 => Self::Set,
            15 => Self::List,
            19 => Self::Float,
            other => {
                return Err(CodecError::protocol(format!("unknown wire type {}", other)));
            }
        })
    }
}

/// Message envelope types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageType {
    /// Parse the 3-bit message type.
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            1 => Ok(Self::Call),
            2 => Ok(Self::Reply),
            3 => Ok(Self::Exception),
            4 => Ok(Self::Oneway),
            other => Err(CodecError::protocol(format!(
                "invalid message type {}",
                other
            ))),
        }
    }
}

/// Envelope preceding every request and response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub message_type: MessageType,
    pub sequence_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, message_type: MessageType, sequence_id: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            sequence_id,
        }
    }
}

/// A struct field header. `kind == Stop` marks the end of the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    pub kind: ProtocolType,
    pub id: i16,
}

impl FieldHeader {
    pub const STOP: Self = Self {
        kind: ProtocolType::Stop,
        id: 0,
    };

    pub fn is_stop(&self) -> bool {
        self.kind == ProtocolType::Stop
    }
}

/// Header of a list or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListHeader {
    pub element: ProtocolType,
    pub size: usize,
}

/// Header of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    pub key: ProtocolType,
    pub value: ProtocolType,
    pub size: usize,
}

/// Reading half of a wire protocol.
pub trait ProtocolRead {
    fn read_message_begin(&mut self) -> CodecResult<MessageHeader>;
    fn read_message_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn read_struct_begin(&mut self) -> CodecResult<()>;
    fn read_struct_end(&mut self) -> CodecResult<()>;
    fn read_field_begin(&mut self) -> CodecResult<FieldHeader>;
    fn read_field_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn read_list_begin(&mut self) -> CodecResult<ListHeader>;
    fn read_list_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn read_set_begin(&mut self) -> CodecResult<ListHeader>;
    fn read_set_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn read_map_begin(&mut self) -> CodecResult<MapHeader>;
    fn read_map_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn read_bool(&mut self) -> CodecResult<bool>;
    fn read_byte(&mut self) -> CodecResult<i8>;
    fn read_i16(&mut self) -> CodecResult<i16>;
    fn read_i32(&mut self) -> CodecResult<i32>;
    fn read_i64(&mut self) -> CodecResult<i64>;
    fn read_double(&mut self) -> CodecResult<f64>;
    fn read_float(&mut self) -> CodecResult<f32>;
    fn read_string(&mut self) -> CodecResult<String>;
    fn read_binary(&mut self) -> CodecResult<Vec<u8>>;

    /// Bytes left in the input, used to reject absurd sizes before allocating.
    fn remaining(&self) -> usize;
}

/// Writing half of a wire protocol.
pub trait ProtocolWrite {
    fn write_message_begin(&mut self, header: &MessageHeader) -> CodecResult<()>;
    fn write_message_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn write_struct_begin(&mut self, name: &str) -> CodecResult<()>;
    fn write_struct_end(&mut self) -> CodecResult<()>;
    fn write_field_begin(&mut self, name: &str, kind: ProtocolType, id: i16) -> CodecResult<()>;
    fn write_field_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn write_field_stop(&mut self) -> CodecResult<()>;
    fn write_list_begin(&mut self, element: ProtocolType, size: usize) -> CodecResult<()>;
    fn write_list_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn write_set_begin(&mut self, element: ProtocolType, size: usize) -> CodecResult<()>;
    fn write_set_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn write_map_begin(&mut self, key: ProtocolType, value: ProtocolType, size: usize)
        -> CodecResult<()>;
    fn write_map_end(&mut self) -> CodecResult<()> {
        Ok(())
    }
    fn write_bool(&mut self, value: bool) -> CodecResult<()>;
    fn write_byte(&mut self, value: i8) -> CodecResult<()>;
    fn write_i16(&mut self, value: i16) -> CodecResult<()>;
    fn write_i32(&mut self, value: i32) -> CodecResult<()>;
    fn write_i64(&mut self, value: i64) -> CodecResult<()>;
    fn write_double(&mut self, value: f64) -> CodecResult<()>;
    fn write_float(&mut self, value: f32) -> CodecResult<()>;
    fn write_string(&mut self, value: &str) -> CodecResult<()>;
    fn write_binary(&mut self, value: &[u8]) -> CodecResult<()>;
}

/// Protocol variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Binary,
    Compact,
}

impl Protocol {
    /// Reader over a complete message buffer.
    pub fn reader<'a>(&self, input: &'a [u8]) -> Box<dyn ProtocolRead + 'a> {
        match self {
            Self::Binary => Box::new(BinaryReader::new(input)),
            Self::Compact => Box::new(CompactReader::new(input)),
        }
    }

    /// Writer appending to `out`.
    pub fn writer<'a>(&self, out: &'a mut Vec<u8>) -> Box<dyn ProtocolWrite + 'a> {
        match self {
            Self::Binary => Box::new(BinaryWriter::new(out)),
            Self::Compact => Box::new(CompactWriter::new(out)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "compact" => Ok(Self::Compact),
            other => Err(CodecError::unsupported(format!("unknown protocol '{}'", other))),
        }
    }
}

/// Validate a signed wire length against the remaining input.
pub(crate) fn checked_size(size: i64, remaining: usize, what: &str) -> CodecResult<usize> {
    if size < 0 {
        return Err(CodecError::protocol(format!("negative {} size {}", what, size)));
    }
    let size = size as usize;
    if size > remaining {
        return Err(CodecError::protocol(format!(
            "{} size {} exceeds remaining {} bytes",
            what, size, remaining
        )));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_type_roundtrip() {
        for kind in [
            ProtocolType::Stop,
            ProtocolType::Bool,
            ProtocolType::Byte,
            ProtocolType::Double,
            ProtocolType::I16,
            ProtocolType::I32,
            ProtocolType::I64,
            ProtocolType::String,
            ProtocolType::Struct,
            ProtocolType::Map,
            ProtocolType::Set,
            ProtocolType::List,
            ProtocolType::Float,
        ] {
            assert_eq!(ProtocolType::from_u8(kind.as_u8()).unwrap(), kind);
        }
        assert!(ProtocolType::from_u8(5).is_err());
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("Binary".parse::<Protocol>().unwrap(), Protocol::Binary);
        assert_eq!("compact".parse::<Protocol>().unwrap(), Protocol::Compact);
        assert!("json".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_checked_size() {
        assert_eq!(checked_size(3, 10, "list").unwrap(), 3);
        assert!(checked_size(-1, 10, "list").is_err());
        assert!(checked_size(11, 10, "string").is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field sequencing on top of a [`ProtocolRead`], plus format-driven skipping.

use super::{FieldHeader, ProtocolRead, ProtocolType};
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::DynValue;

/// Maximum container nesting honoured by [`skip`].
pub const MAX_SKIP_DEPTH: usize = 64;

/// Walks the fields of one struct.
pub struct FieldReader<'p> {
    protocol: &'p mut dyn ProtocolRead,
    current: FieldHeader,
}

impl<'p> FieldReader<'p> {
    pub fn new(protocol: &'p mut dyn ProtocolRead) -> Self {
        Self {
            protocol,
            current: FieldHeader::STOP,
        }
    }

    pub fn read_struct_begin(&mut self) -> CodecResult<()> {
        self.protocol.read_struct_begin()
    }

    pub fn read_struct_end(&mut self) -> CodecResult<()> {
        self.protocol.read_struct_end()
    }

    /// Advance to the next field header. Returns `false` on STOP.
    pub fn next_field(&mut self) -> CodecResult<bool> {
        self.current = self.protocol.read_field_begin()?;
        Ok(!self.current.is_stop())
    }

    pub fn field_id(&self) -> i16 {
        self.current.id
    }

    pub fn field_kind(&self) -> ProtocolType {
        self.current.kind
    }

    /// Decode the current field with `codec`.
    ///
    /// A field whose wire kind does not match the codec is skipped and reported
    /// as absent.
    pub fn read_field(&mut self, codec: &dyn Codec) -> CodecResult<Option<DynValue>> {
        let expected = codec.protocol_type()?;
        if expected != self.current.kind {
            log::debug!(
                "[codec] field {} arrived as {:?}, expected {:?}; skipping",
                self.current.id,
                self.current.kind,
                expected
            );
            self.skip_field_data()?;
            return Ok(None);
        }
        let value = codec.read(&mut *self.protocol)?;
        self.protocol.read_field_end()?;
        Ok(value)
    }

    /// Read the current field as raw binary.
    pub fn read_binary_field(&mut self) -> CodecResult<Option<Vec<u8>>> {
        if self.current.kind != ProtocolType::String {
            self.skip_field_data()?;
            return Ok(None);
        }
        let value = self.protocol.read_binary()?;
        self.protocol.read_field_end()?;
        Ok(Some(value))
    }

    /// Discard the value of the current field.
    pub fn skip_field_data(&mut self) -> CodecResult<()> {
        skip(&mut *self.protocol, self.current.kind)?;
        self.protocol.read_field_end()
    }

    pub fn protocol(&mut self) -> &mut dyn ProtocolRead {
        &mut *self.protocol
    }
}

/// Skip one value of `kind`, recursing through structs and containers.
pub fn skip(protocol: &mut dyn ProtocolRead, kind: ProtocolType) -> CodecResult<()> {
    skip_nested(protocol, kind, MAX_SKIP_DEPTH)
}

fn skip_nested(protocol: &mut dyn ProtocolRead, kind: ProtocolType, depth: usize) -> CodecResult<()> {
    if depth == 0 {
        return Err(CodecError::protocol(format!(
            "maximum skip depth {} exceeded",
            MAX_SKIP_DEPTH
        )));
    }
    match kind {
        ProtocolType::Bool => {
            protocol.read_bool()?;
        }
        ProtocolType::Byte => {
            protocol.read_byte()?;
        }
        ProtocolType::I16 => {
            protocol.read_i16()?;
        }
        ProtocolType::I32 => {
            protocol.read_i32()?;
        }
        ProtocolType::I64 => {
            protocol.read_i64()?;
        }
        ProtocolType::Double => {
            protocol.read_double()?;
        }
        ProtocolType::Float => {
            protocol.read_float()?;
        }
        ProtocolType::String => {
            protocol.read_binary()?;
        }
        ProtocolType::Struct => {
            protocol.read_struct_begin()?;
            loop {
                let header = protocol.read_field_begin()?;
                if header.is_stop() {
                    break;
                }
                skip_nested(protocol, header.kind, depth - 1)?;
                protocol.read_field_end()?;
            }
            protocol.read_struct_end()?;
        }
        ProtocolType::Map => {
            let header = protocol.read_map_begin()?;
            for _ in 0..header.size {
                skip_nested(protocol, header.key, depth - 1)?;
                skip_nested(protocol, header.value, depth - 1)?;
            }
            protocol.read_map_end()?;
        }
        ProtocolType::Set => {
            let header = protocol.read_set_begin()?;
            for _ in 0..header.size {
                skip_nested(protocol, header.element, depth - 1)?;
            }
            protocol.read_set_end()?;
        }
        ProtocolType::List => {
            let header = protocol.read_list_begin()?;
            for _ in 0..header.size {
                skip_nested(protocol, header.element, depth - 1)?;
            }
            protocol.read_list_end()?;
        }
        ProtocolType::Stop | ProtocolType::Void => {
            return Err(CodecError::protocol(format!("cannot skip {:?}", kind)));
        }
    }
    Ok(())
}

/// Generate a bulk list reader for one primitive element type.
macro_rules! read_array {
    ($name:ident, $type:ty, $kind:ident, $read:ident) => {
        pub fn $name(protocol: &mut dyn ProtocolRead) -> CodecResult<Vec<$type>> {
            let header = protocol.read_list_begin()?;
            if header.size > 0 && header.element != ProtocolType::$kind {
                return Err(CodecError::protocol(format!(
                    "expected list of {:?}, got list of {:?}",
                    ProtocolType::$kind,
                    header.element
                )));
            }
            let mut values = Vec::with_capacity(header.size);
            for _ in 0..header.size {
                values.push(protocol.$read()?);
            }
            protocol.read_list_end()?;
            Ok(values)
        }
    };
}

read_array!(read_bool_array, bool, Bool, read_bool);
read_array!(read_i16_array, i16, I16, read_i16);
read_array!(read_i32_array, i32, I32, read_i32);
read_array!(read_i64_array, i64, I64, read_i64);
read_array!(read_double_array, f64, Double, read_double);
read_array!(read_float_array, f32, Float, read_float);

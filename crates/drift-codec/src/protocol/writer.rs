// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field sequencing on top of a [`ProtocolWrite`].

use super::{ProtocolType, ProtocolWrite};
use crate::codec::Codec;
use crate::error::CodecResult;
use std::any::Any;

/// Writes the fields of one struct.
pub struct FieldWriter<'p> {
    protocol: &'p mut dyn ProtocolWrite,
}

impl<'p> FieldWriter<'p> {
    pub fn new(protocol: &'p mut dyn ProtocolWrite) -> Self {
        Self { protocol }
    }

    pub fn write_struct_begin(&mut self, name: &str) -> CodecResult<()> {
        self.protocol.write_struct_begin(name)
    }

    /// Terminate the field list and close the struct.
    pub fn write_struct_end(&mut self) -> CodecResult<()> {
        self.protocol.write_field_stop()?;
        self.protocol.write_struct_end()
    }

    /// Write one field unless the codec reports the value as null.
    pub fn write_field(
        &mut self,
        name: &str,
        id: i16,
        codec: &dyn Codec,
        value: &dyn Any,
    ) -> CodecResult<()> {
        if codec.is_null(value) {
            return Ok(());
        }
        let kind = codec.protocol_type()?;
        self.protocol.write_field_begin(name, kind, id)?;
        codec.write(value, &mut *self.protocol)?;
        self.protocol.write_field_end()
    }

    pub fn write_binary_field(&mut self, name: &str, id: i16, value: &[u8]) -> CodecResult<()> {
        self.protocol
            .write_field_begin(name, ProtocolType::String, id)?;
        self.protocol.write_binary(value)?;
        self.protocol.write_field_end()
    }

    pub fn protocol(&mut self) -> &mut dyn ProtocolWrite {
        &mut *self.protocol
    }
}

/// Generate a bulk list writer for one primitive element type.
macro_rules! write_array {
    ($name:ident, $type:ty, $kind:ident, $write:ident) => {
        pub fn $name(protocol: &mut dyn ProtocolWrite, values: &[$type]) -> CodecResult<()> {
            protocol.write_list_begin(ProtocolType::$kind, values.len())?;
            for value in values {
                protocol.$write(*value)?;
            }
            protocol.write_list_end()
        }
    };
}

write_array!(write_bool_array, bool, Bool, write_bool);
write_array!(write_i16_array, i16, I16, write_i16);
write_array!(write_i32_array, i32, I32, write_i32);
write_array!(write_i64_array, i64, I64, write_i64);
write_array!(write_double_array, f64, Double, write_double);
write_array!(write_float_array, f32, Float, write_float);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_bool_array, read_float_array, FieldReader, Protocol};

    #[test]
    fn test_arrays_and_binary_field() {
        for protocol in [Protocol::Binary, Protocol::Compact] {
            let mut out = Vec::new();
            {
                let mut w = protocol.writer(&mut out);
                let mut fields = FieldWriter::new(&mut *w);
                fields.write_struct_begin("Arrays").unwrap();
                fields.write_binary_field("raw", 1, &[1, 2, 3]).unwrap();
                fields
                    .protocol()
                    .write_field_begin("flags", ProtocolType::List, 2)
                    .unwrap();
                write_bool_array(fields.protocol(), &[true, false, true]).unwrap();
                fields
                    .protocol()
                    .write_field_begin("weights", ProtocolType::List, 3)
                    .unwrap();
                write_float_array(fields.protocol(), &[0.25, -1.0]).unwrap();
                fields.write_struct_end().unwrap();
            }

            let mut r = protocol.reader(&out);
            let mut fields = FieldReader::new(&mut *r);
            fields.read_struct_begin().unwrap();
            assert!(fields.next_field().unwrap());
            assert_eq!(fields.read_binary_field().unwrap(), Some(vec![1, 2, 3]));
            assert!(fields.next_field().unwrap());
            assert_eq!(
                read_bool_array(fields.protocol()).unwrap(),
                vec![true, false, true]
            );
            assert!(fields.next_field().unwrap());
            assert_eq!(fields.field_id(), 3);
            assert_eq!(read_float_array(fields.protocol()).unwrap(), vec![0.25, -1.0]);
            assert!(!fields.next_field().unwrap());
            fields.read_struct_end().unwrap();
        }
    }
}

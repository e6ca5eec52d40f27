// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! List, set and map codecs.

use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{downcast_ref, CollectionShape, DynValue, MapShape, TypeKey, WireType};
use crate::protocol::{
    read_bool_array, read_double_array, read_float_array, read_i16_array, read_i32_array,
    read_i64_array, write_bool_array, write_double_array, write_float_array, write_i16_array,
    write_i32_array, write_i64_array, ListHeader, ProtocolRead, ProtocolType, ProtocolWrite,
};
use std::any::Any;
use std::sync::Arc;

/// `Vec` of a primitive, encoded with the bulk array routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimitiveArray {
    Bool,
    I16,
    I32,
    I64,
    Double,
    Float,
}

impl PrimitiveArray {
    fn detect(native: TypeKey) -> Option<Self> {
        [
            (TypeKey::of::<Vec<bool>>(), Self::Bool),
            (TypeKey::of::<Vec<i16>>(), Self::I16),
            (TypeKey::of::<Vec<i32>>(), Self::I32),
            (TypeKey::of::<Vec<i64>>(), Self::I64),
            (TypeKey::of::<Vec<f64>>(), Self::Double),
            (TypeKey::of::<Vec<f32>>(), Self::Float),
        ]
        .into_iter()
        .find(|(key, _)| *key == native)
        .map(|(_, array)| array)
    }

    fn read(self, protocol: &mut dyn ProtocolRead) -> CodecResult<DynValue> {
        let values: DynValue = match self {
            Self::Bool => Box::new(read_bool_array(protocol)?),
            Self::I16 => Box::new(read_i16_array(protocol)?),
            Self::I32 => Box::new(read_i32_array(protocol)?),
            Self::I64 => Box::new(read_i64_array(protocol)?),
            Self::Double => Box::new(read_double_array(protocol)?),
            Self::Float => Box::new(read_float_array(protocol)?),
        };
        Ok(values)
    }

    fn write(self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        match self {
            Self::Bool => write_bool_array(protocol, downcast_ref::<Vec<bool>>(value)?),
            Self::I16 => write_i16_array(protocol, downcast_ref::<Vec<i16>>(value)?),
            Self::I32 => write_i32_array(protocol, downcast_ref::<Vec<i32>>(value)?),
            Self::I64 => write_i64_array(protocol, downcast_ref::<Vec<i64>>(value)?),
            Self::Double => write_double_array(protocol, downcast_ref::<Vec<f64>>(value)?),
            Self::Float => write_float_array(protocol, downcast_ref::<Vec<f32>>(value)?),
        }
    }
}

fn check_element(header: &ListHeader, expected: ProtocolType, what: &str) -> CodecResult<()> {
    if header.size > 0 && header.element != expected {
        return Err(CodecError::protocol(format!(
            "expected {} of {:?}, got {} of {:?}",
            what, expected, what, header.element
        )));
    }
    Ok(())
}

/// Decode `size` elements, dropping absent ones.
fn read_elements(
    protocol: &mut dyn ProtocolRead,
    element: &dyn Codec,
    size: usize,
) -> CodecResult<Vec<DynValue>> {
    let mut values = Vec::with_capacity(size);
    for index in 0..size {
        match element.read(protocol)? {
            Some(value) => values.push(value),
            None => log::debug!("[codec] dropping absent element {} of {}", index, size),
        }
    }
    Ok(values)
}

/// Elements of `value` to write, skipping absent ones.
fn elements_of<'a>(
    shape: &CollectionShape,
    value: &'a dyn Any,
    native: TypeKey,
    element: &dyn Codec,
) -> CodecResult<Vec<&'a dyn Any>> {
    let elements = (shape.elements)(value).ok_or(CodecError::TypeMismatch {
        expected: native.name(),
    })?;
    let size = elements.len();
    let mut present = Vec::with_capacity(size);
    for (index, value) in elements.into_iter().enumerate() {
        if element.is_null(value) {
            log::debug!("[codec] skipping absent element {} of {} in {}", index, size, native);
        } else {
            present.push(value);
        }
    }
    Ok(present)
}

pub struct ListCodec {
    wire_type: WireType,
    shape: CollectionShape,
    element: Arc<dyn Codec>,
    array: Option<PrimitiveArray>,
}

impl ListCodec {
    pub fn new(wire_type: WireType, shape: CollectionShape, element: Arc<dyn Codec>) -> Self {
        let array = PrimitiveArray::detect(wire_type.native());
        Self {
            wire_type,
            shape,
            element,
            array,
        }
    }
}

impl Codec for ListCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        if let Some(array) = self.array {
            return array.read(protocol).map(Some);
        }
        let header = protocol.read_list_begin()?;
        check_element(&header, self.element.protocol_type()?, "list")?;
        let values = read_elements(protocol, &*self.element, header.size)?;
        protocol.read_list_end()?;
        (self.shape.collect)(values).map(Some)
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        if let Some(array) = self.array {
            return array.write(value, protocol);
        }
        let elements = elements_of(&self.shape, value, self.wire_type.native(), &*self.element)?;
        protocol.write_list_begin(self.element.protocol_type()?, elements.len())?;
        for element in elements {
            self.element.write(element, protocol)?;
        }
        protocol.write_list_end()
    }
}

pub struct SetCodec {
    wire_type: WireType,
    shape: CollectionShape,
    element: Arc<dyn Codec>,
}

impl SetCodec {
    pub fn new(wire_type: WireType, shape: CollectionShape, element: Arc<dyn Codec>) -> Self {
        Self {
            wire_type,
            shape,
            element,
        }
    }
}

impl Codec for SetCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        let header = protocol.read_set_begin()?;
        check_element(&header, self.element.protocol_type()?, "set")?;
        let values = read_elements(protocol, &*self.element, header.size)?;
        protocol.read_set_end()?;
        (self.shape.collect)(values).map(Some)
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        let elements = elements_of(&self.shape, value, self.wire_type.native(), &*self.element)?;
        protocol.write_set_begin(self.element.protocol_type()?, elements.len())?;
        for element in elements {
            self.element.write(element, protocol)?;
        }
        protocol.write_set_end()
    }
}

pub struct MapCodec {
    wire_type: WireType,
    shape: MapShape,
    key: Arc<dyn Codec>,
    value: Arc<dyn Codec>,
}

impl MapCodec {
    pub fn new(
        wire_type: WireType,
        shape: MapShape,
        key: Arc<dyn Codec>,
        value: Arc<dyn Codec>,
    ) -> Self {
        Self {
            wire_type,
            shape,
            key,
            value,
        }
    }
}

impl Codec for MapCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        let header = protocol.read_map_begin()?;
        if header.size > 0 {
            let key = self.key.protocol_type()?;
            let value = self.value.protocol_type()?;
            if header.key != key || header.value != value {
                return Err(CodecError::protocol(format!(
                    "expected map<{:?}, {:?}>, got map<{:?}, {:?}>",
                    key, value, header.key, header.value
                )));
            }
        }
        let mut entries = Vec::with_capacity(header.size);
        for _ in 0..header.size {
            let key = self.key.read(protocol)?;
            let value = self.value.read(protocol)?;
            match (key, value) {
                (Some(key), Some(value)) => entries.push((key, value)),
                _ => log::debug!("[codec] dropping map entry with an absent key or value"),
            }
        }
        protocol.read_map_end()?;
        (self.shape.collect)(entries).map(Some)
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        let entries: Vec<_> = (self.shape.entries)(value)
            .ok_or(CodecError::TypeMismatch {
                expected: self.wire_type.native().name(),
            })?
            .into_iter()
            .filter(|(key, value)| {
                let absent = self.key.is_null(*key) || self.value.is_null(*value);
                if absent {
                    log::debug!("[codec] skipping map entry with an absent key or value");
                }
                !absent
            })
            .collect();
        protocol.write_map_begin(
            self.key.protocol_type()?,
            self.value.protocol_type()?,
            entries.len(),
        )?;
        for (key, value) in entries {
            self.key.write(key, protocol)?;
            self.value.write(value, protocol)?;
        }
        protocol.write_map_end()
    }
}

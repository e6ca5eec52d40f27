// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codecs for primitives, strings, binary and void.

use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{downcast_ref, Binary, DynValue, Shape, TypeKey, WireKind, WireType};
use crate::protocol::{ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::Arc;

macro_rules! primitive_codec {
    ($name:ident, $type:ty, $kind:ident, $read:ident, $write:ident) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Codec for $name {
            fn wire_type(&self) -> CodecResult<WireType> {
                Ok(WireType::new(WireKind::$kind, TypeKey::of::<$type>()))
            }

            fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
                Ok(Some(Box::new(protocol.$read()?)))
            }

            fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
                protocol.$write(*downcast_ref::<$type>(value)?)
            }
        }
    };
}

primitive_codec!(BoolCodec, bool, Bool, read_bool, write_bool);
primitive_codec!(ByteCodec, i8, Byte, read_byte, write_byte);
primitive_codec!(I16Codec, i16, I16, read_i16, write_i16);
primitive_codec!(I32Codec, i32, I32, read_i32, write_i32);
primitive_codec!(I64Codec, i64, I64, read_i64, write_i64);
primitive_codec!(DoubleCodec, f64, Double, read_double, write_double);
primitive_codec!(FloatCodec, f32, Float, read_float, write_float);

#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec for StringCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(WireType::new(WireKind::String, TypeKey::of::<String>()))
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        Ok(Some(Box::new(protocol.read_string()?)))
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        protocol.write_string(downcast_ref::<String>(value)?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(WireType::new(WireKind::Binary, TypeKey::of::<Binary>()))
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        Ok(Some(Box::new(Binary(protocol.read_binary()?))))
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        protocol.write_binary(&downcast_ref::<Binary>(value)?.0)
    }
}

/// Result codec of methods returning nothing. Never on the wire.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoidCodec;

impl Codec for VoidCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(WireType::new(WireKind::Void, TypeKey::of::<()>()))
    }

    fn read(&self, _protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        Ok(Some(Box::new(())))
    }

    fn write(&self, value: &dyn Any, _protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        downcast_ref::<()>(value).map(|_| ())
    }
}

/// Builtin codec for a scalar shape, if `key` is the matching Rust type.
pub(crate) fn builtin_codec(shape: &Shape, key: TypeKey) -> CodecResult<Option<Arc<dyn Codec>>> {
    let codec: Arc<dyn Codec> = match shape {
        Shape::Bool => Arc::new(BoolCodec),
        Shape::Byte => Arc::new(ByteCodec),
        Shape::I16 => Arc::new(I16Codec),
        Shape::I32 => Arc::new(I32Codec),
        Shape::I64 => Arc::new(I64Codec),
        Shape::Double => Arc::new(DoubleCodec),
        Shape::Float => Arc::new(FloatCodec),
        Shape::String => Arc::new(StringCodec),
        Shape::Binary => Arc::new(BinaryCodec),
        Shape::Void => Arc::new(VoidCodec),
        _ => return Ok(None),
    };
    if codec.wire_type()?.native() != key {
        return Err(CodecError::unsupported(format!(
            "{} declares shape {:?} but has no builtin codec; register one",
            key, shape
        )));
    }
    Ok(Some(codec))
}

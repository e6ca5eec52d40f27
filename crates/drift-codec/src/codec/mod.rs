// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec engine.
//!
//! A [`Codec`] reads and writes values of one native type. The
//! [`CodecManager`] builds codecs from catalog metadata and caches them:
//!
//! - [`builtin`]: primitives, strings, binary and void.
//! - [`collections`]: lists (with bulk primitive arrays), sets and maps.
//! - [`wrapper`]: transparent wrappers such as `Option` and `Box`.
//! - [`structs`] / [`unions`]: field-tagged structs and unions.
//! - [`enums`], [`coercion`], [`delegate`]: enum constants, registered
//!   coercions and forward references for recursive types.

pub mod builtin;
pub mod coercion;
pub mod collections;
pub mod delegate;
pub mod enums;
pub mod manager;
pub mod structs;
pub mod unions;
pub mod wrapper;

pub use builtin::{
    BinaryCodec, BoolCodec, ByteCodec, DoubleCodec, FloatCodec, I16Codec, I32Codec, I64Codec,
    StringCodec, VoidCodec,
};
pub use coercion::CoercionCodec;
pub use collections::{ListCodec, MapCodec, SetCodec};
pub use delegate::DelegateCodec;
pub use enums::EnumCodec;
pub use manager::CodecManager;
pub use structs::StructCodec;
pub use unions::UnionCodec;
pub use wrapper::WrapperCodec;

use crate::error::CodecResult;
use crate::metadata::{DynValue, WireType};
use crate::protocol::{ProtocolRead, ProtocolType, ProtocolWrite};
use std::any::Any;

/// Reads and writes values of one native type.
pub trait Codec: Send + Sync {
    /// Wire type handled by this codec; its native type is the type of the
    /// values passed to [`Codec::write`] and returned by [`Codec::read`].
    fn wire_type(&self) -> CodecResult<WireType>;

    fn protocol_type(&self) -> CodecResult<ProtocolType> {
        Ok(self.wire_type()?.protocol_type())
    }

    /// Decode one value. `None` means the value is absent.
    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>>;

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()>;

    /// Null values are not written as fields.
    fn is_null(&self, _value: &dyn Any) -> bool {
        false
    }
}

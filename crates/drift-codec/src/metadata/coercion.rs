// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registered value coercions between a native type and a wire-mapped type.

use super::types::{downcast, downcast_ref, DynValue, Thrift, TypeKey, TypeToken};
use super::wire_type::WireType;
use crate::error::CodecResult;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type ToWireFn = Arc<dyn Fn(&dyn Any) -> CodecResult<DynValue> + Send + Sync>;
type FromWireFn = Arc<dyn Fn(DynValue) -> CodecResult<DynValue> + Send + Sync>;

/// Bidirectional mapping `N <-> W`; `N` travels with `W`'s wire type.
pub struct TypeCoercion {
    native: TypeKey,
    wire_token: TypeToken,
    wire_type: WireType,
    to_wire: ToWireFn,
    from_wire: FromWireFn,
}

impl TypeCoercion {
    pub(crate) fn new<N, W>(
        wire_token: TypeToken,
        wire_type: WireType,
        to_wire: fn(&N) -> W,
        from_wire: fn(W) -> N,
    ) -> Self
    where
        N: Any + Send,
        W: Thrift,
    {
        let to_wire: ToWireFn = Arc::new(move |value: &dyn Any| -> CodecResult<DynValue> {
            Ok(Box::new(to_wire(downcast_ref::<N>(value)?)) as DynValue)
        });
        let from_wire: FromWireFn = Arc::new(move |value: DynValue| -> CodecResult<DynValue> {
            Ok(Box::new(from_wire(downcast::<W>(value)?)) as DynValue)
        });
        Self {
            native: TypeKey::of::<N>(),
            wire_token,
            wire_type,
            to_wire,
            from_wire,
        }
    }

    pub fn native(&self) -> TypeKey {
        self.native
    }

    /// Token of the type the value is coerced to.
    pub fn wire_token(&self) -> &TypeToken {
        &self.wire_token
    }

    /// Wire type recorded for the native type.
    pub fn wire_type(&self) -> &WireType {
        &self.wire_type
    }

    pub fn to_wire(&self, value: &dyn Any) -> CodecResult<DynValue> {
        (self.to_wire)(value)
    }

    pub fn from_wire(&self, value: DynValue) -> CodecResult<DynValue> {
        (self.from_wire)(value)
    }
}

impl fmt::Debug for TypeCoercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeCoercion({} -> {:?})", self.native, self.wire_type)
    }
}

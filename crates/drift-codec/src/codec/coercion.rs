// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::Codec;
use crate::error::CodecResult;
use crate::metadata::{DynValue, TypeCoercion, WireType};
use crate::protocol::{ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::Arc;

/// Converts through a registered [`TypeCoercion`] around the wire type's codec.
pub struct CoercionCodec {
    coercion: Arc<TypeCoercion>,
    inner: Arc<dyn Codec>,
}

impl CoercionCodec {
    pub fn new(coercion: Arc<TypeCoercion>, inner: Arc<dyn Codec>) -> Self {
        Self { coercion, inner }
    }
}

impl Codec for CoercionCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.coercion.wire_type().clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        match self.inner.read(protocol)? {
            Some(value) => self.coercion.from_wire(value).map(Some),
            None => Ok(None),
        }
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        let wire = self.coercion.to_wire(value)?;
        self.inner.write(&*wire, protocol)
    }

    fn is_null(&self, value: &dyn Any) -> bool {
        match self.coercion.to_wire(value) {
            Ok(wire) => self.inner.is_null(&*wire),
            Err(_) => false,
        }
    }
}

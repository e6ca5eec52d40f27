// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transparent wrappers (`Option`, `Box`, `Arc`) encoded as their inner value.

use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{DynValue, WireType, WrapperShape};
use crate::protocol::{ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::Arc;

pub struct WrapperCodec {
    wire_type: WireType,
    shape: WrapperShape,
    inner: Arc<dyn Codec>,
}

impl WrapperCodec {
    pub fn new(wire_type: WireType, shape: WrapperShape, inner: Arc<dyn Codec>) -> Self {
        Self {
            wire_type,
            shape,
            inner,
        }
    }
}

impl Codec for WrapperCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        match self.inner.read(protocol)? {
            Some(value) => (self.shape.wrap)(value).map(Some),
            None => Ok(None),
        }
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        let inner = (self.shape.unwrap)(value).ok_or_else(|| {
            CodecError::IllegalState(format!(
                "cannot write empty {}",
                self.wire_type.native()
            ))
        })?;
        self.inner.write(inner, protocol)
    }

    fn is_null(&self, value: &dyn Any) -> bool {
        match (self.shape.unwrap)(value) {
            Some(inner) => self.inner.is_null(inner),
            None => true,
        }
    }
}

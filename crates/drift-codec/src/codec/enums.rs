// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{DynValue, EnumMetadata, WireType};
use crate::protocol::{ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::Arc;

/// Enum constants carried as their `i32` value.
///
/// A wire value without a matching constant decodes to the enum's unknown
/// constant, or to an absent value when it has none.
pub struct EnumCodec {
    wire_type: WireType,
    metadata: Arc<EnumMetadata>,
}

impl EnumCodec {
    pub fn new(wire_type: WireType) -> CodecResult<Self> {
        let metadata = wire_type.enum_metadata().cloned().ok_or_else(|| {
            CodecError::IllegalState(format!("{:?} is not an enum", wire_type))
        })?;
        Ok(Self {
            wire_type,
            metadata,
        })
    }

    pub fn metadata(&self) -> &Arc<EnumMetadata> {
        &self.metadata
    }
}

impl Codec for EnumCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        let value = protocol.read_i32()?;
        let constant = self.metadata.from_value(value);
        if constant.is_none() {
            log::debug!(
                "[codec] enum {} has no constant for {}",
                self.metadata.name(),
                value
            );
        }
        Ok(constant)
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        protocol.write_i32(self.metadata.value_of(value)?)
    }
}

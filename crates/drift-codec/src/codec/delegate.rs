// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::manager::ManagerState;
use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{DynValue, TypeToken, WireType};
use crate::protocol::{ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::{Arc, Weak};

/// Stand-in for a codec that is still being built.
///
/// Handed out when a recursive type refers back to itself during codec
/// construction. Every call looks the real codec up in the manager cache, so
/// delegates are only usable once the outer build has completed.
pub struct DelegateCodec {
    manager: Weak<ManagerState>,
    token: TypeToken,
}

impl DelegateCodec {
    pub(crate) fn new(manager: Weak<ManagerState>, token: TypeToken) -> Self {
        Self { manager, token }
    }

    pub fn token(&self) -> &TypeToken {
        &self.token
    }

    fn target(&self) -> CodecResult<Arc<dyn Codec>> {
        let key = self.token.key();
        let manager = self.manager.upgrade().ok_or_else(|| {
            CodecError::IllegalState(format!("codec manager owning delegate for {} was dropped", key))
        })?;
        manager.cached(&key).ok_or_else(|| {
            CodecError::IllegalState(format!("codec for {} used before it was built", key))
        })
    }
}

impl Codec for DelegateCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        self.target()?.wire_type()
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        self.target()?.read(protocol)
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        self.target()?.write(value, protocol)
    }

    fn is_null(&self, value: &dyn Any) -> bool {
        self.target()
            .map(|codec| codec.is_null(value))
            .unwrap_or(false)
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec construction and caching.
//!
//! Codecs are built on demand from catalog metadata and cached per native
//! type for the lifetime of the manager. A struct that refers back to itself
//! while its codec is being built receives a [`DelegateCodec`] for the inner
//! reference; delegates look the finished codec up from the cache.
//!
//! Codecs built below the outermost type wait in a `BuildContext` and are
//! published together with it, after the outermost codec. A delegate handed
//! out during the build therefore always finds its target in the cache.

use super::builtin::builtin_codec;
use super::{
    CoercionCodec, Codec, DelegateCodec, EnumCodec, ListCodec, MapCodec, SetCodec, StructCodec,
    UnionCodec, WrapperCodec,
};
use crate::error::{CodecError, CodecResult};
use crate::metadata::{downcast, DynValue, Shape, Thrift, TypeCatalog, TypeKey, TypeToken};
use crate::protocol::{Protocol, ProtocolRead, ProtocolWrite};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

pub(crate) struct ManagerState {
    catalog: TypeCatalog,
    codecs: DashMap<TypeKey, Arc<dyn Codec>>,
}

/// Types on the current build path and the codecs finished below it.
#[derive(Default)]
struct BuildContext {
    stack: Vec<TypeKey>,
    pending: Vec<(TypeKey, Arc<dyn Codec>)>,
}

impl BuildContext {
    fn pending(&self, key: &TypeKey) -> Option<Arc<dyn Codec>> {
        self.pending
            .iter()
            .find(|(pending, _)| pending == key)
            .map(|(_, codec)| codec.clone())
    }
}

impl ManagerState {
    pub(crate) fn cached(&self, key: &TypeKey) -> Option<Arc<dyn Codec>> {
        self.codecs.get(key).map(|entry| entry.value().clone())
    }
}

/// Shared codec cache on top of a [`TypeCatalog`]. Clones share the cache.
#[derive(Clone)]
pub struct CodecManager {
    state: Arc<ManagerState>,
}

impl Default for CodecManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecManager {
    pub fn new() -> Self {
        Self::with_catalog(TypeCatalog::new())
    }

    pub fn with_catalog(catalog: TypeCatalog) -> Self {
        Self {
            state: Arc::new(ManagerState {
                catalog,
                codecs: DashMap::new(),
            }),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.state.catalog
    }

    /// Codec for `token`, building it and its dependencies if needed.
    pub fn codec(&self, token: &TypeToken) -> CodecResult<Arc<dyn Codec>> {
        let mut context = BuildContext::default();
        self.build(token, &mut context)
    }

    pub fn codec_for<T: Thrift>(&self) -> CodecResult<Arc<dyn Codec>> {
        self.codec(&TypeToken::of::<T>())
    }

    pub fn cached_codec(&self, key: &TypeKey) -> Option<Arc<dyn Codec>> {
        self.state.cached(key)
    }

    /// Register a hand-written codec for its native type.
    ///
    /// The codec's wire type is recorded in the catalog so structs can hold
    /// fields of that type. Fails when a codec for the type was already built.
    pub fn add_codec(&self, codec: Arc<dyn Codec>) -> CodecResult<()> {
        let wire_type = codec.wire_type()?;
        let key = wire_type.native();
        match self.state.codecs.entry(key) {
            Entry::Occupied(_) => Err(CodecError::IllegalState(format!(
                "codec for {} already exists",
                key
            ))),
            Entry::Vacant(entry) => {
                self.state.catalog.register(wire_type)?;
                log::debug!("[codec] custom codec registered for {}", key);
                entry.insert(codec);
                Ok(())
            }
        }
    }

    /// Write `value`, an instance of the type described by `token`.
    pub fn write_value(
        &self,
        token: &TypeToken,
        value: &dyn Any,
        protocol: &mut dyn ProtocolWrite,
    ) -> CodecResult<()> {
        self.codec(token)?.write(value, protocol)
    }

    pub fn read_value(
        &self,
        token: &TypeToken,
        protocol: &mut dyn ProtocolRead,
    ) -> CodecResult<Option<DynValue>> {
        self.codec(token)?.read(protocol)
    }

    pub fn write<T: Thrift>(&self, value: &T, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        self.write_value(&TypeToken::of::<T>(), value, protocol)
    }

    pub fn read<T: Thrift>(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<T>> {
        match self.read_value(&TypeToken::of::<T>(), protocol)? {
            Some(value) => downcast::<T>(value).map(Some),
            None => Ok(None),
        }
    }

    /// Serialize `value` into a fresh buffer.
    pub fn encode<T: Thrift>(&self, value: &T, protocol: Protocol) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut writer = protocol.writer(&mut out);
            self.write(value, &mut *writer)?;
        }
        Ok(out)
    }

    /// Deserialize one `T` from `bytes`.
    pub fn decode<T: Thrift>(&self, bytes: &[u8], protocol: Protocol) -> CodecResult<T> {
        let mut reader = protocol.reader(bytes);
        self.read::<T>(&mut *reader)?.ok_or_else(|| {
            CodecError::protocol(format!("{} decoded to no value", TypeKey::of::<T>()))
        })
    }

    fn build(&self, token: &TypeToken, context: &mut BuildContext) -> CodecResult<Arc<dyn Codec>> {
        let key = token.key();
        if let Some(codec) = self.cached_codec(&key).or_else(|| context.pending(&key)) {
            return Ok(codec);
        }
        if context.stack.contains(&key) {
            return Ok(Arc::new(DelegateCodec::new(
                Arc::downgrade(&self.state),
                *token,
            )));
        }

        let catalog = &self.state.catalog;
        let wire_type = catalog.resolve(token)?;
        log::debug!("[codec] building codec for {:?} ({})", wire_type, key);

        let codec: Arc<dyn Codec> = if let Some(coercion) = catalog.coercion(&key) {
            let inner = self.build(coercion.wire_token(), context)?;
            Arc::new(CoercionCodec::new(coercion, inner))
        } else {
            let shape = token.shape();
            match builtin_codec(&shape, key)? {
                Some(codec) => codec,
                None => match shape {
                    Shape::Enum(_) => Arc::new(EnumCodec::new(wire_type)?),
                    Shape::List(shape) => {
                        let element = self.build(&shape.element, context)?;
                        Arc::new(ListCodec::new(wire_type, shape, element))
                    }
                    Shape::Set(shape) => {
                        let element = self.build(&shape.element, context)?;
                        Arc::new(SetCodec::new(wire_type, shape, element))
                    }
                    Shape::Map(shape) => {
                        let key_codec = self.build(&shape.key, context)?;
                        let value_codec = self.build(&shape.value, context)?;
                        Arc::new(MapCodec::new(wire_type, shape, key_codec, value_codec))
                    }
                    Shape::Wrapped(shape) => {
                        let inner = self.build(&shape.inner, context)?;
                        Arc::new(WrapperCodec::new(wire_type, shape, inner))
                    }
                    Shape::Struct(_) => {
                        let metadata = wire_type.struct_metadata()?;
                        context.stack.push(key);
                        let fields = metadata
                            .fields
                            .iter()
                            .map(|field| self.build(&field.token, context))
                            .collect::<CodecResult<Vec<_>>>();
                        context.stack.pop();
                        if metadata.is_union() {
                            Arc::new(UnionCodec::new(wire_type, metadata, fields?)?)
                        } else {
                            Arc::new(StructCodec::new(wire_type, metadata, fields?)?)
                        }
                    }
                    other => {
                        return Err(CodecError::unsupported(format!(
                            "no codec for {} ({:?})",
                            key, other
                        )))
                    }
                },
            }
        };

        if !context.stack.is_empty() {
            context.pending.push((key, codec.clone()));
            return Ok(codec);
        }
        let codec = self.state.codecs.entry(key).or_insert(codec).value().clone();
        self.publish(context);
        Ok(codec)
    }

    /// Cache the codecs built below the outermost type, enclosing types first.
    fn publish(&self, context: &mut BuildContext) {
        if !context.pending.is_empty() {
            log::debug!("[codec] publishing {} nested codecs", context.pending.len());
        }
        for (key, codec) in context.pending.drain(..).rev() {
            self.state.codecs.entry(key).or_insert(codec);
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent catalog mapping native types to wire types.
//!
//! Resolution results are cached for the lifetime of the catalog and never
//! invalidated. Concurrent builders of the same type race on an
//! insert-if-absent: the first writer wins and later builders adopt its
//! result.
//!
//! Recursive struct graphs are resolved with an explicit stack of the structs
//! currently being built. A field referring back to a struct on that stack
//! gets a [`RecursiveTypeReference`] when it is marked recursive; otherwise
//! resolution fails.
//!
//! Everything built below the outermost struct is held in a `Resolution`
//! and published only once that struct is complete, so other threads never
//! see a struct whose recursive references cannot resolve yet.

use super::coercion::TypeCoercion;
use super::definition::{FieldDefinition, StructDefinition};
use super::enums::{EnumDefinition, EnumMetadata};
use super::structs::{
    BuilderMethod, ConstructorInjection, FieldKind, FieldMetadata, Injection, MethodInjection,
    ParameterInjection, StructKind, StructMetadata,
};
use super::types::{Shape, Thrift, TypeKey, TypeToken};
use super::wire_type::{RecursiveTypeReference, StructRef, WireKind, WireType};
use crate::error::{CodecError, CodecResult};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
}

pub(crate) struct CatalogState {
    wire_types: DashMap<TypeKey, WireType>,
    structs: DashMap<TypeKey, Arc<StructMetadata>>,
    enums: DashMap<TypeKey, Arc<EnumMetadata>>,
    coercions: RwLock<HashMap<TypeKey, Arc<TypeCoercion>>>,
    stats: RwLock<LookupStats>,
}

impl CatalogState {
    pub(crate) fn cached_struct(&self, key: &TypeKey) -> Option<Arc<StructMetadata>> {
        self.structs.get(key).map(|entry| entry.value().clone())
    }
}

/// State of one top-level resolution: the structs being built and the
/// results waiting for the outermost struct to complete.
#[derive(Default)]
struct Resolution {
    stack: Vec<TypeKey>,
    structs: Vec<(TypeKey, Arc<StructMetadata>)>,
    wire_types: Vec<(TypeKey, WireType)>,
}

impl Resolution {
    fn wire_type(&self, key: &TypeKey) -> Option<WireType> {
        self.wire_types
            .iter()
            .find(|(pending, _)| pending == key)
            .map(|(_, wire_type)| wire_type.clone())
    }

    fn struct_metadata(&self, key: &TypeKey) -> Option<Arc<StructMetadata>> {
        self.structs
            .iter()
            .find(|(pending, _)| pending == key)
            .map(|(_, metadata)| metadata.clone())
    }
}

/// Shared handle to a type catalog. Clones refer to the same caches.
#[derive(Clone)]
pub struct TypeCatalog {
    state: Arc<CatalogState>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CatalogState {
                wire_types: DashMap::new(),
                structs: DashMap::new(),
                enums: DashMap::new(),
                coercions: RwLock::new(HashMap::new()),
                stats: RwLock::new(LookupStats::default()),
            }),
        }
    }

    /// Wire type of `token`, building and caching metadata as needed.
    pub fn resolve(&self, token: &TypeToken) -> CodecResult<WireType> {
        let mut resolution = Resolution::default();
        self.resolve_nested(token, false, &mut resolution)
    }

    pub fn resolve_type<T: Thrift>(&self) -> CodecResult<WireType> {
        self.resolve(&TypeToken::of::<T>())
    }

    pub fn struct_metadata(&self, token: &TypeToken) -> CodecResult<Arc<StructMetadata>> {
        self.resolve(token)?.struct_metadata()
    }

    pub fn enum_metadata(&self, token: &TypeToken) -> CodecResult<Arc<EnumMetadata>> {
        let wire_type = self.resolve(token)?;
        wire_type.enum_metadata().cloned().ok_or_else(|| {
            CodecError::IllegalState(format!("{} is not an enum", token.key()))
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<CatalogState> {
        Arc::downgrade(&self.state)
    }

    pub fn is_cached(&self, key: &TypeKey) -> bool {
        self.state.wire_types.contains_key(key)
    }

    pub fn stats(&self) -> LookupStats {
        *self.state.stats.read()
    }

    /// Register a bidirectional coercion of native type `N` to wire type `W`.
    ///
    /// Coercions are consulted before structural resolution. Registering one
    /// for a type that already resolved is rejected since the cache is never
    /// invalidated.
    pub fn add_coercion<N, W>(&self, to_wire: fn(&N) -> W, from_wire: fn(W) -> N) -> CodecResult<()>
    where
        N: Any + Send,
        W: Thrift,
    {
        let native = TypeKey::of::<N>();
        if self.is_cached(&native) {
            return Err(CodecError::IllegalState(format!(
                "cannot add coercion for {}: type already resolved",
                native
            )));
        }
        let wire_token = TypeToken::of::<W>();
        let wire_type = self.resolve(&wire_token)?.with_native(native);
        log::debug!(
            "[catalog] coercion {} <-> {:?} registered",
            native,
            wire_type
        );
        let coercion = TypeCoercion::new::<N, W>(wire_token, wire_type, to_wire, from_wire);
        self.state.coercions.write().insert(native, Arc::new(coercion));
        Ok(())
    }

    /// Record the wire type of a type handled by a custom codec.
    pub(crate) fn register(&self, wire_type: WireType) -> CodecResult<()> {
        let native = wire_type.native();
        let cached = self.state.wire_types.entry(native).or_insert(wire_type.clone());
        if *cached.value() != wire_type {
            return Err(CodecError::IllegalState(format!(
                "{} already resolved as {:?}",
                native,
                cached.value()
            )));
        }
        Ok(())
    }

    pub fn coercion(&self, key: &TypeKey) -> Option<Arc<TypeCoercion>> {
        self.state.coercions.read().get(key).cloned()
    }

    fn record_lookup(&self, hit: bool) {
        let mut stats = self.state.stats.write();
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }

    fn resolve_nested(
        &self,
        token: &TypeToken,
        recursive: bool,
        resolution: &mut Resolution,
    ) -> CodecResult<WireType> {
        let key = token.key();
        if let Some(cached) = self.state.wire_types.get(&key) {
            self.record_lookup(true);
            return Ok(cached.value().clone());
        }
        if let Some(pending) = resolution.wire_type(&key) {
            self.record_lookup(true);
            return Ok(pending);
        }
        self.record_lookup(false);

        if let Some(coercion) = self.coercion(&key) {
            return Ok(self.cache(coercion.wire_type().clone(), resolution));
        }

        let kind = match token.shape() {
            Shape::Bool => WireKind::Bool,
            Shape::Byte => WireKind::Byte,
            Shape::I16 => WireKind::I16,
            Shape::I32 => WireKind::I32,
            Shape::I64 => WireKind::I64,
            Shape::Double => WireKind::Double,
            Shape::Float => WireKind::Float,
            Shape::String => WireKind::String,
            Shape::Binary => WireKind::Binary,
            Shape::Void => WireKind::Void,
            Shape::Enum(definition) => WireKind::Enum(self.build_enum(key, definition())?),
            Shape::List(shape) => {
                WireKind::List(Box::new(self.resolve_nested(&shape.element, recursive, resolution)?))
            }
            Shape::Set(shape) => {
                WireKind::Set(Box::new(self.resolve_nested(&shape.element, recursive, resolution)?))
            }
            Shape::Map(shape) => WireKind::Map(
                Box::new(self.resolve_nested(&shape.key, recursive, resolution)?),
                Box::new(self.resolve_nested(&shape.value, recursive, resolution)?),
            ),
            Shape::Wrapped(shape) => {
                let inner = self.resolve_nested(&shape.inner, recursive, resolution)?;
                return Ok(self.cache(inner.with_native(key), resolution));
            }
            Shape::Struct(definition) => {
                if resolution.stack.contains(&key) {
                    if !recursive {
                        return Err(CodecError::unsupported(format!(
                            "{} refers to itself through a field not marked recursive",
                            key
                        )));
                    }
                    let reference =
                        RecursiveTypeReference::new(self.downgrade(), key);
                    return Ok(WireType::new(
                        WireKind::Struct(StructRef::Recursive(reference)),
                        key,
                    ));
                }
                resolution.stack.push(key);
                let built = self.build_struct(key, definition(), resolution);
                resolution.stack.pop();
                WireKind::Struct(StructRef::Resolved(built?))
            }
            Shape::Opaque => {
                return Err(CodecError::unsupported(format!(
                    "{} has no wire representation; register a coercion or a codec",
                    key
                )));
            }
        };
        Ok(self.cache(WireType::new(kind, key), resolution))
    }

    /// Insert-if-absent. Types holding pending recursive references are
    /// returned without caching so later lookups re-check recursion. While a
    /// struct is being built the result stays in `resolution`; the first
    /// result cached with an empty stack publishes everything pending.
    fn cache(&self, wire_type: WireType, resolution: &mut Resolution) -> WireType {
        let recursive = wire_type.has_recursive_reference();
        if !resolution.stack.is_empty() {
            if !recursive {
                resolution.wire_types.push((wire_type.native(), wire_type.clone()));
            }
            return wire_type;
        }
        self.publish(resolution);
        if recursive {
            return wire_type;
        }
        self.state
            .wire_types
            .entry(wire_type.native())
            .or_insert(wire_type)
            .value()
            .clone()
    }

    /// Move pending results into the shared caches. Structs go first, innermost
    /// last, so a published struct's recursive references resolve at once.
    fn publish(&self, resolution: &mut Resolution) {
        if resolution.structs.is_empty() && resolution.wire_types.is_empty() {
            return;
        }
        log::debug!(
            "[catalog] publishing {} structs and {} types",
            resolution.structs.len(),
            resolution.wire_types.len()
        );
        for (key, metadata) in resolution.structs.drain(..).rev() {
            self.state.structs.entry(key).or_insert(metadata);
        }
        for (key, wire_type) in resolution.wire_types.drain(..) {
            self.state.wire_types.entry(key).or_insert(wire_type);
        }
    }

    fn build_enum(&self, key: TypeKey, definition: EnumDefinition) -> CodecResult<Arc<EnumMetadata>> {
        if let Some(existing) = self.state.enums.get(&key) {
            return Ok(existing.value().clone());
        }
        let metadata = Arc::new(EnumMetadata::from_definition(definition)?);
        log::debug!(
            "[catalog] built enum {} ({} constants)",
            metadata.name(),
            metadata.constants().len()
        );
        Ok(self.state.enums.entry(key).or_insert(metadata).value().clone())
    }

    fn build_struct(
        &self,
        key: TypeKey,
        definition: StructDefinition,
        resolution: &mut Resolution,
    ) -> CodecResult<Arc<StructMetadata>> {
        if let Some(existing) = self.state.cached_struct(&key) {
            return Ok(existing);
        }
        if let Some(pending) = resolution.struct_metadata(&key) {
            return Ok(pending);
        }
        validate(&definition)?;

        let StructDefinition {
            name,
            kind,
            native,
            construct_type: _,
            fields: field_definitions,
            constructor,
            method_injections,
            builder,
        } = definition;

        let mut fields = Vec::with_capacity(field_definitions.len());
        for field in field_definitions {
            fields.push(self.build_field(&name, field, resolution)?);
        }

        let constructor = match constructor {
            Some((ids, construct)) => {
                let parameters = bind_parameters(&name, &ids, &fields)?;
                for parameter in &parameters {
                    attach(&mut fields, parameter.id, Injection::ConstructorParameter {
                        index: parameter.index,
                    });
                }
                Some(ConstructorInjection {
                    parameters,
                    construct,
                })
            }
            None => None,
        };

        let mut methods = Vec::with_capacity(method_injections.len());
        for (method, (method_name, ids, invoke)) in method_injections.into_iter().enumerate() {
            let parameters = bind_parameters(&name, &ids, &fields)?;
            for parameter in &parameters {
                attach(&mut fields, parameter.id, Injection::MethodParameter {
                    method,
                    index: parameter.index,
                });
            }
            methods.push(MethodInjection {
                name: method_name,
                parameters,
                invoke,
            });
        }

        let builder = match builder {
            Some((ids, build)) => {
                let parameters = bind_parameters(&name, &ids, &fields)?;
                for parameter in &parameters {
                    attach(&mut fields, parameter.id, Injection::BuilderParameter {
                        index: parameter.index,
                    });
                }
                Some(BuilderMethod { parameters, build })
            }
            None => None,
        };

        let metadata = Arc::new(StructMetadata {
            name,
            kind,
            native,
            fields,
            constructor,
            method_injections: methods,
            builder,
        });
        log::debug!(
            "[catalog] built {:?} {} ({} fields)",
            metadata.kind,
            metadata.name,
            metadata.fields.len()
        );
        resolution.structs.push((key, metadata.clone()));
        Ok(metadata)
    }

    fn build_field(
        &self,
        owner: &str,
        field: FieldDefinition,
        resolution: &mut Resolution,
    ) -> CodecResult<FieldMetadata> {
        let wire_type = self
            .resolve_nested(&field.token, field.recursive, resolution)
            .map_err(|err| match err {
                CodecError::UnsupportedType(msg) => CodecError::UnsupportedType(format!(
                    "field '{}' of {}: {}",
                    field.name, owner, msg
                )),
                other => other,
            })?;
        Ok(FieldMetadata {
            id: field.id,
            name: field.name,
            kind: field.kind,
            requiredness: field.requiredness,
            recursive: field.recursive,
            token: field.token,
            wire_type,
            extraction: field.extraction,
            injections: field.injection.into_iter().collect(),
            union_constructor: field.union_constructor,
        })
    }
}

fn bind_parameters(
    owner: &str,
    ids: &[i16],
    fields: &[FieldMetadata],
) -> CodecResult<Vec<ParameterInjection>> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| {
            let field = fields
                .iter()
                .find(|field| field.id == *id && field.kind == FieldKind::Data)
                .ok_or_else(|| {
                    CodecError::invalid_metadata(format!(
                        "{} binds parameter {} to unknown field id {}",
                        owner, index, id
                    ))
                })?;
            Ok(ParameterInjection {
                id: *id,
                name: field.name.clone(),
                index,
            })
        })
        .collect()
}

fn attach(fields: &mut [FieldMetadata], id: i16, injection: Injection) {
    if let Some(field) = fields
        .iter_mut()
        .find(|field| field.id == id && field.kind == FieldKind::Data)
    {
        field.injections.push(injection);
    }
}

fn validate(definition: &StructDefinition) -> CodecResult<()> {
    let name = &definition.name;

    let mut ids = HashSet::with_capacity(definition.fields.len());
    for field in &definition.fields {
        if !ids.insert(field.id) {
            return Err(CodecError::invalid_metadata(format!(
                "{} has duplicate field id {}",
                name, field.id
            )));
        }
    }

    let union_ids = definition
        .fields
        .iter()
        .filter(|field| field.kind == FieldKind::UnionId)
        .count();
    match definition.kind {
        StructKind::Union if union_ids != 1 => {
            return Err(CodecError::invalid_metadata(format!(
                "union {} must have exactly one union id field, found {}",
                name, union_ids
            )));
        }
        StructKind::Struct if union_ids != 0 => {
            return Err(CodecError::invalid_metadata(format!(
                "struct {} declares a union id field",
                name
            )));
        }
        _ => {}
    }

    match definition.kind {
        StructKind::Struct if definition.constructor.is_none() => {
            return Err(CodecError::invalid_metadata(format!(
                "{} has no constructor",
                name
            )));
        }
        StructKind::Union => {
            if let Some((ids, _)) = &definition.constructor {
                if !ids.is_empty() {
                    return Err(CodecError::invalid_metadata(format!(
                        "union {} constructor must not take parameters",
                        name
                    )));
                }
            }
            let unconstructible = definition.fields.iter().find(|field| {
                field.kind == FieldKind::Data && field.union_constructor.is_none()
            });
            if let (None, Some(field)) = (&definition.constructor, unconstructible) {
                return Err(CodecError::invalid_metadata(format!(
                    "union {} has no constructor for field '{}'",
                    name, field.name
                )));
            }
        }
        _ => {}
    }

    if definition.builder.is_none() && definition.construct_type != definition.native {
        return Err(CodecError::invalid_metadata(format!(
            "{} constructs {} but has no builder method",
            name,
            definition.construct_type.name()
        )));
    }
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed builders describing how a Rust type maps to a Thrift struct or union.
//!
//! A [`StructDef`] collects fields, a constructor and optional method
//! injections or builder method, then erases everything into a
//! [`StructDefinition`] that the catalog validates and resolves.
//!
//! ```ignore
//! impl Thrift for Point {
//!     fn shape() -> Shape {
//!         Shape::Struct(|| {
//!             StructDef::<Point>::new("Point")
//!                 .constructor(&[1, 2], |args| {
//!                     Ok(Point { x: args.require(0)?, y: args.require(1)? })
//!                 })
//!                 .field(FieldDef::new(1, "x").required().get(|p: &Point| &p.x))
//!                 .field(FieldDef::new(2, "y").get(|p: &Point| &p.y))
//!                 .build()
//!         })
//!     }
//! }
//! ```
//!
//! `C` is the type being constructed. It is `T` itself unless a builder
//! method turns a separate builder type into `T`.

use super::structs::{
    Args, BuildFn, ConstructFn, Extraction, FieldKind, FieldRef, Injection, MethodFn,
    Requiredness, StructKind, UnionConstructFn, VariantRef,
};
use super::types::{downcast, DynValue, Thrift, TypeKey, TypeToken};
use crate::error::{CodecError, CodecResult};
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

/// Name and id used for the synthetic union discriminant field.
pub const UNION_ID_FIELD: (i16, &str) = (i16::MIN, "_union_id");

/// Type-erased struct description, validated by the catalog.
pub struct StructDefinition {
    pub(crate) name: String,
    pub(crate) kind: StructKind,
    pub(crate) native: TypeKey,
    pub(crate) construct_type: TypeKey,
    pub(crate) fields: Vec<FieldDefinition>,
    pub(crate) constructor: Option<(Vec<i16>, ConstructFn)>,
    pub(crate) method_injections: Vec<(String, Vec<i16>, MethodFn)>,
    pub(crate) builder: Option<(Vec<i16>, BuildFn)>,
}

impl StructDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) struct FieldDefinition {
    pub(crate) id: i16,
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) requiredness: Requiredness,
    pub(crate) recursive: bool,
    pub(crate) token: TypeToken,
    pub(crate) extraction: Option<Extraction>,
    pub(crate) injection: Option<Injection>,
    pub(crate) union_constructor: Option<UnionConstructFn>,
}

fn mismatch<T>() -> CodecError {
    CodecError::TypeMismatch {
        expected: type_name::<T>(),
    }
}

// Closure adapters: passing through an `Fn` bound gives the closures
// higher-ranked signatures before they are boxed.
fn construct_fn<F>(f: F) -> ConstructFn
where
    F: Fn(&mut Args<'_>) -> CodecResult<DynValue> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn method_fn<F>(f: F) -> MethodFn
where
    F: Fn(&mut dyn Any, &mut Args<'_>) -> CodecResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn build_fn<F>(f: F) -> BuildFn
where
    F: Fn(DynValue, &mut Args<'_>) -> CodecResult<Option<DynValue>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn inject_fn<F>(f: F) -> Arc<dyn Fn(&mut dyn Any, DynValue) -> CodecResult<()> + Send + Sync>
where
    F: Fn(&mut dyn Any, DynValue) -> CodecResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Typed description of a struct or union `T` constructed through `C`.
pub struct StructDef<T, C = T> {
    definition: StructDefinition,
    _marker: PhantomData<fn() -> (T, C)>,
}

impl<T: Any + Send> StructDef<T, T> {
    /// A struct constructed directly.
    pub fn new(name: &str) -> Self {
        Self::with_kind(name, StructKind::Struct)
    }

    /// A union constructed directly.
    pub fn union(name: &str) -> Self {
        Self::with_kind(name, StructKind::Union)
    }
}

impl<T: Any + Send, C: Any + Send> StructDef<T, C> {
    fn with_kind(name: &str, kind: StructKind) -> Self {
        Self {
            definition: StructDefinition {
                name: name.to_string(),
                kind,
                native: TypeKey::of::<T>(),
                construct_type: TypeKey::of::<C>(),
                fields: Vec::new(),
                constructor: None,
                method_injections: Vec::new(),
                builder: None,
            },
            _marker: PhantomData,
        }
    }

    /// A struct constructed through the builder type `C`.
    pub fn builder(name: &str) -> Self {
        Self::with_kind(name, StructKind::Struct)
    }

    /// A union constructed through the builder type `C`.
    pub fn union_builder(name: &str) -> Self {
        Self::with_kind(name, StructKind::Union)
    }

    /// Constructor taking the values of fields `ids`, in order.
    pub fn constructor<F>(mut self, ids: &[i16], construct: F) -> Self
    where
        F: Fn(&mut Args<'_>) -> CodecResult<C> + Send + Sync + 'static,
    {
        self.definition.constructor = Some((
            ids.to_vec(),
            construct_fn(move |args| Ok(Box::new(construct(args)?) as DynValue)),
        ));
        self
    }

    /// No-argument constructor through `C::default()`.
    pub fn default_constructor(self) -> Self
    where
        C: Default,
    {
        self.constructor(&[], |_| Ok(C::default()))
    }

    pub fn field<F>(mut self, field: FieldDef<T, C, F>) -> Self {
        self.definition.fields.push(field.definition);
        self
    }

    /// Method invoked after construction when at least one of `ids` was read.
    pub fn method_injection<F>(mut self, name: &str, ids: &[i16], invoke: F) -> Self
    where
        F: Fn(&mut C, &mut Args<'_>) -> CodecResult<()> + Send + Sync + 'static,
    {
        let invoke = method_fn(move |target, args| {
            let target = target.downcast_mut::<C>().ok_or_else(mismatch::<C>)?;
            invoke(target, args)
        });
        self.definition
            .method_injections
            .push((name.to_string(), ids.to_vec(), invoke));
        self
    }

    /// Final step turning the constructed `C` into `T`.
    pub fn builder_method<F>(mut self, ids: &[i16], build: F) -> Self
    where
        F: Fn(C, &mut Args<'_>) -> CodecResult<Option<T>> + Send + Sync + 'static,
    {
        let build = build_fn(move |builder, args| {
            let built = build(downcast::<C>(builder)?, args)?;
            Ok(built.map(|value| Box::new(value) as DynValue))
        });
        self.definition.builder = Some((ids.to_vec(), build));
        self
    }

    /// Builder method returning an erased value; the codec checks its type.
    pub fn builder_method_dyn<F>(mut self, ids: &[i16], build: F) -> Self
    where
        F: Fn(C, &mut Args<'_>) -> CodecResult<Option<DynValue>> + Send + Sync + 'static,
    {
        let build = build_fn(move |builder, args| build(downcast::<C>(builder)?, args));
        self.definition.builder = Some((ids.to_vec(), build));
        self
    }

    /// Union discriminant: the id of the field currently held.
    pub fn union_id(mut self, get: fn(&T) -> i16, set: Option<fn(&mut C, i16)>) -> Self {
        let extract: Arc<dyn Fn(&dyn Any) -> Option<DynValue> + Send + Sync> =
            Arc::new(move |instance: &dyn Any| {
                instance
                    .downcast_ref::<T>()
                    .map(|instance| Box::new(get(instance)) as DynValue)
            });
        let injection = set.map(|set| {
            Injection::Field(inject_fn(move |target, value| {
                let target = target.downcast_mut::<C>().ok_or_else(mismatch::<C>)?;
                set(target, downcast::<i16>(value)?);
                Ok(())
            }))
        });
        self.definition.fields.push(FieldDefinition {
            id: UNION_ID_FIELD.0,
            name: UNION_ID_FIELD.1.to_string(),
            kind: FieldKind::UnionId,
            requiredness: Requiredness::Default,
            recursive: false,
            token: TypeToken::of::<i16>(),
            extraction: Some(Extraction::Method(extract)),
            injection,
            union_constructor: None,
        });
        self
    }

    pub fn build(self) -> StructDefinition {
        self.definition
    }
}

/// Typed description of field `F` of `T`, injected into `C`.
pub struct FieldDef<T, C, F> {
    definition: FieldDefinition,
    _marker: PhantomData<fn() -> (T, C, F)>,
}

impl<T: Any + Send, C: Any + Send, F: Thrift> FieldDef<T, C, F> {
    pub fn new(id: i16, name: &str) -> Self {
        Self::with_token(id, name, TypeToken::of::<F>())
    }
}

impl<T: Any + Send, C: Any + Send, F: Any + Send> FieldDef<T, C, F> {
    /// Field whose type has no intrinsic shape and maps through a registered
    /// coercion or custom codec.
    pub fn coerced(id: i16, name: &str) -> Self {
        Self::with_token(id, name, TypeToken::opaque::<F>())
    }

    fn with_token(id: i16, name: &str, token: TypeToken) -> Self {
        Self {
            definition: FieldDefinition {
                id,
                name: name.to_string(),
                kind: FieldKind::Data,
                requiredness: Requiredness::Default,
                recursive: false,
                token,
                extraction: None,
                injection: None,
                union_constructor: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn required(mut self) -> Self {
        self.definition.requiredness = Requiredness::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.definition.requiredness = Requiredness::Optional;
        self
    }

    /// Allow this field to refer back to a struct still being resolved.
    pub fn recursive(mut self) -> Self {
        self.definition.recursive = true;
        self
    }

    pub fn get(mut self, get: fn(&T) -> &F) -> Self {
        self.definition.extraction = Some(Extraction::Field(Arc::new(FieldRef { get })));
        self
    }

    /// Extraction for a value that only some variants of `T` carry.
    pub fn get_variant(mut self, get: fn(&T) -> Option<&F>) -> Self {
        self.definition.extraction = Some(Extraction::Field(Arc::new(VariantRef { get })));
        self
    }

    /// Accessor producing an owned value.
    pub fn get_with<G>(mut self, get: G) -> Self
    where
        G: Fn(&T) -> Option<F> + Send + Sync + 'static,
    {
        let extract: Arc<dyn Fn(&dyn Any) -> Option<DynValue> + Send + Sync> =
            Arc::new(move |instance: &dyn Any| {
                instance
                    .downcast_ref::<T>()
                    .and_then(|instance| get(instance))
                    .map(|value| Box::new(value) as DynValue)
            });
        self.definition.extraction = Some(Extraction::Method(extract));
        self
    }

    /// Direct field assignment after construction.
    pub fn set(mut self, set: fn(&mut C, F)) -> Self {
        self.definition.injection = Some(Injection::Field(inject_fn(move |target, value| {
            let target = target.downcast_mut::<C>().ok_or_else(mismatch::<C>)?;
            set(target, downcast::<F>(value)?);
            Ok(())
        })));
        self
    }

    /// Fallible setter method called after construction.
    pub fn setter<S>(mut self, set: S) -> Self
    where
        S: Fn(&mut C, F) -> CodecResult<()> + Send + Sync + 'static,
    {
        self.definition.injection = Some(Injection::Setter(inject_fn(move |target, value| {
            let target = target.downcast_mut::<C>().ok_or_else(mismatch::<C>)?;
            set(target, downcast::<F>(value)?)
        })));
        self
    }

    /// Union constructor building `C` from this field's value alone.
    pub fn construct_with(mut self, construct: fn(F) -> C) -> Self {
        let construct: UnionConstructFn = Arc::new(move |value: DynValue| -> CodecResult<DynValue> {
            Ok(Box::new(construct(downcast::<F>(value)?)) as DynValue)
        });
        self.definition.union_constructor = Some(construct);
        self
    }
}

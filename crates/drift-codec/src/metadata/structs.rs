// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Struct and union metadata: fields, extraction and injection strategies.

use super::types::{downcast, DynValue, TypeKey, TypeToken};
use super::wire_type::WireType;
use crate::error::{CodecError, CodecResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A regular field carried on the wire.
    Data,
    /// Discriminant of a union; never written as a field.
    UnionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requiredness {
    Required,
    Optional,
    #[default]
    Default,
}

/// Borrowing accessor for a field stored inside an instance.
pub trait FieldAccess: Send + Sync {
    fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any>;
}

pub(crate) struct FieldRef<T, F> {
    pub(crate) get: fn(&T) -> &F,
}

impl<T: Any, F: Any> FieldAccess for FieldRef<T, F> {
    fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        instance
            .downcast_ref::<T>()
            .map(|instance| (self.get)(instance) as &dyn Any)
    }
}

/// Accessor for a field that only exists in some variants of an enum.
pub(crate) struct VariantRef<T, F> {
    pub(crate) get: fn(&T) -> Option<&F>,
}

impl<T: Any, F: Any> FieldAccess for VariantRef<T, F> {
    fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        instance
            .downcast_ref::<T>()
            .and_then(|instance| (self.get)(instance))
            .map(|field| field as &dyn Any)
    }
}

pub type ExtractFn = Arc<dyn Fn(&dyn Any) -> Option<DynValue> + Send + Sync>;
pub type InjectFn = Arc<dyn Fn(&mut dyn Any, DynValue) -> CodecResult<()> + Send + Sync>;
pub type ConstructFn = Arc<dyn Fn(&mut Args<'_>) -> CodecResult<DynValue> + Send + Sync>;
pub type MethodFn = Arc<dyn Fn(&mut dyn Any, &mut Args<'_>) -> CodecResult<()> + Send + Sync>;
pub type BuildFn = Arc<dyn Fn(DynValue, &mut Args<'_>) -> CodecResult<Option<DynValue>> + Send + Sync>;
pub type UnionConstructFn = Arc<dyn Fn(DynValue) -> CodecResult<DynValue> + Send + Sync>;

/// How a field value is read out of an instance for writing.
#[derive(Clone)]
pub enum Extraction {
    /// Direct borrow of a stored field.
    Field(Arc<dyn FieldAccess>),
    /// Accessor method producing an owned value.
    Method(ExtractFn),
}

/// A value extracted from an instance.
pub enum Extracted<'a> {
    Borrowed(&'a dyn Any),
    Owned(DynValue),
}

impl Extracted<'_> {
    pub fn as_any(&self) -> &dyn Any {
        match self {
            Self::Borrowed(value) => *value,
            Self::Owned(value) => &**value,
        }
    }
}

impl Extraction {
    /// `None` when the instance has no value for this field.
    pub fn extract<'a>(&self, instance: &'a dyn Any) -> Option<Extracted<'a>> {
        match self {
            Self::Field(access) => access.get(instance).map(Extracted::Borrowed),
            Self::Method(extract) => extract(instance).map(Extracted::Owned),
        }
    }
}

impl fmt::Debug for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(_) => f.write_str("Field"),
            Self::Method(_) => f.write_str("Method"),
        }
    }
}

/// How a decoded field value reaches the new instance.
#[derive(Clone)]
pub enum Injection {
    Field(InjectFn),
    Setter(InjectFn),
    ConstructorParameter { index: usize },
    MethodParameter { method: usize, index: usize },
    BuilderParameter { index: usize },
}

impl Injection {
    /// Injector applied directly to a constructed instance.
    pub(crate) fn injector(&self) -> Option<&InjectFn> {
        match self {
            Self::Field(inject) | Self::Setter(inject) => Some(inject),
            _ => None,
        }
    }
}

impl fmt::Debug for Injection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(_) => f.write_str("Field"),
            Self::Setter(_) => f.write_str("Setter"),
            Self::ConstructorParameter { index } => write!(f, "ConstructorParameter({})", index),
            Self::MethodParameter { method, index } => {
                write!(f, "MethodParameter({}, {})", method, index)
            }
            Self::BuilderParameter { index } => write!(f, "BuilderParameter({})", index),
        }
    }
}

/// One field of a struct or union.
pub struct FieldMetadata {
    pub id: i16,
    pub name: String,
    pub kind: FieldKind,
    pub requiredness: Requiredness,
    pub recursive: bool,
    pub token: TypeToken,
    pub wire_type: WireType,
    pub extraction: Option<Extraction>,
    pub injections: Vec<Injection>,
    pub union_constructor: Option<UnionConstructFn>,
}

impl FieldMetadata {
    pub fn is_required(&self) -> bool {
        self.requiredness == Requiredness::Required
    }

    /// Fields without extraction are never written.
    pub fn is_readable(&self) -> bool {
        self.extraction.is_some()
    }

    /// Fields without any injection are skipped when reading.
    pub fn is_injectable(&self) -> bool {
        !self.injections.is_empty() || self.union_constructor.is_some()
    }
}

impl fmt::Debug for FieldMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMetadata")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("requiredness", &self.requiredness)
            .field("recursive", &self.recursive)
            .field("wire_type", &self.wire_type)
            .field("extraction", &self.extraction)
            .field("injections", &self.injections)
            .finish()
    }
}

/// A constructor or method parameter bound to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInjection {
    pub id: i16,
    pub name: String,
    pub index: usize,
}

#[derive(Clone)]
pub struct ConstructorInjection {
    pub parameters: Vec<ParameterInjection>,
    pub construct: ConstructFn,
}

#[derive(Clone)]
pub struct MethodInjection {
    pub name: String,
    pub parameters: Vec<ParameterInjection>,
    pub invoke: MethodFn,
}

#[derive(Clone)]
pub struct BuilderMethod {
    pub parameters: Vec<ParameterInjection>,
    pub build: BuildFn,
}

/// Resolved metadata for one struct or union.
pub struct StructMetadata {
    pub name: String,
    pub kind: StructKind,
    pub native: TypeKey,
    pub fields: Vec<FieldMetadata>,
    pub constructor: Option<ConstructorInjection>,
    pub method_injections: Vec<MethodInjection>,
    pub builder: Option<BuilderMethod>,
}

impl StructMetadata {
    pub fn is_union(&self) -> bool {
        self.kind == StructKind::Union
    }

    pub fn field(&self, id: i16) -> Option<&FieldMetadata> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Fields carried on the wire, in declaration order.
    pub fn data_fields(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|field| field.kind == FieldKind::Data)
    }

    pub fn union_id_field(&self) -> Option<&FieldMetadata> {
        self.fields
            .iter()
            .find(|field| field.kind == FieldKind::UnionId)
    }
}

impl fmt::Debug for StructMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructMetadata")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("native", &self.native)
            .field("fields", &self.fields)
            .field(
                "constructor",
                &self.constructor.as_ref().map(|c| &c.parameters),
            )
            .field(
                "method_injections",
                &self
                    .method_injections
                    .iter()
                    .map(|m| &m.name)
                    .collect::<Vec<_>>(),
            )
            .field("builder", &self.builder.as_ref().map(|b| &b.parameters))
            .finish()
    }
}

/// Arguments handed to constructors, injection methods and builder methods.
///
/// Slot `i` holds the value for the `i`-th declared parameter id, or nothing
/// when the field was absent and has no wire null value.
pub struct Args<'a> {
    owner: &'a str,
    parameters: &'a [ParameterInjection],
    values: Vec<Option<DynValue>>,
}

impl<'a> Args<'a> {
    pub(crate) fn new(
        owner: &'a str,
        parameters: &'a [ParameterInjection],
        values: Vec<Option<DynValue>>,
    ) -> Self {
        Self {
            owner,
            parameters,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_present(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(Some(_)))
    }

    /// Take the value of parameter `index`, if any.
    pub fn take<F: Any>(&mut self, index: usize) -> CodecResult<Option<F>> {
        match self.values.get_mut(index).and_then(Option::take) {
            Some(value) => downcast::<F>(value).map(Some),
            None => Ok(None),
        }
    }

    /// Take the value of parameter `index`, failing when it is absent.
    pub fn require<F: Any>(&mut self, index: usize) -> CodecResult<F> {
        self.take(index)?.ok_or_else(|| self.missing(index))
    }

    fn missing(&self, index: usize) -> CodecError {
        match self.parameters.get(index) {
            Some(parameter) => CodecError::RequiredFieldMissing {
                struct_name: self.owner.to_string(),
                field: parameter.name.clone(),
                id: parameter.id,
            },
            None => CodecError::IllegalState(format!(
                "{} has no parameter {}",
                self.owner, index
            )),
        }
    }
}

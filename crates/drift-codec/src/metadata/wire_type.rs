// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire type descriptors.

use super::catalog::CatalogState;
use super::enums::EnumMetadata;
use super::structs::StructMetadata;
use super::types::TypeKey;
use crate::error::{CodecError, CodecResult};
use crate::protocol::ProtocolType;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::{Arc, Weak};

/// Wire type of a native type.
///
/// Equality and hashing are structural over the kind, the native type and
/// nested element types. Struct and enum references compare by native type.
#[derive(Clone)]
pub struct WireType {
    kind: WireKind,
    native: TypeKey,
}

#[derive(Clone)]
pub enum WireKind {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    Float,
    String,
    Binary,
    Void,
    Struct(StructRef),
    Enum(Arc<EnumMetadata>),
    List(Box<WireType>),
    Set(Box<WireType>),
    Map(Box<WireType>, Box<WireType>),
}

impl WireKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Double => "double",
            Self::Float => "float",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Void => "void",
            Self::Struct(_) => "struct",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_, _) => "map",
        }
    }
}

impl WireType {
    pub fn new(kind: WireKind, native: TypeKey) -> Self {
        Self { kind, native }
    }

    pub fn kind(&self) -> &WireKind {
        &self.kind
    }

    pub fn native(&self) -> TypeKey {
        self.native
    }

    /// Same wire shape, recorded for another native type (wrappers, coercions).
    pub(crate) fn with_native(self, native: TypeKey) -> Self {
        Self {
            kind: self.kind,
            native,
        }
    }

    /// Wire kind byte used in field and container headers.
    pub fn protocol_type(&self) -> ProtocolType {
        match &self.kind {
            WireKind::Bool => ProtocolType::Bool,
            WireKind::Byte => ProtocolType::Byte,
            WireKind::I16 => ProtocolType::I16,
            WireKind::I32 | WireKind::Enum(_) => ProtocolType::I32,
            WireKind::I64 => ProtocolType::I64,
            WireKind::Double => ProtocolType::Double,
            WireKind::Float => ProtocolType::Float,
            WireKind::String | WireKind::Binary => ProtocolType::String,
            WireKind::Void => ProtocolType::Void,
            WireKind::Struct(_) => ProtocolType::Struct,
            WireKind::List(_) => ProtocolType::List,
            WireKind::Set(_) => ProtocolType::Set,
            WireKind::Map(_, _) => ProtocolType::Map,
        }
    }

    /// Struct metadata behind a STRUCT wire type.
    pub fn struct_metadata(&self) -> CodecResult<Arc<StructMetadata>> {
        match &self.kind {
            WireKind::Struct(reference) => reference.get(),
            other => Err(CodecError::IllegalState(format!(
                "{} is a {}, not a struct",
                self.native,
                other.name()
            ))),
        }
    }

    pub fn enum_metadata(&self) -> Option<&Arc<EnumMetadata>> {
        match &self.kind {
            WireKind::Enum(metadata) => Some(metadata),
            _ => None,
        }
    }

    /// True when this type, or an element type, is a pending recursive reference.
    pub(crate) fn has_recursive_reference(&self) -> bool {
        match &self.kind {
            WireKind::Struct(StructRef::Recursive(_)) => true,
            WireKind::List(element) | WireKind::Set(element) => element.has_recursive_reference(),
            WireKind::Map(key, value) => {
                key.has_recursive_reference() || value.has_recursive_reference()
            }
            _ => false,
        }
    }
}

impl PartialEq for WireType {
    fn eq(&self, other: &Self) -> bool {
        if self.native != other.native {
            return false;
        }
        match (&self.kind, &other.kind) {
            (WireKind::List(a), WireKind::List(b)) | (WireKind::Set(a), WireKind::Set(b)) => a == b,
            (WireKind::Map(ka, va), WireKind::Map(kb, vb)) => ka == kb && va == vb,
            (a, b) => mem::discriminant(a) == mem::discriminant(b),
        }
    }
}

impl Eq for WireType {}

impl Hash for WireType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.native.hash(state);
        mem::discriminant(&self.kind).hash(state);
        match &self.kind {
            WireKind::List(element) | WireKind::Set(element) => element.hash(state),
            WireKind::Map(key, value) => {
                key.hash(state);
                value.hash(state);
            }
            _ => {}
        }
    }
}

impl fmt::Debug for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WireKind::List(element) => write!(f, "list<{:?}>", element),
            WireKind::Set(element) => write!(f, "set<{:?}>", element),
            WireKind::Map(key, value) => write!(f, "map<{:?}, {:?}>", key, value),
            WireKind::Struct(_) | WireKind::Enum(_) => {
                write!(f, "{}({})", self.kind.name(), self.native)
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Reference from a STRUCT wire type to its metadata.
#[derive(Clone)]
pub enum StructRef {
    Resolved(Arc<StructMetadata>),
    Recursive(RecursiveTypeReference),
}

impl StructRef {
    pub fn get(&self) -> CodecResult<Arc<StructMetadata>> {
        match self {
            Self::Resolved(metadata) => Ok(metadata.clone()),
            Self::Recursive(reference) => reference.get(),
        }
    }
}

/// Forward reference to a struct whose metadata is still being built.
///
/// Resolves through the owning catalog once the enclosing build completes.
#[derive(Clone)]
pub struct RecursiveTypeReference {
    catalog: Weak<CatalogState>,
    key: TypeKey,
}

impl RecursiveTypeReference {
    pub(crate) fn new(catalog: Weak<CatalogState>, key: TypeKey) -> Self {
        Self { catalog, key }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn is_resolved(&self) -> bool {
        self.catalog
            .upgrade()
            .map(|catalog| catalog.cached_struct(&self.key).is_some())
            .unwrap_or(false)
    }

    pub fn get(&self) -> CodecResult<Arc<StructMetadata>> {
        let catalog = self.catalog.upgrade().ok_or_else(|| {
            CodecError::IllegalState(format!(
                "catalog owning recursive reference to {} was dropped",
                self.key
            ))
        })?;
        catalog.cached_struct(&self.key).ok_or_else(|| {
            CodecError::IllegalState(format!(
                "recursive reference to {} used before it was resolved",
                self.key
            ))
        })
    }
}

impl fmt::Debug for RecursiveTypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecursiveTypeReference({}, resolved={})",
            self.key,
            self.is_resolved()
        )
    }
}

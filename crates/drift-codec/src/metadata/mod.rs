// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type catalog and metadata.
//!
//! Maps native Rust types to wire type descriptors:
//!
//! - [`types`]: type identity ([`TypeKey`], [`TypeToken`]) and the [`Thrift`]
//!   trait every mappable type implements.
//! - [`definition`]: typed [`StructDef`] / [`FieldDef`] builders for structs
//!   and unions.
//! - [`catalog`]: the concurrent [`TypeCatalog`] validating definitions and
//!   caching resolved [`WireType`]s.

pub mod catalog;
pub mod coercion;
pub mod definition;
pub mod enums;
pub mod structs;
pub mod types;
pub mod wire_type;

pub use catalog::{LookupStats, TypeCatalog};
pub use coercion::TypeCoercion;
pub use definition::{FieldDef, StructDef, StructDefinition, UNION_ID_FIELD};
pub use enums::{enum_definition, enum_shape, EnumConstant, EnumDefinition, EnumMetadata, ThriftEnum};
pub use structs::{
    Args, BuilderMethod, ConstructorInjection, Extracted, Extraction, FieldAccess, FieldKind,
    FieldMetadata, Injection, MethodInjection, ParameterInjection, Requiredness, StructKind,
    StructMetadata,
};
pub use types::{
    downcast, downcast_ref, Binary, CollectionShape, DynValue, MapShape, Shape, Thrift, TypeKey,
    TypeToken, WrapperShape,
};
pub use wire_type::{RecursiveTypeReference, StructRef, WireKind, WireType};

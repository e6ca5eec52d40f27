// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Enum metadata: named constants carried on the wire as `i32`.

use super::types::{DynValue, Shape, TypeKey};
use crate::error::{CodecError, CodecResult};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A Rust enum mapped to a Thrift enum.
///
/// ```ignore
/// impl ThriftEnum for Fruit {
///     fn constants() -> Vec<(&'static str, Self)> {
///         vec![("APPLE", Fruit::Apple), ("BANANA", Fruit::Banana)]
///     }
///     fn value(&self) -> i32 { *self as i32 }
/// }
/// impl Thrift for Fruit {
///     fn shape() -> Shape { enum_shape::<Self>() }
/// }
/// ```
pub trait ThriftEnum: Any + Send + Sync + Copy {
    fn enum_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn constants() -> Vec<(&'static str, Self)>;

    fn value(&self) -> i32;

    /// Constant substituted for wire values with no matching constant.
    fn unknown() -> Option<Self> {
        None
    }
}

/// `Shape` of a [`ThriftEnum`].
pub fn enum_shape<T: ThriftEnum>() -> Shape {
    Shape::Enum(enum_definition::<T>)
}

fn enum_value_of<T: ThriftEnum>(value: &dyn Any) -> Option<i32> {
    value.downcast_ref::<T>().map(ThriftEnum::value)
}

/// Unvalidated enum description, produced by [`enum_shape`].
pub struct EnumDefinition {
    pub(crate) name: String,
    pub(crate) native: TypeKey,
    pub(crate) constants: Vec<EnumConstant>,
    pub(crate) unknown: Option<i32>,
    value_of: fn(&dyn Any) -> Option<i32>,
    instance: Arc<dyn Fn(usize) -> Option<DynValue> + Send + Sync>,
}

pub fn enum_definition<T: ThriftEnum>() -> EnumDefinition {
    let declared = T::constants();
    let constants = declared
        .iter()
        .map(|(name, constant)| EnumConstant {
            name: (*name).to_string(),
            value: constant.value(),
        })
        .collect();
    let instances: Vec<T> = declared.into_iter().map(|(_, constant)| constant).collect();
    EnumDefinition {
        name: T::enum_name().to_string(),
        native: TypeKey::of::<T>(),
        constants,
        unknown: T::unknown().map(|constant| constant.value()),
        value_of: enum_value_of::<T>,
        instance: Arc::new(move |index| {
            instances
                .get(index)
                .map(|constant| Box::new(*constant) as DynValue)
        }),
    }
}

/// One enum constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub value: i32,
}

/// Validated enum metadata.
pub struct EnumMetadata {
    name: String,
    native: TypeKey,
    constants: Vec<EnumConstant>,
    by_value: HashMap<i32, usize>,
    unknown: Option<usize>,
    value_of: fn(&dyn Any) -> Option<i32>,
    instance: Arc<dyn Fn(usize) -> Option<DynValue> + Send + Sync>,
}

impl EnumMetadata {
    pub(crate) fn from_definition(definition: EnumDefinition) -> CodecResult<Self> {
        if definition.constants.is_empty() {
            return Err(CodecError::invalid_metadata(format!(
                "enum {} has no constants",
                definition.name
            )));
        }

        let mut by_value = HashMap::with_capacity(definition.constants.len());
        for (index, constant) in definition.constants.iter().enumerate() {
            if let Some(previous) = by_value.insert(constant.value, index) {
                return Err(CodecError::invalid_metadata(format!(
                    "enum {} has duplicate value {} ({} and {})",
                    definition.name,
                    constant.value,
                    definition.constants[previous].name,
                    constant.name
                )));
            }
        }

        let unknown = match definition.unknown {
            Some(value) => Some(*by_value.get(&value).ok_or_else(|| {
                CodecError::invalid_metadata(format!(
                    "unknown constant of enum {} is not one of its constants",
                    definition.name
                ))
            })?),
            None => None,
        };

        Ok(Self {
            name: definition.name,
            native: definition.native,
            constants: definition.constants,
            by_value,
            unknown,
            value_of: definition.value_of,
            instance: definition.instance,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native(&self) -> TypeKey {
        self.native
    }

    pub fn constants(&self) -> &[EnumConstant] {
        &self.constants
    }

    pub fn unknown_constant(&self) -> Option<&EnumConstant> {
        self.unknown.map(|index| &self.constants[index])
    }

    /// Wire value of an enum instance.
    pub fn value_of(&self, value: &dyn Any) -> CodecResult<i32> {
        (self.value_of)(value).ok_or(CodecError::TypeMismatch {
            expected: self.native.name(),
        })
    }

    /// Instance for a wire value; the unknown constant when unmatched, if any.
    pub fn from_value(&self, value: i32) -> Option<DynValue> {
        let index = self.by_value.get(&value).copied().or(self.unknown)?;
        (self.instance)(index)
    }
}

impl fmt::Debug for EnumMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumMetadata")
            .field("name", &self.name)
            .field("constants", &self.constants)
            .field("unknown", &self.unknown_constant())
            .finish()
    }
}

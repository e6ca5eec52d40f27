// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native type identity and shape classification.
//!
//! Values cross the codec engine type-erased as [`DynValue`]. Every native
//! type the catalog can resolve is described by a [`TypeToken`]: its
//! [`TypeKey`] plus function pointers telling the catalog which [`Shape`] it
//! has and what its wire null value is.

use super::definition::StructDefinition;
use super::enums::EnumDefinition;
use crate::error::{CodecError, CodecResult};
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Owned type-erased value.
pub type DynValue = Box<dyn Any + Send>;

/// Unbox a [`DynValue`] into `T`.
pub fn downcast<T: Any>(value: DynValue) -> CodecResult<T> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| CodecError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

/// Borrow a type-erased value as `T`.
pub fn downcast_ref<T: Any>(value: &dyn Any) -> CodecResult<&T> {
    value.downcast_ref::<T>().ok_or(CodecError::TypeMismatch {
        expected: type_name::<T>(),
    })
}

/// Identity of a native type. Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when `value` is an instance of this type.
    pub fn matches(&self, value: &dyn Any) -> bool {
        value.type_id() == self.id
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A resolvable native type.
#[derive(Clone, Copy)]
pub struct TypeToken {
    key: TypeKey,
    shape: fn() -> Shape,
    null_value: fn() -> Option<DynValue>,
}

fn null_of<T: Thrift>() -> Option<DynValue> {
    T::null_value().map(|value| Box::new(value) as DynValue)
}

fn opaque_shape() -> Shape {
    Shape::Opaque
}

fn no_null() -> Option<DynValue> {
    None
}

impl TypeToken {
    pub fn of<T: Thrift>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            shape: T::shape,
            null_value: null_of::<T>,
        }
    }

    /// Token for a type with no intrinsic shape, resolvable only through a
    /// coercion or a custom codec.
    pub fn opaque<T: Any + Send>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            shape: opaque_shape,
            null_value: no_null,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn shape(&self) -> Shape {
        (self.shape)()
    }

    /// Value injected into constructor parameters when the field is absent.
    pub fn null_value(&self) -> Option<DynValue> {
        (self.null_value)()
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeToken").field(&self.key).finish()
    }
}

/// Raw bytes carried as a Thrift `binary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Binary(pub Vec<u8>);

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// How the catalog should treat a native type.
#[derive(Clone, Copy)]
pub enum Shape {
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
    Enum(fn() -> EnumDefinition),
    List(CollectionShape),
    Set(CollectionShape),
    Map(MapShape),
    /// Transparent wrapper (`Option`, `Box`, `Arc`).
    Wrapped(WrapperShape),
    /// Struct or union.
    Struct(fn() -> StructDefinition),
    Opaque,
}

impl Shape {
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
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Wrapped(_) => "wrapper",
            Self::Struct(_) => "struct",
            Self::Opaque => "opaque",
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element access for lists and sets.
#[derive(Clone, Copy)]
pub struct CollectionShape {
    pub element: TypeToken,
    pub elements: fn(&dyn Any) -> Option<Vec<&dyn Any>>,
    pub collect: fn(Vec<DynValue>) -> CodecResult<DynValue>,
}

/// Entry access for maps.
#[derive(Clone, Copy)]
pub struct MapShape {
    pub key: TypeToken,
    pub value: TypeToken,
    pub entries: fn(&dyn Any) -> Option<Vec<(&dyn Any, &dyn Any)>>,
    pub collect: fn(Vec<(DynValue, DynValue)>) -> CodecResult<DynValue>,
}

/// Access to the value inside a wrapper.
#[derive(Clone, Copy)]
pub struct WrapperShape {
    pub inner: TypeToken,
    /// `None` when the wrapper holds nothing (an empty `Option`).
    pub unwrap: fn(&dyn Any) -> Option<&dyn Any>,
    pub wrap: fn(DynValue) -> CodecResult<DynValue>,
}

/// A native type the catalog can map to a wire type.
///
/// Implemented here for primitives, `String`, [`Binary`], `()`, `Option`,
/// `Box`, `Arc`, `Vec`, sets and maps. Application structs, unions and enums
/// implement it by returning [`Shape::Struct`] or [`Shape::Enum`].
pub trait Thrift: Any + Send + Sized {
    fn shape() -> Shape;

    /// Wire null value: what an absent field decodes to when it must be passed
    /// to a constructor anyway.
    fn null_value() -> Option<Self> {
        None
    }
}

macro_rules! impl_primitive {
    ($type:ty, $shape:ident) => {
        impl Thrift for $type {
            fn shape() -> Shape {
                Shape::$shape
            }

            fn null_value() -> Option<Self> {
                Some(<$type>::default())
            }
        }
    };
}

impl_primitive!(bool, Bool);
impl_primitive!(i8, Byte);
impl_primitive!(i16, I16);
impl_primitive!(i32, I32);
impl_primitive!(i64, I64);
impl_primitive!(f64, Double);
impl_primitive!(f32, Float);

impl Thrift for String {
    fn shape() -> Shape {
        Shape::String
    }
}

impl Thrift for Binary {
    fn shape() -> Shape {
        Shape::Binary
    }
}

impl Thrift for () {
    fn shape() -> Shape {
        Shape::Void
    }

    fn null_value() -> Option<Self> {
        Some(())
    }
}

fn option_unwrap<T: Any>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<Option<T>>()
        .and_then(Option::as_ref)
        .map(|inner| inner as &dyn Any)
}

fn option_wrap<T: Any + Send>(value: DynValue) -> CodecResult<DynValue> {
    Ok(Box::new(Some(downcast::<T>(value)?)))
}

impl<T: Thrift> Thrift for Option<T> {
    fn shape() -> Shape {
        Shape::Wrapped(WrapperShape {
            inner: TypeToken::of::<T>(),
            unwrap: option_unwrap::<T>,
            wrap: option_wrap::<T>,
        })
    }

    fn null_value() -> Option<Self> {
        Some(None)
    }
}

fn box_unwrap<T: Any>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<Box<T>>()
        .map(|inner| &**inner as &dyn Any)
}

fn box_wrap<T: Any + Send>(value: DynValue) -> CodecResult<DynValue> {
    Ok(Box::new(Box::new(downcast::<T>(value)?)))
}

impl<T: Thrift> Thrift for Box<T> {
    fn shape() -> Shape {
        Shape::Wrapped(WrapperShape {
            inner: TypeToken::of::<T>(),
            unwrap: box_unwrap::<T>,
            wrap: box_wrap::<T>,
        })
    }
}

fn arc_unwrap<T: Any + Send + Sync>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<Arc<T>>()
        .map(|inner| &**inner as &dyn Any)
}

fn arc_wrap<T: Any + Send + Sync>(value: DynValue) -> CodecResult<DynValue> {
    Ok(Box::new(Arc::new(downcast::<T>(value)?)))
}

impl<T: Thrift + Sync> Thrift for Arc<T> {
    fn shape() -> Shape {
        Shape::Wrapped(WrapperShape {
            inner: TypeToken::of::<T>(),
            unwrap: arc_unwrap::<T>,
            wrap: arc_wrap::<T>,
        })
    }
}

fn vec_elements<T: Any>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<Vec<T>>()
        .map(|items| items.iter().map(|item| item as &dyn Any).collect())
}

fn vec_collect<T: Any + Send>(items: Vec<DynValue>) -> CodecResult<DynValue> {
    let values = items
        .into_iter()
        .map(downcast::<T>)
        .collect::<CodecResult<Vec<T>>>()?;
    Ok(Box::new(values))
}

impl<T: Thrift> Thrift for Vec<T> {
    fn shape() -> Shape {
        Shape::List(CollectionShape {
            element: TypeToken::of::<T>(),
            elements: vec_elements::<T>,
            collect: vec_collect::<T>,
        })
    }
}

fn hash_set_elements<T: Any + Eq + Hash>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<HashSet<T>>()
        .map(|items| items.iter().map(|item| item as &dyn Any).collect())
}

fn hash_set_collect<T: Any + Send + Eq + Hash>(items: Vec<DynValue>) -> CodecResult<DynValue> {
    let values = items
        .into_iter()
        .map(downcast::<T>)
        .collect::<CodecResult<HashSet<T>>>()?;
    Ok(Box::new(values))
}

impl<T: Thrift + Eq + Hash> Thrift for HashSet<T> {
    fn shape() -> Shape {
        Shape::Set(CollectionShape {
            element: TypeToken::of::<T>(),
            elements: hash_set_elements::<T>,
            collect: hash_set_collect::<T>,
        })
    }
}

fn btree_set_elements<T: Any + Ord>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<BTreeSet<T>>()
        .map(|items| items.iter().map(|item| item as &dyn Any).collect())
}

fn btree_set_collect<T: Any + Send + Ord>(items: Vec<DynValue>) -> CodecResult<DynValue> {
    let values = items
        .into_iter()
        .map(downcast::<T>)
        .collect::<CodecResult<BTreeSet<T>>>()?;
    Ok(Box::new(values))
}

impl<T: Thrift + Ord> Thrift for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::Set(CollectionShape {
            element: TypeToken::of::<T>(),
            elements: btree_set_elements::<T>,
            collect: btree_set_collect::<T>,
        })
    }
}

fn unpack_entry<K: Any, V: Any>((key, value): (DynValue, DynValue)) -> CodecResult<(K, V)> {
    Ok((downcast::<K>(key)?, downcast::<V>(value)?))
}

fn hash_map_entries<K: Any + Eq + Hash, V: Any>(
    value: &dyn Any,
) -> Option<Vec<(&dyn Any, &dyn Any)>> {
    value.downcast_ref::<HashMap<K, V>>().map(|map| {
        map.iter()
            .map(|(k, v)| (k as &dyn Any, v as &dyn Any))
            .collect()
    })
}

fn hash_map_collect<K: Any + Send + Eq + Hash, V: Any + Send>(
    entries: Vec<(DynValue, DynValue)>,
) -> CodecResult<DynValue> {
    let map = entries
        .into_iter()
        .map(unpack_entry::<K, V>)
        .collect::<CodecResult<HashMap<K, V>>>()?;
    Ok(Box::new(map))
}

impl<K: Thrift + Eq + Hash, V: Thrift> Thrift for HashMap<K, V> {
    fn shape() -> Shape {
        Shape::Map(MapShape {
            key: TypeToken::of::<K>(),
            value: TypeToken::of::<V>(),
            entries: hash_map_entries::<K, V>,
            collect: hash_map_collect::<K, V>,
        })
    }
}

fn btree_map_entries<K: Any + Ord, V: Any>(value: &dyn Any) -> Option<Vec<(&dyn Any, &dyn Any)>> {
    value.downcast_ref::<BTreeMap<K, V>>().map(|map| {
        map.iter()
            .map(|(k, v)| (k as &dyn Any, v as &dyn Any))
            .collect()
    })
}

fn btree_map_collect<K: Any + Send + Ord, V: Any + Send>(
    entries: Vec<(DynValue, DynValue)>,
) -> CodecResult<DynValue> {
    let map = entries
        .into_iter()
        .map(unpack_entry::<K, V>)
        .collect::<CodecResult<BTreeMap<K, V>>>()?;
    Ok(Box::new(map))
}

impl<K: Thrift + Ord, V: Thrift> Thrift for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Map(MapShape {
            key: TypeToken::of::<K>(),
            value: TypeToken::of::<V>(),
            entries: btree_map_entries::<K, V>,
            collect: btree_map_collect::<K, V>,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<i32>(), TypeKey::of::<i32>());
        assert_ne!(TypeKey::of::<i32>(), TypeKey::of::<Option<i32>>());
        assert!(TypeKey::of::<Vec<String>>().name().contains("Vec"));
        let boxed: DynValue = Box::new(5i32);
        assert!(TypeKey::of::<i32>().matches(&*boxed));
    }

    #[test]
    fn test_null_values() {
        let zero = TypeToken::of::<i64>().null_value().unwrap();
        assert_eq!(downcast::<i64>(zero).unwrap(), 0);
        let empty = TypeToken::of::<Option<String>>().null_value().unwrap();
        assert_eq!(downcast::<Option<String>>(empty).unwrap(), None);
        assert!(TypeToken::of::<String>().null_value().is_none());
        assert!(TypeToken::opaque::<std::time::Duration>().null_value().is_none());
    }

    #[test]
    fn test_wrapper_shape_unwrap() {
        let Shape::Wrapped(shape) = Option::<i32>::shape() else {
            panic!("expected wrapper shape");
        };
        assert!((shape.unwrap)(&None::<i32>).is_none());
        let some = Some(7i32);
        let inner = (shape.unwrap)(&some).unwrap();
        assert_eq!(inner.downcast_ref::<i32>(), Some(&7));
        let wrapped = (shape.wrap)(Box::new(3i32)).unwrap();
        assert_eq!(downcast::<Option<i32>>(wrapped).unwrap(), Some(3));
    }

    #[test]
    fn test_collection_shape_roundtrip() {
        let Shape::List(shape) = Vec::<i16>::shape() else {
            panic!("expected list shape");
        };
        let items = vec![1i16, 2, 3];
        assert_eq!((shape.elements)(&items).unwrap().len(), 3);
        let collected = (shape.collect)(vec![Box::new(4i16) as DynValue, Box::new(5i16)]).unwrap();
        assert_eq!(downcast::<Vec<i16>>(collected).unwrap(), vec![4, 5]);
        assert!((shape.collect)(vec![Box::new("x") as DynValue]).is_err());
    }

    #[test]
    fn test_downcast_mismatch() {
        let value: DynValue = Box::new(1u8);
        assert!(matches!(
            downcast::<i32>(value),
            Err(CodecError::TypeMismatch { expected: "i32" })
        ));
    }
}

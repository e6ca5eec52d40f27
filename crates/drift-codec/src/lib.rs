// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # drift-codec - Thrift struct/union codec engine
//!
//! Maps Rust types to the Thrift binary and compact wire formats.
//!
//! ## Quick Start
//!
//! ```rust
//! use drift_codec::{CodecManager, FieldDef, Protocol, Shape, StructDef, Thrift};
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     label: Option<String>,
//! }
//!
//! impl Thrift for Point {
//!     fn shape() -> Shape {
//!         Shape::Struct(|| {
//!             StructDef::<Point>::new("Point")
//!                 .constructor(&[1, 2], |args| {
//!                     Ok(Point { x: args.require(0)?, label: args.require(1)? })
//!                 })
//!                 .field(FieldDef::new(1, "x").required().get(|p: &Point| &p.x))
//!                 .field(FieldDef::new(2, "label").get(|p: &Point| &p.label))
//!                 .build()
//!         })
//!     }
//! }
//!
//! let codecs = CodecManager::new();
//! let point = Point { x: 3, label: None };
//! let bytes = codecs.encode(&point, Protocol::Compact).unwrap();
//! assert_eq!(codecs.decode::<Point>(&bytes, Protocol::Compact).unwrap(), point);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  CodecManager: codec cache, typed encode/decode             |
//! +-------------------------------------------------------------+
//! |  codec: struct | union | enum | collections | wrappers      |
//! +-------------------------------------------------------------+
//! |  metadata: TypeCatalog -> WireType / StructMetadata         |
//! +-------------------------------------------------------------+
//! |  protocol: FieldReader/FieldWriter, binary | compact        |
//! +-------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`metadata`] - type catalog, struct/union/enum metadata, coercions
//! - [`codec`] - codecs and the [`CodecManager`]
//! - [`protocol`] - wire protocols and field sequencing
//! - [`error`] - [`CodecError`]

pub mod codec;
pub mod error;
pub mod metadata;
pub mod protocol;

pub use codec::{Codec, CodecManager};
pub use error::{CodecError, CodecResult};
pub use metadata::{
    enum_shape, Args, Binary, DynValue, FieldDef, Shape, StructDef, Thrift, ThriftEnum,
    TypeCatalog, TypeKey, TypeToken, WireType,
};
pub use protocol::{MessageHeader, MessageType, Protocol, ProtocolRead, ProtocolType, ProtocolWrite};

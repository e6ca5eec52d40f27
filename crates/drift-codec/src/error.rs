// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for metadata resolution and encoding/decoding.

use std::fmt;

/// Result type for codec and catalog operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised by the type catalog, the codec engine and the protocols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Malformed or unexpected wire data.
    Protocol(String),

    /// A REQUIRED field was absent on the wire or decoded to nothing.
    RequiredFieldMissing { struct_name: String, field: String, id: i16 },

    /// A union payload carried more than one field.
    MultipleUnionValues { union_name: String, first: i16, second: i16 },

    /// A builder method returned nothing, or an instance of the wrong type.
    BuilderContractViolation(String),

    /// The union discriminant points at a field that cannot be extracted.
    NotReadableField { struct_name: String, field: String },

    /// The type cannot be mapped to a wire type.
    UnsupportedType(String),

    /// Struct or enum metadata failed validation.
    InvalidMetadata(String),

    /// A value handed to a codec was not of the native type it was built for.
    TypeMismatch { expected: &'static str },

    /// Internal invariant broken (e.g. a forward reference used before resolution).
    IllegalState(String),
}

impl CodecError {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an unsupported type error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// True for errors caused by the bytes on the wire rather than by local metadata.
    pub fn is_wire_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::RequiredFieldMissing { .. } | Self::MultipleUnionValues { .. }
        )
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::RequiredFieldMissing {
                struct_name,
                field,
                id,
            } => write!(
                f,
                "required field '{}' (id {}) of {} was not set",
                field, id, struct_name
            ),
            Self::MultipleUnionValues {
                union_name,
                first,
                second,
            } => write!(
                f,
                "received union {} with more than one value (seen id {}, now id {})",
                union_name, first, second
            ),
            Self::BuilderContractViolation(msg) => write!(f, "builder contract violated: {}", msg),
            Self::NotReadableField { struct_name, field } => {
                write!(f, "field '{}' of {} is not readable", field, struct_name)
            }
            Self::UnsupportedType(msg) => write!(f, "unsupported type: {}", msg),
            Self::InvalidMetadata(msg) => write!(f, "invalid metadata: {}", msg),
            Self::TypeMismatch { expected } => {
                write!(f, "type mismatch: expected a value of type {}", expected)
            }
            Self::IllegalState(msg) => write!(f, "illegal state: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<std::string::FromUtf8Error> for CodecError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::Protocol(format!("invalid UTF-8 in string: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        let err = CodecError::RequiredFieldMissing {
            struct_name: "Point".into(),
            field: "x".into(),
            id: 1,
        };
        assert_eq!(err.to_string(), "required field 'x' (id 1) of Point was not set");

        let err = CodecError::MultipleUnionValues {
            union_name: "Shape".into(),
            first: 1,
            second: 2,
        };
        assert_eq!(
            err.to_string(),
            "received union Shape with more than one value (seen id 1, now id 2)"
        );
    }

    #[test]
    fn test_wire_error_classification() {
        assert!(CodecError::protocol("bad").is_wire_error());
        assert!(!CodecError::unsupported("Foo").is_wire_error());
        assert!(!CodecError::TypeMismatch { expected: "i32" }.is_wire_error());
    }

    #[test]
    fn test_utf8_error_maps_to_protocol() {
        let bad = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(CodecError::from(bad), CodecError::Protocol(_)));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Method metadata and per-attempt invocation requests.

use crate::address::Address;
use drift_codec::metadata::WireKind;
use drift_codec::{Codec, CodecError, CodecManager, CodecResult, Thrift};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A call argument. Shared so every retry attempt can re-encode it.
pub type ParameterValue = Arc<dyn Any + Send + Sync>;

/// Per-call headers handed to the transport.
pub type Headers = HashMap<String, String>;

/// One method parameter: written as field `id` of the `<method>_args` struct.
#[derive(Clone)]
pub struct ParameterMetadata {
    pub name: String,
    pub id: i16,
    pub codec: Arc<dyn Codec>,
}

impl fmt::Debug for ParameterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterMetadata")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A declared exception: decoded from field `id` of the `<method>_result` struct.
#[derive(Clone)]
pub struct ExceptionMetadata {
    pub id: i16,
    pub codec: Arc<dyn Codec>,
    /// Retry hint; `None` leaves the decision to the classifier.
    pub retryable: Option<bool>,
    render: fn(&dyn Any) -> String,
}

impl ExceptionMetadata {
    pub fn render(&self, value: &dyn Any) -> String {
        (self.render)(value)
    }
}

impl fmt::Debug for ExceptionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionMetadata")
            .field("id", &self.id)
            .field("retryable", &self.retryable)
            .finish_non_exhaustive()
    }
}

fn render_exception<E: fmt::Display + 'static>(value: &dyn Any) -> String {
    match value.downcast_ref::<E>() {
        Some(exception) => exception.to_string(),
        None => format!("<{}>", std::any::type_name::<E>()),
    }
}

/// Everything needed to call one service method. Built once, shared by all calls.
pub struct MethodMetadata {
    name: String,
    parameters: Vec<ParameterMetadata>,
    result_codec: Arc<dyn Codec>,
    exceptions: BTreeMap<i16, ExceptionMetadata>,
    oneway: bool,
    idempotent: bool,
}

impl MethodMetadata {
    pub fn builder(name: impl Into<String>, codecs: &CodecManager) -> MethodMetadataBuilder {
        MethodMetadataBuilder {
            name: name.into(),
            codecs: codecs.clone(),
            parameters: Vec::new(),
            result: None,
            exceptions: BTreeMap::new(),
            oneway: false,
            idempotent: false,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterMetadata] {
        &self.parameters
    }

    pub fn result_codec(&self) -> &Arc<dyn Codec> {
        &self.result_codec
    }

    /// True if the method returns nothing.
    pub fn is_void(&self) -> bool {
        matches!(
            self.result_codec.wire_type().map(|t| t.kind().clone()),
            Ok(WireKind::Void)
        )
    }

    pub fn exception(&self, id: i16) -> Option<&ExceptionMetadata> {
        self.exceptions.get(&id)
    }

    pub fn exceptions(&self) -> impl Iterator<Item = &ExceptionMetadata> {
        self.exceptions.values()
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    /// Safe to re-send after the request may have reached the server.
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }
}

impl fmt::Debug for MethodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMetadata")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("exceptions", &self.exceptions.keys().collect::<Vec<_>>())
            .field("oneway", &self.oneway)
            .field("idempotent", &self.idempotent)
            .finish()
    }
}

/// Builder for [`MethodMetadata`]. Codec lookup failures surface from [`build`](Self::build).
pub struct MethodMetadataBuilder {
    name: String,
    codecs: CodecManager,
    parameters: Vec<ParameterMetadata>,
    result: Option<Arc<dyn Codec>>,
    exceptions: BTreeMap<i16, ExceptionMetadata>,
    oneway: bool,
    idempotent: bool,
    error: Option<CodecError>,
}

impl MethodMetadataBuilder {
    fn resolve<T: Thrift>(&mut self) -> Option<Arc<dyn Codec>> {
        match self.codecs.codec_for::<T>() {
            Ok(codec) => Some(codec),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    /// Append a parameter of type `T`.
    pub fn parameter<T: Thrift>(mut self, id: i16, name: impl Into<String>) -> Self {
        if let Some(codec) = self.resolve::<T>() {
            self.parameters.push(ParameterMetadata {
                name: name.into(),
                id,
                codec,
            });
        }
        self
    }

    /// Append a parameter encoded with an explicit codec.
    pub fn parameter_with(mut self, id: i16, name: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        self.parameters.push(ParameterMetadata {
            name: name.into(),
            id,
            codec,
        });
        self
    }

    /// Result type; methods without one return `()`.
    pub fn result<T: Thrift>(mut self) -> Self {
        self.result = self.resolve::<T>();
        self
    }

    /// Declare exception `E` as field `id` of the result struct.
    pub fn exception<E: Thrift + fmt::Display>(self, id: i16) -> Self {
        self.exception_with_hint::<E>(id, None)
    }

    /// Declare exception `E` together with a retry hint.
    pub fn retryable_exception<E: Thrift + fmt::Display>(self, id: i16, retryable: bool) -> Self {
        self.exception_with_hint::<E>(id, Some(retryable))
    }

    fn exception_with_hint<E: Thrift + fmt::Display>(mut self, id: i16, retryable: Option<bool>) -> Self {
        if let Some(codec) = self.resolve::<E>() {
            self.exceptions.insert(
                id,
                ExceptionMetadata {
                    id,
                    codec,
                    retryable,
                    render: render_exception::<E>,
                },
            );
        }
        self
    }

    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn build(mut self) -> CodecResult<Arc<MethodMetadata>> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let result_codec = match self.result.take() {
            Some(codec) => codec,
            None => self.codecs.codec_for::<()>()?,
        };
        let mut ids: Vec<i16> = self.parameters.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(CodecError::invalid_metadata(format!(
                "method {} has duplicate parameter ids",
                self.name
            )));
        }
        if self.exceptions.contains_key(&0) {
            return Err(CodecError::invalid_metadata(format!(
                "method {} declares an exception with id 0, reserved for the result",
                self.name
            )));
        }
        let method = MethodMetadata {
            name: self.name,
            parameters: self.parameters,
            result_codec,
            exceptions: self.exceptions,
            oneway: self.oneway,
            idempotent: self.idempotent,
        };
        if method.oneway && (!method.is_void() || !method.exceptions.is_empty()) {
            return Err(CodecError::invalid_metadata(format!(
                "oneway method {} must return void and declare no exceptions",
                method.name
            )));
        }
        log::debug!(
            "[client] method {} built ({} parameters, {} exceptions)",
            method.name,
            method.parameters.len(),
            method.exceptions.len()
        );
        Ok(Arc::new(method))
    }
}

/// One attempt of one call: method, target address, arguments and headers.
#[derive(Clone)]
pub struct InvokeRequest {
    method: Arc<MethodMetadata>,
    address: Address,
    parameters: Vec<ParameterValue>,
    headers: Headers,
}

impl InvokeRequest {
    pub fn new(
        method: Arc<MethodMetadata>,
        address: Address,
        parameters: Vec<ParameterValue>,
        headers: Headers,
    ) -> Self {
        Self {
            method,
            address,
            parameters,
            headers,
        }
    }

    pub fn method(&self) -> &Arc<MethodMetadata> {
        &self.method
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn parameters(&self) -> &[ParameterValue] {
        &self.parameters
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl fmt::Debug for InvokeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeRequest")
            .field("method", &self.method.name)
            .field("address", &self.address)
            .field("parameters", &self.parameters.len())
            .field("headers", &self.headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_void() {
        let codecs = CodecManager::new();
        let method = MethodMetadata::builder("ping", &codecs).build().unwrap();
        assert_eq!(method.name(), "ping");
        assert!(method.is_void());
        assert!(method.parameters().is_empty());
        assert!(!method.is_oneway());
        assert!(!method.is_idempotent());
    }

    #[test]
    fn test_builder_collects_parameters_and_exceptions() {
        let codecs = CodecManager::new();
        let method = MethodMetadata::builder("lookup", &codecs)
            .parameter::<String>(1, "key")
            .parameter::<Option<i32>>(2, "limit")
            .result::<Vec<String>>()
            .retryable_exception::<String>(1, true)
            .idempotent()
            .build()
            .unwrap();
        assert!(!method.is_void());
        assert_eq!(method.parameters().len(), 2);
        assert_eq!(method.parameters()[1].name, "limit");
        let exception = method.exception(1).unwrap();
        assert_eq!(exception.retryable, Some(true));
        assert_eq!(exception.render(&"boom".to_string()), "boom");
        assert!(exception.render(&7u8).starts_with('<'));
        assert!(method.is_idempotent());
    }

    #[test]
    fn test_builder_rejects_invalid_methods() {
        let codecs = CodecManager::new();
        let err = MethodMetadata::builder("dup", &codecs)
            .parameter::<i32>(1, "a")
            .parameter::<i32>(1, "b")
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidMetadata(_)));

        let err = MethodMetadata::builder("fire", &codecs)
            .result::<i32>()
            .oneway()
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidMetadata(_)));

        let err = MethodMetadata::builder("reserved", &codecs)
            .exception::<String>(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidMetadata(_)));
    }

    #[test]
    fn test_builder_reports_unsupported_types() {
        struct Handle;
        impl Thrift for Handle {
            fn shape() -> drift_codec::Shape {
                drift_codec::Shape::Opaque
            }
        }

        let codecs = CodecManager::new();
        let err = MethodMetadata::builder("open", &codecs)
            .parameter::<String>(1, "path")
            .parameter::<Handle>(2, "handle")
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType(_)), "{}", err);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Struct codec driven by [`StructMetadata`].
//!
//! Reading collects every present field value, then builds the instance in
//! four steps: constructor, field and setter injections, method injections,
//! builder method. A decoded value is handed to the first of these steps
//! that takes its field.

use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{
    Args, DynValue, FieldKind, FieldMetadata, ParameterInjection, StructMetadata, WireType,
};
use crate::protocol::{FieldReader, FieldWriter, ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::Arc;

pub struct StructCodec {
    wire_type: WireType,
    metadata: Arc<StructMetadata>,
    /// One codec per entry of `metadata.fields`.
    fields: Vec<Arc<dyn Codec>>,
}

impl StructCodec {
    pub fn new(
        wire_type: WireType,
        metadata: Arc<StructMetadata>,
        fields: Vec<Arc<dyn Codec>>,
    ) -> CodecResult<Self> {
        check_field_codecs(&metadata, &fields)?;
        Ok(Self {
            wire_type,
            metadata,
            fields,
        })
    }

    pub fn metadata(&self) -> &Arc<StructMetadata> {
        &self.metadata
    }

    fn construct(&self, mut values: Vec<Option<DynValue>>) -> CodecResult<DynValue> {
        let metadata = &*self.metadata;
        let constructor = metadata.constructor.as_ref().ok_or_else(|| {
            CodecError::IllegalState(format!("{} has no constructor", metadata.name))
        })?;

        let mut args = arguments(metadata, &constructor.parameters, &mut values, true);
        let mut instance = (constructor.construct)(&mut args)?;

        for (field, value) in metadata.fields.iter().zip(values.iter_mut()) {
            if let Some(inject) = field.injections.iter().find_map(|i| i.injector()) {
                if let Some(value) = value.take() {
                    inject(&mut *instance, value)?;
                }
            }
        }

        for method in &metadata.method_injections {
            let present = method
                .parameters
                .iter()
                .any(|parameter| is_present(metadata, &values, parameter.id));
            if !present {
                continue;
            }
            let mut args = arguments(metadata, &method.parameters, &mut values, false);
            (method.invoke)(&mut *instance, &mut args)?;
        }

        match &metadata.builder {
            Some(builder) => {
                let mut args = arguments(metadata, &builder.parameters, &mut values, false);
                let built = (builder.build)(instance, &mut args)?;
                check_built(metadata, built)
            }
            None => Ok(instance),
        }
    }
}

impl Codec for StructCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        let metadata = &*self.metadata;
        let mut values: Vec<Option<DynValue>> = metadata.fields.iter().map(|_| None).collect();

        let mut reader = FieldReader::new(protocol);
        reader.read_struct_begin()?;
        while reader.next_field()? {
            let Some(index) = readable_field(metadata, reader.field_id()) else {
                reader.skip_field_data()?;
                continue;
            };
            let field = &metadata.fields[index];
            match reader.read_field(&*self.fields[index])? {
                Some(value) => values[index] = Some(value),
                None if field.is_required() => return Err(missing(metadata, field)),
                None => {}
            }
        }
        reader.read_struct_end()?;

        let absent = metadata
            .fields
            .iter()
            .zip(&values)
            .find(|(field, value)| {
                field.is_required() && is_read(field) && value.is_none()
            });
        if let Some((field, _)) = absent {
            return Err(missing(metadata, field));
        }

        self.construct(values).map(Some)
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        let metadata = &*self.metadata;
        if !metadata.native.matches(value) {
            return Err(CodecError::TypeMismatch {
                expected: metadata.native.name(),
            });
        }

        let mut writer = FieldWriter::new(protocol);
        writer.write_struct_begin(&metadata.name)?;
        for (field, codec) in metadata.fields.iter().zip(&self.fields) {
            if field.kind != FieldKind::Data {
                continue;
            }
            let Some(extraction) = &field.extraction else {
                continue;
            };
            if let Some(extracted) = extraction.extract(value) {
                writer.write_field(&field.name, field.id, &**codec, extracted.as_any())?;
            }
        }
        writer.write_struct_end()
    }
}

pub(crate) fn check_field_codecs(
    metadata: &StructMetadata,
    fields: &[Arc<dyn Codec>],
) -> CodecResult<()> {
    if fields.len() != metadata.fields.len() {
        return Err(CodecError::IllegalState(format!(
            "{} has {} fields but {} codecs",
            metadata.name,
            metadata.fields.len(),
            fields.len()
        )));
    }
    Ok(())
}

/// Data fields with at least one way into the instance are decoded; all
/// others are skipped.
fn is_read(field: &FieldMetadata) -> bool {
    field.kind == FieldKind::Data && field.is_injectable()
}

pub(crate) fn readable_field(metadata: &StructMetadata, id: i16) -> Option<usize> {
    metadata
        .fields
        .iter()
        .position(|field| field.id == id && is_read(field))
}

pub(crate) fn missing(metadata: &StructMetadata, field: &FieldMetadata) -> CodecError {
    CodecError::RequiredFieldMissing {
        struct_name: metadata.name.clone(),
        field: field.name.clone(),
        id: field.id,
    }
}

fn position(metadata: &StructMetadata, id: i16) -> Option<usize> {
    metadata
        .fields
        .iter()
        .position(|field| field.id == id && field.kind == FieldKind::Data)
}

fn is_present(metadata: &StructMetadata, values: &[Option<DynValue>], id: i16) -> bool {
    position(metadata, id)
        .and_then(|index| values.get(index))
        .map(Option::is_some)
        .unwrap_or(false)
}

/// Take the values of `parameters` out of `values`.
///
/// With `null_fallback`, absent parameters receive their field's wire null
/// value.
pub(crate) fn arguments<'m>(
    metadata: &'m StructMetadata,
    parameters: &'m [ParameterInjection],
    values: &mut [Option<DynValue>],
    null_fallback: bool,
) -> Args<'m> {
    let slots = parameters
        .iter()
        .map(|parameter| {
            let index = position(metadata, parameter.id)?;
            let value = values.get_mut(index).and_then(Option::take);
            if value.is_none() && null_fallback {
                return metadata.fields[index].token.null_value();
            }
            value
        })
        .collect();
    Args::new(&metadata.name, parameters, slots)
}

/// A builder method must return an instance of the struct's native type.
pub(crate) fn check_built(
    metadata: &StructMetadata,
    built: Option<DynValue>,
) -> CodecResult<DynValue> {
    match built {
        Some(instance) if metadata.native.matches(&*instance) => Ok(instance),
        Some(_) => Err(CodecError::BuilderContractViolation(format!(
            "builder method of {} returned an instance of another type, {} is required",
            metadata.name, metadata.native
        ))),
        None => Err(CodecError::BuilderContractViolation(format!(
            "builder method of {} returned no instance",
            metadata.name
        ))),
    }
}

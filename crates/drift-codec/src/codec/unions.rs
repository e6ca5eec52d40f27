// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Union codec: a struct carrying at most one field, selected by the union's
//! discriminant.

use super::structs::{arguments, check_built, check_field_codecs, readable_field};
use super::Codec;
use crate::error::{CodecError, CodecResult};
use crate::metadata::{Args, DynValue, FieldKind, FieldMetadata, StructMetadata, WireType};
use crate::protocol::{FieldReader, FieldWriter, ProtocolRead, ProtocolWrite};
use std::any::Any;
use std::sync::Arc;

pub struct UnionCodec {
    wire_type: WireType,
    metadata: Arc<StructMetadata>,
    fields: Vec<Arc<dyn Codec>>,
}

impl UnionCodec {
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

    /// Instance from the no-argument constructor, if the union has one.
    fn construct_empty(&self) -> CodecResult<Option<DynValue>> {
        let metadata = &*self.metadata;
        match &metadata.constructor {
            Some(constructor) => {
                let mut args = Args::new(&metadata.name, &constructor.parameters, Vec::new());
                (constructor.construct)(&mut args).map(Some)
            }
            None => Ok(None),
        }
    }

    fn construct(&self, index: usize, value: DynValue) -> CodecResult<DynValue> {
        let metadata = &*self.metadata;
        let field = &metadata.fields[index];

        let (mut instance, leftover) = match &field.union_constructor {
            Some(construct) => (construct(value)?, None),
            None => {
                let mut instance = self.construct_empty()?.ok_or_else(|| {
                    CodecError::IllegalState(format!(
                        "union {} cannot construct field '{}'",
                        metadata.name, field.name
                    ))
                })?;
                match field.injections.iter().find_map(|i| i.injector()) {
                    Some(inject) => {
                        inject(&mut *instance, value)?;
                        (instance, None)
                    }
                    None => (instance, Some(value)),
                }
            }
        };

        if let Some(discriminant) = metadata.union_id_field() {
            if let Some(inject) = discriminant.injections.iter().find_map(|i| i.injector()) {
                inject(&mut *instance, Box::new(field.id) as DynValue)?;
            }
        }

        self.finish(instance, Some((index, leftover)))
    }

    /// Run the builder method, if any, with the occupied field's value.
    fn finish(
        &self,
        instance: DynValue,
        occupied: Option<(usize, Option<DynValue>)>,
    ) -> CodecResult<DynValue> {
        let metadata = &*self.metadata;
        let Some(builder) = &metadata.builder else {
            return Ok(instance);
        };
        let mut values: Vec<Option<DynValue>> = metadata.fields.iter().map(|_| None).collect();
        if let Some((index, value)) = occupied {
            values[index] = value;
        }
        let mut args = arguments(metadata, &builder.parameters, &mut values, false);
        let built = (builder.build)(instance, &mut args)?;
        check_built(metadata, built)
    }

    fn data_field(&self, id: i16) -> Option<(&FieldMetadata, &Arc<dyn Codec>)> {
        self.metadata
            .fields
            .iter()
            .zip(&self.fields)
            .find(|(field, _)| field.id == id && field.kind == FieldKind::Data)
    }
}

impl Codec for UnionCodec {
    fn wire_type(&self) -> CodecResult<WireType> {
        Ok(self.wire_type.clone())
    }

    fn read(&self, protocol: &mut dyn ProtocolRead) -> CodecResult<Option<DynValue>> {
        let metadata = &*self.metadata;
        let mut first: Option<i16> = None;
        let mut occupied: Option<(usize, DynValue)> = None;

        let mut reader = FieldReader::new(protocol);
        reader.read_struct_begin()?;
        while reader.next_field()? {
            let id = reader.field_id();
            if let Some(first) = first {
                return Err(CodecError::MultipleUnionValues {
                    union_name: metadata.name.clone(),
                    first,
                    second: id,
                });
            }
            first = Some(id);

            let Some(index) = readable_field(metadata, id) else {
                reader.skip_field_data()?;
                continue;
            };
            if let Some(value) = reader.read_field(&*self.fields[index])? {
                occupied = Some((index, value));
            }
        }
        reader.read_struct_end()?;

        match occupied {
            Some((index, value)) => self.construct(index, value).map(Some),
            None => match self.construct_empty()? {
                Some(instance) => self.finish(instance, None).map(Some),
                None => Ok(None),
            },
        }
    }

    fn write(&self, value: &dyn Any, protocol: &mut dyn ProtocolWrite) -> CodecResult<()> {
        let metadata = &*self.metadata;
        if !metadata.native.matches(value) {
            return Err(CodecError::TypeMismatch {
                expected: metadata.native.name(),
            });
        }
        let id = discriminant(metadata, value)?;

        let mut writer = FieldWriter::new(protocol);
        writer.write_struct_begin(&metadata.name)?;
        match self.data_field(id) {
            Some((field, codec)) => {
                let extraction =
                    field
                        .extraction
                        .as_ref()
                        .ok_or_else(|| CodecError::NotReadableField {
                            struct_name: metadata.name.clone(),
                            field: field.name.clone(),
                        })?;
                if let Some(extracted) = extraction.extract(value) {
                    writer.write_field(&field.name, field.id, &**codec, extracted.as_any())?;
                }
            }
            None => log::debug!(
                "[codec] union {} holds unknown field id {}; writing it empty",
                metadata.name,
                id
            ),
        }
        writer.write_struct_end()
    }
}

fn discriminant(metadata: &StructMetadata, value: &dyn Any) -> CodecResult<i16> {
    let field = metadata.union_id_field().ok_or_else(|| {
        CodecError::IllegalState(format!("union {} has no discriminant", metadata.name))
    })?;
    let extracted = field
        .extraction
        .as_ref()
        .and_then(|extraction| extraction.extract(value))
        .ok_or_else(|| CodecError::NotReadableField {
            struct_name: metadata.name.clone(),
            field: field.name.clone(),
        })?;
    extracted
        .as_any()
        .downcast_ref::<i16>()
        .copied()
        .ok_or(CodecError::TypeMismatch { expected: "i16" })
}

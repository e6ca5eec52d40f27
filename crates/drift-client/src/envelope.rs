// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message envelopes: `<method>_args` calls and `<method>_result` replies.
//!
//! The client half ([`write_call`], [`read_reply`]) is what the dispatcher
//! sends and expects. The server half ([`read_call`], [`write_reply`],
//! [`write_exception_reply`], [`write_application_exception`]) mirrors it for
//! in-process transports and tests.
//!
//! ```text
//! call   := message(name, CALL|ONEWAY, seq) struct{ id_i: param_i ... }
//! reply  := message(name, REPLY, seq)       struct{ 0: result | id: exception }
//!         | message(name, EXCEPTION, seq)   struct{ 1: message, 2: kind }
//! ```

use crate::error::{
    ApplicationException, ApplicationExceptionKind, DriftApplicationException, DriftError,
    DriftResult,
};
use crate::method::{MethodMetadata, ParameterValue};
use drift_codec::protocol::{FieldReader, FieldWriter};
use drift_codec::{
    CodecError, CodecResult, DynValue, MessageHeader, MessageType, Protocol, ProtocolRead,
    ProtocolType, ProtocolWrite,
};
use std::any::Any;

/// Field id of the success value in a `<method>_result` struct.
pub const RESULT_FIELD_ID: i16 = 0;

fn encode(
    protocol: Protocol,
    header: &MessageHeader,
    body: impl FnOnce(&mut dyn ProtocolWrite) -> CodecResult<()>,
) -> DriftResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut writer = protocol.writer(&mut out);
        writer.write_message_begin(header)?;
        body(&mut *writer)?;
        writer.write_message_end()?;
    }
    Ok(out)
}

/// Encode a CALL (or ONEWAY) message for `method`.
pub fn write_call(
    protocol: Protocol,
    method: &MethodMetadata,
    sequence_id: i32,
    parameters: &[ParameterValue],
) -> DriftResult<Vec<u8>> {
    if parameters.len() != method.parameters().len() {
        return Err(CodecError::IllegalState(format!(
            "method {} takes {} parameters, {} given",
            method.name(),
            method.parameters().len(),
            parameters.len()
        ))
        .into());
    }
    let message_type = if method.is_oneway() {
        MessageType::Oneway
    } else {
        MessageType::Call
    };
    let header = MessageHeader::new(method.name(), message_type, sequence_id);
    encode(protocol, &header, |writer| {
        let mut fields = FieldWriter::new(writer);
        fields.write_struct_begin(&format!("{}_args", method.name()))?;
        for (parameter, value) in method.parameters().iter().zip(parameters) {
            fields.write_field(&parameter.name, parameter.id, parameter.codec.as_ref(), &**value)?;
        }
        fields.write_struct_end()
    })
}

/// Decode the reply to call `sequence_id` of `method`.
///
/// Returns `Ok(None)` for void methods.
pub fn read_reply(
    protocol: Protocol,
    method: &MethodMetadata,
    sequence_id: i32,
    bytes: &[u8],
) -> DriftResult<Option<DynValue>> {
    let mut reader = protocol.reader(bytes);
    let header = reader.read_message_begin()?;
    match header.message_type {
        MessageType::Exception => {
            let exception = read_application_exception(&mut *reader)?;
            reader.read_message_end()?;
            return Err(DriftError::ApplicationException(exception));
        }
        MessageType::Reply => {}
        other => {
            return Err(DriftError::Protocol(format!(
                "received invalid message type {:?} from server",
                other
            )));
        }
    }
    if header.name != method.name() {
        return Err(DriftError::Protocol(format!(
            "wrong method name in reply: expected {} but received {}",
            method.name(),
            header.name
        )));
    }
    if header.sequence_id != sequence_id {
        return Err(DriftError::Protocol(format!(
            "{} failed: out of sequence response (expected {}, received {})",
            method.name(),
            sequence_id,
            header.sequence_id
        )));
    }

    let mut result = None;
    let mut exception = None;
    {
        let mut fields = FieldReader::new(&mut *reader);
        fields.read_struct_begin()?;
        while fields.next_field()? {
            let id = fields.field_id();
            if id == RESULT_FIELD_ID {
                result = fields.read_field(method.result_codec().as_ref())?;
            } else if let Some(declared) = method.exception(id) {
                if let Some(value) = fields.read_field(declared.codec.as_ref())? {
                    let rendering = declared.render(&*value);
                    exception = Some(DriftApplicationException::new(
                        id,
                        value,
                        rendering,
                        declared.retryable,
                    ));
                }
            } else {
                log::debug!(
                    "[dispatcher] {} reply: skipping undeclared field {}",
                    method.name(),
                    id
                );
                fields.skip_field_data()?;
            }
        }
        fields.read_struct_end()?;
    }
    reader.read_message_end()?;

    if let Some(exception) = exception {
        return Err(DriftError::Application(exception));
    }
    if method.is_void() {
        return Ok(None);
    }
    match result {
        Some(value) => Ok(Some(value)),
        None => Err(DriftError::Protocol(format!(
            "{} failed: unknown result",
            method.name()
        ))),
    }
}

fn read_application_exception(reader: &mut dyn ProtocolRead) -> CodecResult<ApplicationException> {
    let mut fields = FieldReader::new(reader);
    let mut exception = ApplicationException {
        kind: ApplicationExceptionKind::Unknown,
        message: None,
    };
    fields.read_struct_begin()?;
    while fields.next_field()? {
        match (fields.field_id(), fields.field_kind()) {
            (1, ProtocolType::String) => {
                exception.message = Some(fields.protocol().read_string()?);
                fields.protocol().read_field_end()?;
            }
            (2, ProtocolType::I32) => {
                exception.kind = ApplicationExceptionKind::from_i32(fields.protocol().read_i32()?);
                fields.protocol().read_field_end()?;
            }
            _ => fields.skip_field_data()?,
        }
    }
    fields.read_struct_end()?;
    Ok(exception)
}

/// Read only the envelope header, e.g. to route a call by method name.
pub fn read_message_header(protocol: Protocol, bytes: &[u8]) -> DriftResult<MessageHeader> {
    let mut reader = protocol.reader(bytes);
    Ok(reader.read_message_begin()?)
}

/// A decoded call, as seen by the server.
pub struct IncomingCall {
    pub header: MessageHeader,
    /// One slot per declared parameter, in declaration order. `None` if absent.
    pub arguments: Vec<Option<DynValue>>,
}

impl IncomingCall {
    pub fn sequence_id(&self) -> i32 {
        self.header.sequence_id
    }

    /// Take argument `index` as a `T`.
    pub fn take<T: Any>(&mut self, index: usize) -> DriftResult<Option<T>> {
        match self.arguments.get_mut(index).and_then(Option::take) {
            Some(value) => Ok(Some(drift_codec::metadata::downcast::<T>(value)?)),
            None => Ok(None),
        }
    }
}

/// Decode a CALL or ONEWAY message for `method`. Unknown fields are skipped.
pub fn read_call(protocol: Protocol, method: &MethodMetadata, bytes: &[u8]) -> DriftResult<IncomingCall> {
    let mut reader = protocol.reader(bytes);
    let header = reader.read_message_begin()?;
    if !matches!(header.message_type, MessageType::Call | MessageType::Oneway) {
        return Err(DriftError::Protocol(format!(
            "expected a call, received {:?}",
            header.message_type
        )));
    }
    if header.name != method.name() {
        return Err(DriftError::Protocol(format!(
            "call for {} routed to {}",
            header.name,
            method.name()
        )));
    }

    let mut arguments: Vec<Option<DynValue>> = method.parameters().iter().map(|_| None).collect();
    {
        let mut fields = FieldReader::new(&mut *reader);
        fields.read_struct_begin()?;
        while fields.next_field()? {
            let id = fields.field_id();
            match method.parameters().iter().position(|p| p.id == id) {
                Some(index) => {
                    arguments[index] = fields.read_field(method.parameters()[index].codec.as_ref())?;
                }
                None => fields.skip_field_data()?,
            }
        }
        fields.read_struct_end()?;
    }
    reader.read_message_end()?;
    Ok(IncomingCall { header, arguments })
}

fn reply_header(method: &MethodMetadata, sequence_id: i32) -> MessageHeader {
    MessageHeader::new(method.name(), MessageType::Reply, sequence_id)
}

/// Encode a successful reply. `result` is ignored for void methods.
pub fn write_reply(
    protocol: Protocol,
    method: &MethodMetadata,
    sequence_id: i32,
    result: Option<&dyn Any>,
) -> DriftResult<Vec<u8>> {
    let void = method.is_void();
    encode(protocol, &reply_header(method, sequence_id), |writer| {
        let mut fields = FieldWriter::new(writer);
        fields.write_struct_begin(&format!("{}_result", method.name()))?;
        if let Some(value) = result.filter(|_| !void) {
            fields.write_field("success", RESULT_FIELD_ID, method.result_codec().as_ref(), value)?;
        }
        fields.write_struct_end()
    })
}

/// Encode a reply carrying declared exception `id`.
pub fn write_exception_reply(
    protocol: Protocol,
    method: &MethodMetadata,
    sequence_id: i32,
    id: i16,
    exception: &dyn Any,
) -> DriftResult<Vec<u8>> {
    let declared = method.exception(id).ok_or_else(|| {
        CodecError::IllegalState(format!(
            "method {} declares no exception with id {}",
            method.name(),
            id
        ))
    })?;
    encode(protocol, &reply_header(method, sequence_id), |writer| {
        let mut fields = FieldWriter::new(writer);
        fields.write_struct_begin(&format!("{}_result", method.name()))?;
        fields.write_field("exception", id, declared.codec.as_ref(), exception)?;
        fields.write_struct_end()
    })
}

/// Encode an EXCEPTION message.
pub fn write_application_exception(
    protocol: Protocol,
    method_name: &str,
    sequence_id: i32,
    exception: &ApplicationException,
) -> DriftResult<Vec<u8>> {
    let header = MessageHeader::new(method_name, MessageType::Exception, sequence_id);
    encode(protocol, &header, |writer| {
        writer.write_struct_begin("TApplicationException")?;
        if let Some(message) = &exception.message {
            writer.write_field_begin("message", ProtocolType::String, 1)?;
            writer.write_string(message)?;
            writer.write_field_end()?;
        }
        writer.write_field_begin("type", ProtocolType::I32, 2)?;
        writer.write_i32(exception.kind.as_i32())?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_codec::CodecManager;
    use std::sync::Arc;

    const PROTOCOLS: [Protocol; 2] = [Protocol::Binary, Protocol::Compact];

    fn lookup(codecs: &CodecManager) -> Arc<MethodMetadata> {
        MethodMetadata::builder("lookup", codecs)
            .parameter::<String>(1, "key")
            .parameter::<Option<i32>>(3, "limit")
            .result::<Vec<i64>>()
            .exception::<String>(1)
            .build()
            .unwrap()
    }

    fn args(key: &str, limit: Option<i32>) -> Vec<ParameterValue> {
        vec![Arc::new(key.to_string()), Arc::new(limit)]
    }

    #[test]
    fn test_call_roundtrip() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        for protocol in PROTOCOLS {
            let bytes = write_call(protocol, &method, 7, &args("k", Some(3))).unwrap();
            let header = read_message_header(protocol, &bytes).unwrap();
            assert_eq!(header, MessageHeader::new("lookup", MessageType::Call, 7));

            let mut call = read_call(protocol, &method, &bytes).unwrap();
            assert_eq!(call.sequence_id(), 7);
            assert_eq!(call.take::<String>(0).unwrap(), Some("k".to_string()));
            assert_eq!(call.take::<Option<i32>>(1).unwrap(), Some(Some(3)));
        }
    }

    #[test]
    fn test_absent_optional_parameter() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        let bytes = write_call(Protocol::Binary, &method, 1, &args("k", None)).unwrap();
        let mut call = read_call(Protocol::Binary, &method, &bytes).unwrap();
        assert_eq!(call.take::<Option<i32>>(1).unwrap(), None);
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        let err = write_call(Protocol::Binary, &method, 1, &[]).unwrap_err();
        assert!(matches!(err, DriftError::Codec(CodecError::IllegalState(_))));
    }

    #[test]
    fn test_reply_roundtrip() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        for protocol in PROTOCOLS {
            let values = vec![1i64, -2, 3];
            let bytes = write_reply(protocol, &method, 9, Some(&values)).unwrap();
            let result = read_reply(protocol, &method, 9, &bytes).unwrap().unwrap();
            assert_eq!(*result.downcast::<Vec<i64>>().unwrap(), values);
        }
    }

    #[test]
    fn test_reply_validation() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        let other = MethodMetadata::builder("other", &codecs)
            .result::<Vec<i64>>()
            .build()
            .unwrap();

        let bytes = write_reply(Protocol::Binary, &method, 9, Some(&vec![1i64])).unwrap();
        let err = read_reply(Protocol::Binary, &method, 10, &bytes).unwrap_err();
        assert!(err.to_string().contains("out of sequence"), "{}", err);

        let err = read_reply(Protocol::Binary, &other, 9, &bytes).unwrap_err();
        assert!(err.to_string().contains("wrong method name"), "{}", err);

        let call = write_call(Protocol::Binary, &method, 9, &args("k", None)).unwrap();
        let err = read_reply(Protocol::Binary, &method, 9, &call).unwrap_err();
        assert!(err.to_string().contains("invalid message type"), "{}", err);

        let empty = write_reply(Protocol::Binary, &method, 9, None).unwrap();
        let err = read_reply(Protocol::Binary, &method, 9, &empty).unwrap_err();
        assert!(err.to_string().contains("unknown result"), "{}", err);
    }

    #[test]
    fn test_void_reply() {
        let codecs = CodecManager::new();
        let ping = MethodMetadata::builder("ping", &codecs).build().unwrap();
        let bytes = write_reply(Protocol::Compact, &ping, 1, Some(&())).unwrap();
        assert!(read_reply(Protocol::Compact, &ping, 1, &bytes).unwrap().is_none());
    }

    #[test]
    fn test_declared_exception() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        let bytes =
            write_exception_reply(Protocol::Binary, &method, 4, 1, &"not found".to_string()).unwrap();
        match read_reply(Protocol::Binary, &method, 4, &bytes).unwrap_err() {
            DriftError::Application(e) => {
                assert_eq!(e.field_id(), 1);
                assert_eq!(e.rendering(), "not found");
                assert_eq!(e.downcast_ref::<String>().map(String::as_str), Some("not found"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(write_exception_reply(Protocol::Binary, &method, 4, 2, &()).is_err());
    }

    #[test]
    fn test_undeclared_reply_fields_are_skipped() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        let wider = MethodMetadata::builder("lookup", &codecs)
            .result::<Vec<i64>>()
            .exception::<String>(1)
            .exception::<i32>(2)
            .build()
            .unwrap();
        let bytes = write_exception_reply(Protocol::Binary, &wider, 4, 2, &5i32).unwrap();
        // field 2 is unknown to `method`, and no result was sent
        let err = read_reply(Protocol::Binary, &method, 4, &bytes).unwrap_err();
        assert!(err.to_string().contains("unknown result"), "{}", err);
    }

    #[test]
    fn test_application_exception() {
        let codecs = CodecManager::new();
        let method = lookup(&codecs);
        for protocol in PROTOCOLS {
            let exception =
                ApplicationException::new(ApplicationExceptionKind::UnknownMethod, "lookup?");
            let bytes = write_application_exception(protocol, "lookup", 3, &exception).unwrap();
            match read_reply(protocol, &method, 3, &bytes).unwrap_err() {
                DriftError::ApplicationException(e) => assert_eq!(e, exception),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_oneway_call_type() {
        let codecs = CodecManager::new();
        let notify = MethodMetadata::builder("notify", &codecs)
            .parameter::<i32>(1, "code")
            .oneway()
            .build()
            .unwrap();
        let params: Vec<ParameterValue> = vec![Arc::new(5i32)];
        let bytes = write_call(Protocol::Compact, &notify, 2, &params).unwrap();
        let header = read_message_header(Protocol::Compact, &bytes).unwrap();
        assert_eq!(header.message_type, MessageType::Oneway);
        assert!(read_call(Protocol::Compact, &notify, &bytes).is_ok());
    }
}

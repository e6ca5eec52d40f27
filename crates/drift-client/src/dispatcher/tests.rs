// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatcher tests over in-memory connections.

use super::*;
use crate::address::Address;
use crate::envelope;
use crate::error::{ApplicationException, ApplicationExceptionKind};
use crate::method::{Headers, MethodMetadata, ParameterValue};
use crate::transport::mock::{MockConnectionFactory, MockReply};
use drift_codec::{CodecManager, MessageType};

const PROTOCOL: Protocol = Protocol::Compact;

fn add_method(codecs: &CodecManager) -> Arc<MethodMetadata> {
    MethodMetadata::builder("add", codecs)
        .parameter::<i32>(1, "a")
        .parameter::<i32>(2, "b")
        .result::<i64>()
        .exception::<String>(1)
        .build()
        .unwrap()
}

/// Server answering `add` calls; a negative `a` raises the declared exception.
fn add_server(method: Arc<MethodMetadata>) -> MockConnectionFactory {
    MockConnectionFactory::new(move |_, message| {
        let mut call = envelope::read_call(PROTOCOL, &method, message).unwrap();
        let a = call.take::<i32>(0).unwrap().unwrap_or_default();
        let b = call.take::<i32>(1).unwrap().unwrap_or_default();
        let reply = if a < 0 {
            envelope::write_exception_reply(
                PROTOCOL,
                &method,
                call.sequence_id(),
                1,
                &format!("negative operand {}", a),
            )
        } else {
            let sum = i64::from(a) + i64::from(b);
            envelope::write_reply(PROTOCOL, &method, call.sequence_id(), Some(&sum))
        };
        MockReply::Message(reply.unwrap())
    })
}

fn request(method: &Arc<MethodMetadata>, address: &Address, a: i32, b: i32) -> InvokeRequest {
    let parameters: Vec<ParameterValue> = vec![Arc::new(a), Arc::new(b)];
    InvokeRequest::new(method.clone(), address.clone(), parameters, Headers::new())
}

fn address() -> Address {
    Address::new("svc", 9090)
}

#[tokio::test]
async fn test_invoke_success() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let dispatcher = Dispatcher::new(Arc::new(add_server(method.clone())), PROTOCOL);

    let result = dispatcher.invoke(request(&method, &address(), 2, 40)).await.unwrap();
    assert_eq!(*result.unwrap().downcast::<i64>().unwrap(), 42);
}

#[tokio::test]
async fn test_sequence_ids_increase() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let factory = Arc::new(add_server(method.clone()));
    let dispatcher = Dispatcher::new(factory.clone(), PROTOCOL);

    for _ in 0..3 {
        dispatcher.invoke(request(&method, &address(), 1, 1)).await.unwrap();
    }
    let ids: Vec<i32> = factory
        .sent()
        .iter()
        .map(|sent| envelope::read_message_header(PROTOCOL, &sent.message).unwrap().sequence_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_declared_exception() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let dispatcher = Dispatcher::new(Arc::new(add_server(method.clone())), PROTOCOL);

    match dispatcher.invoke(request(&method, &address(), -1, 0)).await {
        Err(DriftError::Application(e)) => {
            assert_eq!(e.field_id(), 1);
            assert_eq!(e.rendering(), "negative operand -1");
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_server_application_exception() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let factory = MockConnectionFactory::new(|_, message| {
        let header = envelope::read_message_header(PROTOCOL, message).unwrap();
        let exception = ApplicationException::new(ApplicationExceptionKind::UnknownMethod, "nope");
        MockReply::Message(
            envelope::write_application_exception(PROTOCOL, &header.name, header.sequence_id, &exception)
                .unwrap(),
        )
    });
    let dispatcher = Dispatcher::new(Arc::new(factory), PROTOCOL);

    match dispatcher.invoke(request(&method, &address(), 1, 2)).await {
        Err(DriftError::ApplicationException(e)) => {
            assert_eq!(e.kind, ApplicationExceptionKind::UnknownMethod);
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_out_of_sequence_reply() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let server_method = method.clone();
    let factory = MockConnectionFactory::new(move |_, message| {
        let header = envelope::read_message_header(PROTOCOL, message).unwrap();
        MockReply::Message(
            envelope::write_reply(PROTOCOL, &server_method, header.sequence_id + 100, Some(&1i64))
                .unwrap(),
        )
    });
    let dispatcher = Dispatcher::new(Arc::new(factory), PROTOCOL);

    let err = dispatcher.invoke(request(&method, &address(), 1, 2)).await.unwrap_err();
    assert!(matches!(err, DriftError::Protocol(_)), "{}", err);
}

#[tokio::test]
async fn test_connection_refused() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let factory = add_server(method.clone());
    factory.refuse(address());
    let dispatcher = Dispatcher::new(Arc::new(factory), PROTOCOL);

    let err = dispatcher.invoke(request(&method, &address(), 1, 2)).await.unwrap_err();
    match err {
        DriftError::ConnectionFailed { address: failed, .. } => assert_eq!(failed, address()),
        other => panic!("unexpected {}", other),
    }
}

#[tokio::test]
async fn test_request_timeout() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let factory = MockConnectionFactory::new(|_, _| MockReply::Hang);
    let dispatcher = Dispatcher::new(Arc::new(factory), PROTOCOL)
        .with_request_timeout(Duration::from_millis(30));

    let err = dispatcher.invoke(request(&method, &address(), 1, 2)).await.unwrap_err();
    assert!(matches!(err, DriftError::Timeout(t) if t == Duration::from_millis(30)), "{}", err);
}

#[tokio::test]
async fn test_connection_reset() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let factory = MockConnectionFactory::new(|_, _| MockReply::Reset);
    let dispatcher = Dispatcher::new(Arc::new(factory), PROTOCOL);

    let err = dispatcher.invoke(request(&method, &address(), 1, 2)).await.unwrap_err();
    assert!(matches!(err, DriftError::Transport(_)), "{}", err);
}

#[tokio::test]
async fn test_oneway_does_not_wait() {
    let codecs = CodecManager::new();
    let notify = MethodMetadata::builder("notify", &codecs)
        .parameter::<String>(1, "event")
        .oneway()
        .build()
        .unwrap();
    let factory = Arc::new(MockConnectionFactory::new(|_, _| MockReply::Hang));
    let dispatcher = Dispatcher::new(factory.clone(), PROTOCOL)
        .with_request_timeout(Duration::from_secs(30));

    let mut headers = Headers::new();
    headers.insert("trace-id".into(), "abc".into());
    let parameters: Vec<ParameterValue> = vec![Arc::new("started".to_string())];
    let request = InvokeRequest::new(notify, address(), parameters, headers);
    assert!(dispatcher.invoke(request).await.unwrap().is_none());

    let sent = factory.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].headers.get("trace-id").map(String::as_str), Some("abc"));
    let header = envelope::read_message_header(PROTOCOL, &sent[0].message).unwrap();
    assert_eq!(header.message_type, MessageType::Oneway);
}

#[tokio::test]
async fn test_encoding_failure_sends_nothing() {
    let codecs = CodecManager::new();
    let method = add_method(&codecs);
    let factory = Arc::new(add_server(method.clone()));
    let dispatcher = Dispatcher::new(factory.clone(), PROTOCOL);

    let parameters: Vec<ParameterValue> = vec![Arc::new("not an i32".to_string()), Arc::new(1i32)];
    let err = dispatcher
        .invoke(InvokeRequest::new(method, address(), parameters, Headers::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, DriftError::Codec(_)), "{}", err);
    assert!(factory.sent().is_empty());
}

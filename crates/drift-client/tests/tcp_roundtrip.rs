// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// End-to-end calls over real loopback sockets.

#![allow(clippy::missing_panics_doc)]

use drift_client::envelope;
use drift_client::transport::{read_frame, write_frame};
use drift_client::{
    ClientConfig, DriftClient, DriftError, Headers, MethodMetadata, ParameterValue, RetryConfig,
};
use drift_codec::{CodecManager, FieldDef, Protocol, Shape, StructDef, Thrift};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

const MAX_FRAME: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: i64,
    items: Vec<String>,
}

impl Thrift for Order {
    fn shape() -> Shape {
        Shape::Struct(|| {
            StructDef::<Order>::new("Order")
                .constructor(&[1, 2], |args| {
                    Ok(Order {
                        id: args.require(0)?,
                        items: args.require(1)?,
                    })
                })
                .field(FieldDef::new(1, "id").required().get(|o: &Order| &o.id))
                .field(FieldDef::new(2, "items").required().get(|o: &Order| &o.items))
                .build()
        })
    }
}

fn count_items(codecs: &CodecManager) -> Arc<MethodMetadata> {
    MethodMetadata::builder("countItems", codecs)
        .parameter::<Order>(1, "order")
        .result::<i32>()
        .exception::<String>(1)
        .idempotent()
        .build()
        .unwrap()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serve `countItems` until the listener is dropped. Returns the bound
/// address and a counter of accepted connections.
async fn start_server(protocol: Protocol, method: Arc<MethodMetadata>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve(stream, protocol, method.clone()));
        }
    });
    (address, accepted)
}

async fn serve(mut stream: TcpStream, protocol: Protocol, method: Arc<MethodMetadata>) {
    while let Ok(message) = read_frame(&mut stream, MAX_FRAME).await {
        let mut call = envelope::read_call(protocol, &method, &message).unwrap();
        let order: Order = call.take(0).unwrap().unwrap();
        let reply = if order.items.is_empty() {
            let reason = format!("order {} is empty", order.id);
            envelope::write_exception_reply(protocol, &method, call.sequence_id(), 1, &reason)
        } else {
            let count = order.items.len() as i32;
            envelope::write_reply(protocol, &method, call.sequence_id(), Some(&count))
        };
        if write_frame(&mut stream, &reply.unwrap(), MAX_FRAME).await.is_err() {
            return;
        }
    }
}

/// Distinct addresses with nothing listening on them.
async fn refused_addresses(count: usize) -> Vec<String> {
    let mut listeners = Vec::new();
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    listeners
        .iter()
        .map(|listener| listener.local_addr().unwrap().to_string())
        .collect()
}

fn order(id: i64, items: &[&str]) -> Vec<ParameterValue> {
    vec![Arc::new(Order {
        id,
        items: items.iter().map(|s| (*s).to_string()).collect(),
    })]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_over_tcp_both_protocols() {
    init_logging();
    for protocol in [Protocol::Binary, Protocol::Compact] {
        let codecs = CodecManager::new();
        let method = count_items(&codecs);
        let (address, _) = start_server(protocol, method.clone()).await;

        let config = ClientConfig::default()
            .with_address(address)
            .with_protocol(protocol);
        let client = DriftClient::from_config(&config).unwrap();

        let count: i32 = client.call(&method, order(7, &["a", "b", "c"])).await.unwrap();
        assert_eq!(count, 3, "{}", protocol);
        assert_eq!(client.stats("countItems").unwrap().successes, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_declared_exception_is_not_retried() {
    init_logging();
    let codecs = CodecManager::new();
    let method = count_items(&codecs);
    let (address, accepted) = start_server(Protocol::Compact, method.clone()).await;

    let config = ClientConfig::default()
        .with_address(address)
        .with_protocol(Protocol::Compact);
    let client = DriftClient::from_config(&config).unwrap();

    let err = client
        .invoke(&method, order(9, &[]), Headers::new())
        .await
        .unwrap_err();
    match err {
        DriftError::NonRetryable { cause, stats } => {
            assert_eq!(stats.attempts, 1);
            match *cause {
                DriftError::Application(e) => {
                    assert_eq!(e.rendering(), "order 9 is empty");
                    assert_eq!(e.downcast_ref::<String>().unwrap(), "order 9 is empty");
                }
                other => panic!("unexpected cause {}", other),
            }
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retries_past_refused_address() {
    init_logging();
    let codecs = CodecManager::new();
    let method = count_items(&codecs);
    let (live, accepted) = start_server(Protocol::Binary, method.clone()).await;
    let dead = refused_addresses(1).await.remove(0);

    let config = ClientConfig::default()
        .with_address(dead)
        .with_address(live)
        .with_retry(RetryConfig::default().with_backoff(
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        ));
    let client = DriftClient::from_config(&config).unwrap();

    // either address may be picked first; the live one must answer every call
    for id in 0..8 {
        let count: i32 = client.call(&method, order(id, &["x"])).await.unwrap();
        assert_eq!(count, 1);
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 8);

    let stats = client.stats("countItems").unwrap();
    assert_eq!(stats.successes, 8);
    assert_eq!(stats.failures, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_all_addresses_refused() {
    init_logging();
    let codecs = CodecManager::new();
    let method = count_items(&codecs);

    let dead = refused_addresses(2).await;
    let config = ClientConfig::default()
        .with_address(dead[0].clone())
        .with_address(dead[1].clone())
        .with_retry(RetryConfig::default().with_backoff(Duration::ZERO, Duration::ZERO, 1.0));
    let client = DriftClient::from_config(&config).unwrap();

    let err = client
        .invoke(&method, order(1, &["x"]), Headers::new())
        .await
        .unwrap_err();
    match &err {
        DriftError::NoHostsAvailable { cause, stats } => {
            assert_eq!(stats.attempts, 2);
            assert_eq!(stats.connection_failures, 2);
            assert_eq!(stats.attempted_addresses.len(), 2);
            assert!(cause.as_deref().is_some_and(DriftError::is_connection_failure));
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(client.stats("countItems").unwrap().failures, 1);
}

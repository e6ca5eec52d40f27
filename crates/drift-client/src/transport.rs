// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seams and the framed TCP connector.
//!
//! - [`MethodInvoker`]: one attempt of one call, plus the retry delay source.
//! - [`ConnectionFactory`] / [`Connection`]: byte-level request/response
//!   exchange below the dispatcher.
//! - [`FramedTcpConnector`]: tokio sockets with a 4-byte big-endian length
//!   prefix per message.

use crate::address::Address;
use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{DriftError, DriftResult};
use crate::method::{Headers, InvokeRequest};
use async_trait::async_trait;
use drift_codec::DynValue;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Performs single attempts. The retry controller drives it.
#[async_trait]
pub trait MethodInvoker: Send + Sync {
    /// Run one attempt of `request` against `request.address()`.
    async fn invoke(&self, request: InvokeRequest) -> DriftResult<Option<DynValue>>;

    /// Wait before the next attempt.
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// An open connection carrying whole messages.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, message: Vec<u8>, headers: &Headers) -> DriftResult<()>;

    async fn receive(&mut self) -> DriftResult<Vec<u8>>;
}

/// Opens connections. Failures should be reported as
/// [`DriftError::ConnectionFailed`] so they are classified as never having
/// reached the server.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, address: &Address) -> DriftResult<Box<dyn Connection>>;
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin + ?Sized>(
    writer: &mut W,
    payload: &[u8],
    max_frame_size: usize,
) -> DriftResult<()> {
    if payload.len() > max_frame_size {
        return Err(DriftError::Transport(format!(
            "frame too large: {} > {}",
            payload.len(),
            max_frame_size
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| DriftError::Transport(format!("frame too large: {}", payload.len())))?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| DriftError::Transport(e.to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| DriftError::Transport(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| DriftError::Transport(e.to_string()))
}

/// Read one length-prefixed frame.
pub async fn read_frame<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    max_frame_size: usize,
) -> DriftResult<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DriftError::Transport("connection closed by peer".into())
        } else {
            DriftError::Transport(e.to_string())
        }
    })?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(DriftError::Transport("empty frame".into()));
    }
    if len > max_frame_size {
        return Err(DriftError::Transport(format!(
            "frame too large: {} > {}",
            len, max_frame_size
        )));
    }
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| DriftError::Transport(e.to_string()))?;
    Ok(payload)
}

/// Connects over TCP and exchanges length-prefixed frames.
#[derive(Debug, Clone)]
pub struct FramedTcpConnector {
    max_frame_size: usize,
}

impl Default for FramedTcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FramedTcpConnector {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

#[async_trait]
impl ConnectionFactory for FramedTcpConnector {
    async fn connect(&self, address: &Address) -> DriftResult<Box<dyn Connection>> {
        let stream = TcpStream::connect((address.host(), address.port()))
            .await
            .map_err(|e| DriftError::ConnectionFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[client] set_nodelay on {} failed: {}", address, e);
        }
        Ok(Box::new(FramedTcpConnection {
            stream,
            max_frame_size: self.max_frame_size,
        }))
    }
}

/// A connected framed TCP stream.
pub struct FramedTcpConnection {
    stream: TcpStream,
    max_frame_size: usize,
}

#[async_trait]
impl Connection for FramedTcpConnection {
    async fn send(&mut self, message: Vec<u8>, headers: &Headers) -> DriftResult<()> {
        if !headers.is_empty() {
            log::debug!(
                "[client] framed transport carries no headers; dropping {}",
                headers.len()
            );
        }
        write_frame(&mut self.stream, &message, self.max_frame_size).await
    }

    async fn receive(&mut self) -> DriftResult<Vec<u8>> {
        read_frame(&mut self.stream, self.max_frame_size).await
    }
}

// ============================================================================
// Test mock connections
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// What the mock server does with one request.
    pub enum MockReply {
        /// Answer with this message.
        Message(Vec<u8>),
        /// Never answer.
        Hang,
        /// Fail the receive with a transport error.
        Reset,
    }

    type Handler = dyn Fn(&Address, &[u8]) -> MockReply + Send + Sync;

    /// A request captured by [`MockConnectionFactory`].
    #[derive(Debug, Clone)]
    pub struct SentMessage {
        pub address: Address,
        pub message: Vec<u8>,
        pub headers: Headers,
    }

    /// In-memory connection factory.
    ///
    /// Provides:
    /// - A request handler standing in for the server
    /// - Refused addresses (connect fails)
    /// - Capture of every sent message
    pub struct MockConnectionFactory {
        handler: Arc<Handler>,
        refused: Mutex<HashSet<Address>>,
        sent: Arc<Mutex<Vec<SentMessage>>>,
    }

    impl MockConnectionFactory {
        pub fn new(handler: impl Fn(&Address, &[u8]) -> MockReply + Send + Sync + 'static) -> Self {
            Self {
                handler: Arc::new(handler),
                refused: Mutex::new(HashSet::new()),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Make connects to `address` fail.
        pub fn refuse(&self, address: Address) {
            self.refused.lock().insert(address);
        }

        pub fn sent(&self) -> Vec<SentMessage> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl ConnectionFactory for MockConnectionFactory {
        async fn connect(&self, address: &Address) -> DriftResult<Box<dyn Connection>> {
            if self.refused.lock().contains(address) {
                return Err(DriftError::ConnectionFailed {
                    address: address.clone(),
                    reason: "connection refused".into(),
                });
            }
            Ok(Box::new(MockConnection {
                address: address.clone(),
                handler: self.handler.clone(),
                sent: self.sent.clone(),
                pending: None,
            }))
        }
    }

    struct MockConnection {
        address: Address,
        handler: Arc<Handler>,
        sent: Arc<Mutex<Vec<SentMessage>>>,
        pending: Option<MockReply>,
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn send(&mut self, message: Vec<u8>, headers: &Headers) -> DriftResult<()> {
            self.pending = Some((self.handler)(&self.address, &message));
            self.sent.lock().push(SentMessage {
                address: self.address.clone(),
                message,
                headers: headers.clone(),
            });
            Ok(())
        }

        async fn receive(&mut self) -> DriftResult<Vec<u8>> {
            match self.pending.take() {
                Some(MockReply::Message(message)) => Ok(message),
                Some(MockReply::Hang) => std::future::pending().await,
                Some(MockReply::Reset) => Err(DriftError::Transport("connection reset".into())),
                None => Err(DriftError::Transport("receive before send".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, b"hello", 16).await.unwrap();
        assert_eq!(read_frame(&mut server, 16).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_frame_limits() {
        let (mut client, mut server) = tokio::io::duplex(64);
        assert!(write_frame(&mut client, &[0u8; 17], 16).await.is_err());

        client.write_all(&100u32.to_be_bytes()).await.unwrap();
        assert!(read_frame(&mut server, 16).await.is_err());

        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&0u32.to_be_bytes()).await.unwrap();
        assert!(read_frame(&mut server, 16).await.is_err());

        drop(client);
        assert!(read_frame(&mut server, 16).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_connection_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_frame(&mut stream, 1024).await.unwrap();
            let mut reply = request.clone();
            reply.reverse();
            write_frame(&mut stream, &reply, 1024).await.unwrap();
        });

        let connector = FramedTcpConnector::new(1024);
        let mut connection = connector
            .connect(&Address::new("127.0.0.1", port))
            .await
            .unwrap();
        connection.send(vec![1, 2, 3], &Headers::new()).await.unwrap();
        assert_eq!(connection.receive().await.unwrap(), vec![3, 2, 1]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_is_classified() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = FramedTcpConnector::default();
        let err = match connector.connect(&Address::new("127.0.0.1", port)).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };
        assert!(err.is_connection_failure(), "{}", err);
    }
}

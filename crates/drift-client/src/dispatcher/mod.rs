// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Invocation dispatcher: one attempt of one call against one address.
//!
//! ```text
//! connect(address) --timeout--> ConnectionFailed
//!   send(call envelope)
//!   oneway? -> done
//!   receive(reply) --timeout--> Timeout
//!   read_reply: EXCEPTION | type | name | seq | result | declared exception
//! ```

use crate::config::ClientConfig;
use crate::envelope;
use crate::error::{DriftError, DriftResult};
use crate::method::InvokeRequest;
use crate::transport::{ConnectionFactory, MethodInvoker};
use async_trait::async_trait;
use drift_codec::{DynValue, Protocol};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sends calls through a [`ConnectionFactory`], one connection per attempt.
pub struct Dispatcher {
    connections: Arc<dyn ConnectionFactory>,
    protocol: Protocol,
    connect_timeout: Duration,
    request_timeout: Duration,
    sequence: AtomicI32,
}

impl Dispatcher {
    pub fn new(connections: Arc<dyn ConnectionFactory>, protocol: Protocol) -> Self {
        let defaults = ClientConfig::default();
        Self {
            connections,
            protocol,
            connect_timeout: defaults.connect_timeout(),
            request_timeout: defaults.request_timeout(),
            sequence: AtomicI32::new(1),
        }
    }

    /// Dispatcher using the protocol and timeouts of `config`.
    pub fn from_config(connections: Arc<dyn ConnectionFactory>, config: &ClientConfig) -> Self {
        Self::new(connections, config.protocol)
            .with_connect_timeout(config.connect_timeout())
            .with_request_timeout(config.request_timeout())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn next_sequence_id(&self) -> i32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl MethodInvoker for Dispatcher {
    async fn invoke(&self, request: InvokeRequest) -> DriftResult<Option<DynValue>> {
        let method = request.method();
        let address = request.address();
        let sequence_id = self.next_sequence_id();
        let message = envelope::write_call(self.protocol, method, sequence_id, request.parameters())?;

        let connected = tokio::time::timeout(self.connect_timeout, self.connections.connect(address)).await;
        let mut connection = match connected {
            Ok(Ok(connection)) => connection,
            Ok(Err(e @ DriftError::ConnectionFailed { .. })) => return Err(e),
            Ok(Err(e)) => {
                return Err(DriftError::ConnectionFailed {
                    address: address.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(DriftError::ConnectionFailed {
                    address: address.clone(),
                    reason: format!("connect timed out after {:?}", self.connect_timeout),
                });
            }
        };

        log::debug!(
            "[dispatcher] {} seq {} -> {} ({} bytes)",
            method.name(),
            sequence_id,
            address,
            message.len()
        );

        let exchange = async {
            connection.send(message, request.headers()).await?;
            if method.is_oneway() {
                return Ok(None);
            }
            let reply = connection.receive().await?;
            envelope::read_reply(self.protocol, method, sequence_id, &reply)
        };
        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(DriftError::Timeout(self.request_timeout)),
        }
    }
}

#[cfg(test)]
mod tests;

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The client facade: retrying invocations over a shared dispatcher.

use crate::address::{Address, AddressSelector, SimpleAddressSelector};
use crate::classifier::{DefaultExceptionClassifier, ExceptionClassifier};
use crate::config::{ClientConfig, ConfigError, RetryConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{DriftError, DriftResult};
use crate::invocation::{MethodInvocation, RetryContext};
use crate::method::{Headers, MethodMetadata, ParameterValue};
use crate::stats::{InvocationStatsRegistry, StatsSnapshot};
use crate::transport::{FramedTcpConnector, MethodInvoker};
use drift_codec::metadata::downcast;
use drift_codec::DynValue;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// RPC client with retries, address selection and per-method stats.
///
/// # Example
///
/// ```rust,no_run
/// use drift_client::{ClientConfig, DriftClient, MethodMetadata};
/// use drift_codec::CodecManager;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::from_yaml("addresses: [\"127.0.0.1:9090\"]")?;
/// let client = DriftClient::from_config(&config)?;
///
/// let codecs = CodecManager::new();
/// let echo = MethodMetadata::builder("echo", &codecs)
///     .parameter::<String>(1, "text")
///     .result::<String>()
///     .idempotent()
///     .build()?;
///
/// let reply: String = client.call(&echo, vec![Arc::new("hi".to_string())]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DriftClient {
    context: RetryContext,
    stats: Arc<InvocationStatsRegistry>,
}

impl DriftClient {
    pub fn new(
        invoker: Arc<dyn MethodInvoker>,
        selector: Arc<dyn AddressSelector>,
        retry: RetryConfig,
    ) -> Result<Self, ConfigError> {
        retry.validate()?;
        Ok(Self {
            context: RetryContext {
                invoker,
                selector,
                classifier: Arc::new(DefaultExceptionClassifier),
                policy: retry,
            },
            stats: Arc::new(InvocationStatsRegistry::new()),
        })
    }

    /// Client over framed TCP to the configured addresses.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let addresses: Vec<Address> = config.parsed_addresses()?;
        let connector = Arc::new(FramedTcpConnector::new(config.max_frame_size));
        let dispatcher = Dispatcher::from_config(connector, config);
        log::debug!(
            "[client] created for {} addresses over {} protocol",
            addresses.len(),
            config.protocol
        );
        Self::new(
            Arc::new(dispatcher),
            Arc::new(SimpleAddressSelector::new(addresses)),
            config.retry.clone(),
        )
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ExceptionClassifier>) -> Self {
        self.context.classifier = classifier;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.context.policy
    }

    fn invocation(
        &self,
        method: &Arc<MethodMetadata>,
        parameters: Vec<ParameterValue>,
        headers: Headers,
    ) -> MethodInvocation {
        MethodInvocation::new(self.context.clone(), method.clone(), parameters, headers)
            .with_stats(self.stats.method(method.name()))
    }

    /// Call `method`, retrying per the client's policy.
    pub async fn invoke(
        &self,
        method: &Arc<MethodMetadata>,
        parameters: Vec<ParameterValue>,
        headers: Headers,
    ) -> DriftResult<Option<DynValue>> {
        self.invocation(method, parameters, headers).run().await
    }

    /// Call `method` and downcast its result.
    pub async fn call<R: Any>(
        &self,
        method: &Arc<MethodMetadata>,
        parameters: Vec<ParameterValue>,
    ) -> DriftResult<R> {
        match self.invoke(method, parameters, Headers::new()).await? {
            Some(value) => Ok(downcast::<R>(value)?),
            None => Err(DriftError::Protocol(format!(
                "{} returned no value",
                method.name()
            ))),
        }
    }

    /// Run the call on the tokio runtime. Must be called within a runtime.
    pub fn spawn(
        &self,
        method: &Arc<MethodMetadata>,
        parameters: Vec<ParameterValue>,
        headers: Headers,
    ) -> InvocationHandle {
        let invocation = self.invocation(method, parameters, headers);
        InvocationHandle {
            task: tokio::spawn(invocation.run()),
        }
    }

    /// Counters of `method`, if it was ever called.
    pub fn stats(&self, method: &str) -> Option<StatsSnapshot> {
        self.stats.snapshot(method)
    }

    pub fn all_stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.stats.snapshots()
    }
}

/// A spawned call.
pub struct InvocationHandle {
    task: JoinHandle<DriftResult<Option<DynValue>>>,
}

impl InvocationHandle {
    /// Abort the in-flight attempt or pending retry delay.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the outcome. A cancelled call yields [`DriftError::Cancelled`].
    pub async fn join(self) -> DriftResult<Option<DynValue>> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(DriftError::Cancelled),
            Err(e) => Err(DriftError::Transport(format!("invocation task failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope;
    use crate::transport::mock::{MockConnectionFactory, MockReply};
    use drift_codec::{CodecManager, Protocol};
    use std::time::Duration;

    fn echo(codecs: &CodecManager) -> Arc<MethodMetadata> {
        MethodMetadata::builder("echo", codecs)
            .parameter::<String>(1, "text")
            .result::<String>()
            .idempotent()
            .build()
            .unwrap()
    }

    fn echo_client(method: Arc<MethodMetadata>, reply: fn(&str) -> MockReply) -> DriftClient {
        let server_method = method.clone();
        let factory = MockConnectionFactory::new(move |_, message| {
            let mut call = envelope::read_call(Protocol::Binary, &server_method, message).unwrap();
            let text = call.take::<String>(0).unwrap().unwrap_or_default();
            match reply(&text) {
                MockReply::Message(_) => MockReply::Message(
                    envelope::write_reply(Protocol::Binary, &server_method, call.sequence_id(), Some(&text))
                        .unwrap(),
                ),
                other => other,
            }
        });
        let dispatcher = Dispatcher::new(Arc::new(factory), Protocol::Binary);
        DriftClient::new(
            Arc::new(dispatcher),
            Arc::new(SimpleAddressSelector::new(vec![Address::new("echo", 1)])),
            RetryConfig::default()
                .with_retry_same_address(true)
                .with_backoff(Duration::from_secs(10), Duration::from_secs(10), 1.0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_call_and_stats() {
        let codecs = CodecManager::new();
        let method = echo(&codecs);
        let client = echo_client(method.clone(), |_| MockReply::Message(Vec::new()));

        let reply: String = client
            .call(&method, vec![Arc::new("hello".to_string())])
            .await
            .unwrap();
        assert_eq!(reply, "hello");

        let wrong: DriftResult<i32> = client.call(&method, vec![Arc::new("x".to_string())]).await;
        assert!(matches!(wrong, Err(DriftError::Codec(_))));

        let stats = client.stats("echo").unwrap();
        assert_eq!(stats.successes, 2);
        assert!(client.stats("missing").is_none());
        assert_eq!(client.all_stats().len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_and_join() {
        let codecs = CodecManager::new();
        let method = echo(&codecs);
        let client = echo_client(method.clone(), |_| MockReply::Message(Vec::new()));

        let handle = client.spawn(&method, vec![Arc::new("spawned".to_string())], Headers::new());
        let value = handle.join().await.unwrap().unwrap();
        assert_eq!(*value.downcast::<String>().unwrap(), "spawned");
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let codecs = CodecManager::new();
        let method = echo(&codecs);
        // every attempt resets, so the call sits in a 10 second backoff
        let client = echo_client(method.clone(), |_| MockReply::Reset);

        let handle = client.spawn(&method, vec![Arc::new("never".to_string())], Headers::new());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        handle.cancel();
        assert!(matches!(handle.join().await, Err(DriftError::Cancelled)));
        assert_eq!(client.stats("echo").unwrap().failures, 1);
    }

    #[tokio::test]
    async fn test_dropping_the_future_cancels() {
        let codecs = CodecManager::new();
        let method = echo(&codecs);
        let client = echo_client(method.clone(), |_| MockReply::Hang);

        let call = client.invoke(&method, vec![Arc::new("slow".to_string())], Headers::new());
        let outcome = tokio::time::timeout(Duration::from_millis(20), call).await;
        assert!(outcome.is_err());

        let stats = client.stats("echo").unwrap();
        assert_eq!((stats.successes, stats.failures), (0, 1));
    }

    #[test]
    fn test_invalid_retry_config_rejected() {
        let factory = MockConnectionFactory::new(|_, _| MockReply::Hang);
        let result = DriftClient::new(
            Arc::new(Dispatcher::new(Arc::new(factory), Protocol::Binary)),
            Arc::new(SimpleAddressSelector::new(Vec::new())),
            RetryConfig::default().with_max_attempts(0),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_config_rejects_bad_addresses() {
        let config = ClientConfig::default().with_address("nope");
        assert!(DriftClient::from_config(&config).is_err());
    }
}

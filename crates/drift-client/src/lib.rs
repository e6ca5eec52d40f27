// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # drift-client - Thrift RPC client with retries
//!
//! Sends Thrift calls over framed TCP and retries failed attempts across
//! the configured addresses.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drift_client::{ClientConfig, DriftClient, Headers, MethodMetadata, ParameterValue};
//! use drift_codec::CodecManager;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_yaml(
//!     r#"
//! addresses: ["10.0.0.1:9090", "10.0.0.2:9090"]
//! protocol: compact
//! retry:
//!   max_attempts: 3
//! "#,
//! )?;
//! let client = DriftClient::from_config(&config)?;
//!
//! let codecs = CodecManager::new();
//! let add = MethodMetadata::builder("add", &codecs)
//!     .parameter::<i32>(1, "a")
//!     .parameter::<i32>(2, "b")
//!     .result::<i64>()
//!     .idempotent()
//!     .build()?;
//!
//! let parameters: Vec<ParameterValue> = vec![Arc::new(2i32), Arc::new(40i32)];
//! let sum: i64 = client.call(&add, parameters).await?;
//! assert_eq!(sum, 42);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  DriftClient: invoke / call / spawn, per-method stats       |
//! +-------------------------------------------------------------+
//! |  invocation: retry loop, backoff, budgets, address choice   |
//! +-------------------------------------------------------------+
//! |  dispatcher: sequence ids, timeouts, one exchange per call  |
//! +-------------------------------------------------------------+
//! |  envelope: CALL/REPLY messages    transport: framed TCP     |
//! +-------------------------------------------------------------+
//! |  drift-codec: struct/union codecs, binary | compact         |
//! +-------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`client`] - [`DriftClient`] facade
//! - [`invocation`] - retry controller
//! - [`classifier`] - retry and host-health verdicts for failures
//! - [`dispatcher`] - single-attempt invoker
//! - [`envelope`] - message encoding of calls and replies
//! - [`transport`] - connection seams and the framed TCP transport
//! - [`method`] - method metadata and requests
//! - [`config`] - YAML configuration
//! - [`stats`] - per-method counters

pub mod address;
pub mod classifier;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod invocation;
pub mod method;
pub mod stats;
pub mod transport;

pub use address::{Address, AddressSelector, SimpleAddressSelector};
pub use classifier::{Classification, DefaultExceptionClassifier, ExceptionClassifier, HostStatus, Retry};
pub use client::{DriftClient, InvocationHandle};
pub use config::{ClientConfig, ConfigError, RetryConfig};
pub use dispatcher::Dispatcher;
pub use error::{
    ApplicationException, ApplicationExceptionKind, DriftApplicationException, DriftError,
    DriftResult, RetryStats,
};
pub use invocation::{MethodInvocation, RetryContext, RetryState};
pub use method::{Headers, InvokeRequest, MethodMetadata, MethodMetadataBuilder, ParameterValue};
pub use stats::{InvocationStatsRegistry, MethodInvocationStats, StatsSnapshot};
pub use transport::{Connection, ConnectionFactory, FramedTcpConnector, MethodInvoker};

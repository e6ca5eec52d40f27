// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retry controller: drives one logical call through attempts until it
//! succeeds or a budget runs out.
//!
//! ```text
//!            +------------+  ok
//!   start -->| ATTEMPTING |------> SUCCESS
//!            +------------+
//!              |  failure: classify
//!              v
//!   classified non-retryable ----------------------> FAILED(NonRetryable)
//!   attempts >= max_attempts ----------------------> FAILED(MaxRetryAttemptsExceeded)
//!   elapsed >= max_retry_time ---------------------> FAILED(RetryTimeExceeded)
//!   no eligible address ---------------------------> FAILED(NoHostsAvailable)
//!   otherwise: delay(backoff) -> ATTEMPTING
//! ```
//!
//! Attempts of one call are strictly sequential. Dropping the future aborts
//! the in-flight attempt or the pending delay, and the call is counted as a
//! failure in the method's stats.

use crate::address::{Address, AddressSelector};
use crate::classifier::{ExceptionClassifier, HostStatus, Retry};
use crate::config::RetryConfig;
use crate::error::{DriftError, DriftResult, RetryStats};
use crate::method::{Headers, InvokeRequest, MethodMetadata, ParameterValue};
use crate::stats::MethodInvocationStats;
use crate::transport::MethodInvoker;
use drift_codec::DynValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mutable state of one logical call.
#[derive(Debug)]
pub struct RetryState {
    attempts: u32,
    started: Instant,
    connection_failures: u32,
    overloaded_rejects: u32,
    attempted_addresses: Vec<Address>,
    last_address: Option<Address>,
    last_address_unusable: bool,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            started: Instant::now(),
            connection_failures: 0,
            overloaded_rejects: 0,
            attempted_addresses: Vec::new(),
            last_address: None,
            last_address_unusable: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn attempted_addresses(&self) -> &[Address] {
        &self.attempted_addresses
    }

    fn begin_attempt(&mut self, address: &Address) {
        self.attempts += 1;
        if !self.attempted_addresses.contains(address) {
            self.attempted_addresses.push(address.clone());
        }
        self.last_address = Some(address.clone());
        self.last_address_unusable = false;
    }

    fn record_failure(&mut self, host_status: HostStatus, connection_failure: bool) {
        if connection_failure {
            self.connection_failures += 1;
        }
        if host_status == HostStatus::Overloaded {
            self.overloaded_rejects += 1;
        }
        self.last_address_unusable = connection_failure || host_status != HostStatus::Normal;
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            attempts: self.attempts,
            retry_time: self.elapsed(),
            connection_failures: self.connection_failures,
            overloaded_rejects: self.overloaded_rejects,
            attempted_addresses: self.attempted_addresses.clone(),
        }
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry state of a running call. Records the outcome into the method's
/// stats when dropped; a call dropped before it finished counts as failed.
struct CallRecord {
    method: Arc<MethodMetadata>,
    stats: Option<Arc<MethodInvocationStats>>,
    state: RetryState,
    success: Option<bool>,
}

impl Drop for CallRecord {
    fn drop(&mut self) {
        if self.success.is_none() {
            log::debug!(
                "[retry] {} cancelled after {} attempts",
                self.method.name(),
                self.state.attempts()
            );
        }
        if let Some(stats) = &self.stats {
            stats.record(
                self.state.elapsed(),
                self.state.attempts().saturating_sub(1),
                self.success.unwrap_or(false),
            );
        }
    }
}

/// Collaborators shared by every call of one client.
#[derive(Clone)]
pub struct RetryContext {
    pub invoker: Arc<dyn MethodInvoker>,
    pub selector: Arc<dyn AddressSelector>,
    pub classifier: Arc<dyn ExceptionClassifier>,
    pub policy: RetryConfig,
}

/// One logical call.
pub struct MethodInvocation {
    context: RetryContext,
    method: Arc<MethodMetadata>,
    parameters: Vec<ParameterValue>,
    headers: Headers,
    stats: Option<Arc<MethodInvocationStats>>,
}

impl MethodInvocation {
    pub fn new(
        context: RetryContext,
        method: Arc<MethodMetadata>,
        parameters: Vec<ParameterValue>,
        headers: Headers,
    ) -> Self {
        Self {
            context,
            method,
            parameters,
            headers,
            stats: None,
        }
    }

    /// Record the outcome into `stats`.
    pub fn with_stats(mut self, stats: Arc<MethodInvocationStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub async fn run(self) -> DriftResult<Option<DynValue>> {
        let mut record = CallRecord {
            method: self.method.clone(),
            stats: self.stats.clone(),
            state: RetryState::new(),
            success: None,
        };
        let result = self.attempt_loop(&mut record.state).await;
        record.success = Some(result.is_ok());
        result
    }

    async fn attempt_loop(&self, state: &mut RetryState) -> DriftResult<Option<DynValue>> {
        let name = self.method.name();
        let mut address = match self.context.selector.select_address(&[]) {
            Some(address) => address,
            None => {
                log::warn!("[retry] {}: no hosts available", name);
                return Err(DriftError::NoHostsAvailable {
                    cause: None,
                    stats: state.stats(),
                });
            }
        };

        loop {
            state.begin_attempt(&address);
            let request = InvokeRequest::new(
                self.method.clone(),
                address.clone(),
                self.parameters.clone(),
                self.headers.clone(),
            );
            let error = match self.context.invoker.invoke(request).await {
                Ok(value) => {
                    if state.attempts() > 1 {
                        log::debug!(
                            "[retry] {} succeeded on attempt {} ({})",
                            name,
                            state.attempts(),
                            address
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let classification = self.context.classifier.classify(&self.method, &error);
            let connection_failure = error.is_connection_failure();
            state.record_failure(classification.host_status, connection_failure);
            log::debug!(
                "[retry] {} attempt {} to {} failed: {} ({:?})",
                name,
                state.attempts(),
                address,
                error,
                classification
            );

            let error = self.check_budgets(state, classification.retry, error)?;

            let next = match self.next_address(state) {
                Some(next) => next,
                None => {
                    return Err(self.fail(DriftError::NoHostsAvailable {
                        cause: Some(Box::new(error)),
                        stats: state.stats(),
                    }));
                }
            };

            let delay = self.context.policy.backoff_delay(state.attempts());
            log::debug!(
                "[retry] {}: retrying on {} in {:?}",
                name,
                next,
                delay
            );
            if !delay.is_zero() {
                self.context.invoker.delay(delay).await;
            }
            address = next;
        }
    }

    /// Hand back the error if another attempt is allowed, otherwise the terminal error.
    fn check_budgets(
        &self,
        state: &RetryState,
        retry: Retry,
        error: DriftError,
    ) -> DriftResult<DriftError> {
        let policy = &self.context.policy;
        if retry == Retry::NonRetryable {
            return Err(self.fail(DriftError::NonRetryable {
                cause: Box::new(error),
                stats: state.stats(),
            }));
        }
        if state.attempts() >= policy.max_attempts {
            return Err(self.fail(DriftError::MaxRetryAttemptsExceeded {
                max_attempts: policy.max_attempts,
                cause: Box::new(error),
                stats: state.stats(),
            }));
        }
        if state.elapsed() >= policy.max_retry_time() {
            return Err(self.fail(DriftError::RetryTimeExceeded {
                max_retry_time: policy.max_retry_time(),
                cause: Box::new(error),
                stats: state.stats(),
            }));
        }
        Ok(error)
    }

    fn next_address(&self, state: &RetryState) -> Option<Address> {
        if self.context.policy.retry_same_address && !state.last_address_unusable {
            if let Some(last) = &state.last_address {
                return Some(last.clone());
            }
        }
        self.context.selector.select_address(state.attempted_addresses())
    }

    fn fail(&self, error: DriftError) -> DriftError {
        log::warn!("[retry] {} failed: {}", self.method.name(), error);
        error
    }
}

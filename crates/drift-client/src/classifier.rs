// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Failure classification for the retry controller.

use crate::error::DriftError;
use crate::method::MethodMetadata;

/// Whether a failed attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retry {
    Retryable,
    NonRetryable,
}

/// What a failure says about the host that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostStatus {
    #[default]
    Normal,
    Down,
    Overloaded,
}

/// Verdict for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub retry: Retry,
    pub host_status: HostStatus,
}

impl Classification {
    pub const fn new(retry: Retry, host_status: HostStatus) -> Self {
        Self { retry, host_status }
    }

    pub const fn retryable() -> Self {
        Self::new(Retry::Retryable, HostStatus::Normal)
    }

    pub const fn non_retryable() -> Self {
        Self::new(Retry::NonRetryable, HostStatus::Normal)
    }

    pub fn is_retryable(&self) -> bool {
        self.retry == Retry::Retryable
    }
}

/// Maps a failure of a call to `method` to a [`Classification`].
///
/// The verdict is final: the retry controller retries whatever is classified
/// retryable, idempotent or not.
pub trait ExceptionClassifier: Send + Sync {
    fn classify(&self, method: &MethodMetadata, error: &DriftError) -> Classification;
}

impl<F> ExceptionClassifier for F
where
    F: Fn(&MethodMetadata, &DriftError) -> Classification + Send + Sync,
{
    fn classify(&self, method: &MethodMetadata, error: &DriftError) -> Classification {
        self(method, error)
    }
}

/// Retries connection failures for every method. Transport, protocol and
/// timeout failures may have reached the server, so they are retried only
/// for idempotent methods. Declared exceptions follow their retry hint and
/// are otherwise final, as are server-side application exceptions and local
/// encoding errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionClassifier;

impl ExceptionClassifier for DefaultExceptionClassifier {
    fn classify(&self, method: &MethodMetadata, error: &DriftError) -> Classification {
        match error {
            DriftError::ConnectionFailed { .. } => {
                Classification::new(Retry::Retryable, HostStatus::Down)
            }
            DriftError::Transport(_) | DriftError::Protocol(_) | DriftError::Timeout(_)
                if method.is_idempotent() =>
            {
                Classification::retryable()
            }
            DriftError::Codec(e) if e.is_wire_error() && method.is_idempotent() => {
                Classification::retryable()
            }
            DriftError::Application(e) if e.retryable() == Some(true) => {
                Classification::retryable()
            }
            _ => Classification::non_retryable(),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for method dispatch and retries.

use crate::address::Address;
use drift_codec::{CodecError, DynValue};
use std::fmt;
use std::time::Duration;

/// Result type for client operations
pub type DriftResult<T> = Result<T, DriftError>;

/// Errors that can occur while invoking a remote method
#[derive(Debug)]
pub enum DriftError {
    /// Encoding the request or decoding the reply failed
    Codec(CodecError),

    /// The reply envelope was malformed or did not match the request
    Protocol(String),

    /// I/O failure after the connection was established
    Transport(String),

    /// The connection could not be opened; the request never left the client
    ConnectionFailed { address: Address, reason: String },

    /// The attempt did not complete within the request timeout
    Timeout(Duration),

    /// The server answered with one of the method's declared exceptions
    Application(DriftApplicationException),

    /// The server answered with an EXCEPTION message
    ApplicationException(ApplicationException),

    /// The classifier refused to retry
    NonRetryable {
        cause: Box<DriftError>,
        stats: RetryStats,
    },

    /// The attempt budget was spent
    MaxRetryAttemptsExceeded {
        max_attempts: u32,
        cause: Box<DriftError>,
        stats: RetryStats,
    },

    /// The retry time budget was spent
    RetryTimeExceeded {
        max_retry_time: Duration,
        cause: Box<DriftError>,
        stats: RetryStats,
    },

    /// The address selector had no eligible address left
    NoHostsAvailable {
        cause: Option<Box<DriftError>>,
        stats: RetryStats,
    },

    /// The invocation was cancelled before it resolved
    Cancelled,
}

impl DriftError {
    /// True if the request never reached a server.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// Retry statistics of a terminal retry error.
    pub fn retry_stats(&self) -> Option<&RetryStats> {
        match self {
            Self::NonRetryable { stats, .. }
            | Self::MaxRetryAttemptsExceeded { stats, .. }
            | Self::RetryTimeExceeded { stats, .. }
            | Self::NoHostsAvailable { stats, .. } => Some(stats),
            _ => None,
        }
    }

    /// The failure of the last attempt, for terminal retry errors.
    pub fn cause(&self) -> Option<&DriftError> {
        match self {
            Self::NonRetryable { cause, .. }
            | Self::MaxRetryAttemptsExceeded { cause, .. }
            | Self::RetryTimeExceeded { cause, .. } => Some(cause),
            Self::NoHostsAvailable { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// The failure of the last attempt, or `self` for non-terminal errors.
    pub fn root_cause(&self) -> &DriftError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl fmt::Display for DriftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "codec error: {}", e),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::ConnectionFailed { address, reason } => {
                write!(f, "failed to connect to {}: {}", address, reason)
            }
            Self::Timeout(after) => write!(f, "request timed out after {:?}", after),
            Self::Application(e) => write!(f, "{}", e),
            Self::ApplicationException(e) => write!(f, "{}", e),
            Self::NonRetryable { stats, .. } => write!(f, "non-retryable exception ({})", stats),
            Self::MaxRetryAttemptsExceeded {
                max_attempts,
                stats,
                ..
            } => write!(f, "max retry attempts ({}) exceeded ({})", max_attempts, stats),
            Self::RetryTimeExceeded {
                max_retry_time,
                stats,
                ..
            } => write!(f, "max retry time ({:?}) exceeded ({})", max_retry_time, stats),
            Self::NoHostsAvailable { stats, .. } => write!(f, "no hosts available ({})", stats),
            Self::Cancelled => write!(f, "invocation cancelled"),
        }
    }
}

impl std::error::Error for DriftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            Self::NonRetryable { cause, .. }
            | Self::MaxRetryAttemptsExceeded { cause, .. }
            | Self::RetryTimeExceeded { cause, .. } => Some(cause.as_ref()),
            Self::NoHostsAvailable { cause, .. } => cause
                .as_deref()
                .map(|cause| cause as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<CodecError> for DriftError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<ApplicationException> for DriftError {
    fn from(e: ApplicationException) -> Self {
        Self::ApplicationException(e)
    }
}

/// A declared exception returned by the server, decoded with the method's
/// exception codec for `field_id`.
pub struct DriftApplicationException {
    field_id: i16,
    value: DynValue,
    rendering: String,
    retryable: Option<bool>,
}

impl DriftApplicationException {
    pub fn new(field_id: i16, value: DynValue, rendering: String, retryable: Option<bool>) -> Self {
        Self {
            field_id,
            value,
            rendering,
            retryable,
        }
    }

    pub fn field_id(&self) -> i16 {
        self.field_id
    }

    /// Human readable form of the exception value.
    pub fn rendering(&self) -> &str {
        &self.rendering
    }

    /// Retry hint declared with the exception, if any.
    pub fn retryable(&self) -> Option<bool> {
        self.retryable
    }

    pub fn value(&self) -> &(dyn std::any::Any + Send) {
        &*self.value
    }

    pub fn downcast_ref<E: 'static>(&self) -> Option<&E> {
        self.value.downcast_ref::<E>()
    }

    /// Recover the exception value.
    pub fn into_value(self) -> DynValue {
        self.value
    }
}

impl fmt::Debug for DriftApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriftApplicationException")
            .field("field_id", &self.field_id)
            .field("rendering", &self.rendering)
            .field("retryable", &self.retryable)
            .finish()
    }
}

impl fmt::Display for DriftApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application exception (field {}): {}", self.field_id, self.rendering)
    }
}

/// Kind code of an [`ApplicationException`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ApplicationExceptionKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
    InvalidTransform = 8,
    InvalidProtocol = 9,
    UnsupportedClientType = 10,
}

impl ApplicationExceptionKind {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            8 => Self::InvalidTransform,
            9 => Self::InvalidProtocol,
            10 => Self::UnsupportedClientType,
            _ => Self::Unknown,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Server-side failure carried by an EXCEPTION message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: Option<String>,
}

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application exception {:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {}", msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplicationException {}

/// Snapshot of a call's retry state, attached to every terminal retry error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub retry_time: Duration,
    pub connection_failures: u32,
    pub overloaded_rejects: u32,
    pub attempted_addresses: Vec<Address>,
}

impl fmt::Display for RetryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts: {}, retry time: {:?}, failed connections: {}, overloaded rejects: {}, attempted: [",
            self.attempts, self.retry_time, self.connection_failures, self.overloaded_rejects
        )?;
        for (i, address) in self.attempted_addresses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", address)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn stats() -> RetryStats {
        RetryStats {
            attempts: 2,
            retry_time: Duration::from_millis(15),
            connection_failures: 1,
            overloaded_rejects: 0,
            attempted_addresses: vec![Address::new("a", 1), Address::new("b", 2)],
        }
    }

    #[test]
    fn test_display() {
        let err = DriftError::Timeout(Duration::from_secs(1));
        assert!(err.to_string().contains("timed out"));

        let err = DriftError::ConnectionFailed {
            address: Address::new("db", 9090),
            reason: "refused".into(),
        };
        assert_eq!(err.to_string(), "failed to connect to db:9090: refused");

        let err = DriftError::MaxRetryAttemptsExceeded {
            max_attempts: 2,
            cause: Box::new(DriftError::Transport("reset".into())),
            stats: stats(),
        };
        let text = err.to_string();
        assert!(text.contains("max retry attempts (2) exceeded"), "{}", text);
        assert!(text.contains("attempted: [a:1, b:2]"), "{}", text);
    }

    #[test]
    fn test_terminal_errors_keep_cause() {
        let err = DriftError::NonRetryable {
            cause: Box::new(DriftError::Protocol("bad".into())),
            stats: stats(),
        };
        assert!(matches!(err.cause(), Some(DriftError::Protocol(_))));
        assert!(err.source().is_some());
        assert_eq!(err.retry_stats().map(|s| s.attempts), Some(2));
        assert!(matches!(err.root_cause(), DriftError::Protocol(_)));

        let err = DriftError::NoHostsAvailable {
            cause: None,
            stats: RetryStats::default(),
        };
        assert!(err.cause().is_none());
        assert!(err.source().is_none());
    }

    #[test]
    fn test_application_exception_kinds() {
        for code in 0..=10 {
            assert_eq!(ApplicationExceptionKind::from_i32(code).as_i32(), code);
        }
        assert_eq!(ApplicationExceptionKind::from_i32(99), ApplicationExceptionKind::Unknown);

        let err = ApplicationException::new(ApplicationExceptionKind::UnknownMethod, "no such method");
        assert_eq!(err.to_string(), "application exception UnknownMethod: no such method");
    }

    #[test]
    fn test_declared_exception_downcast() {
        let err = DriftApplicationException::new(1, Box::new(42i32), "42".into(), Some(true));
        assert_eq!(err.downcast_ref::<i32>(), Some(&42));
        assert!(err.downcast_ref::<String>().is_none());
        assert_eq!(err.retryable(), Some(true));
        assert_eq!(err.to_string(), "application exception (field 1): 42");
    }
}

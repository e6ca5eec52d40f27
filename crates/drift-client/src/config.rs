// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client and retry configuration, loadable from YAML.
//!
//! ```yaml
//! addresses: ["10.0.0.1:9090", "10.0.0.2:9090"]
//! protocol: compact
//! connect_timeout_ms: 500
//! request_timeout_ms: 60000
//! retry:
//!   max_attempts: 6
//!   min_backoff_ms: 100
//!   max_backoff_ms: 30000
//!   backoff_scale_factor: 2.0
//!   max_retry_time_ms: 60000
//!   retry_same_address: false
//! ```

use crate::address::Address;
use drift_codec::Protocol;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Initial attempt plus five retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
pub const DEFAULT_MIN_BACKOFF_MS: u64 = 100;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_SCALE_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_RETRY_TIME_MS: u64 = 60_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Largest frame accepted by the framed TCP transport (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Retry budget and backoff policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_scale_factor: f64,
    /// Wall-clock budget measured from the first attempt.
    pub max_retry_time_ms: u64,
    /// Retry on the last address unless it was marked down or overloaded.
    pub retry_same_address: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff_ms: DEFAULT_MIN_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_scale_factor: DEFAULT_BACKOFF_SCALE_FACTOR,
            max_retry_time_ms: DEFAULT_MAX_RETRY_TIME_MS,
            retry_same_address: false,
        }
    }
}

impl RetryConfig {
    /// A policy that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration, scale_factor: f64) -> Self {
        self.min_backoff_ms = duration_ms(min);
        self.max_backoff_ms = duration_ms(max);
        self.backoff_scale_factor = scale_factor;
        self
    }

    pub fn with_max_retry_time(mut self, max_retry_time: Duration) -> Self {
        self.max_retry_time_ms = duration_ms(max_retry_time);
        self
    }

    pub fn with_retry_same_address(mut self, retry_same_address: bool) -> Self {
        self.retry_same_address = retry_same_address;
        self
    }

    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn max_retry_time(&self) -> Duration {
        Duration::from_millis(self.max_retry_time_ms)
    }

    /// Delay before the attempt following `attempts` failed ones:
    /// `min(min_backoff * scale^(attempts - 1), max_backoff)`.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        if self.min_backoff_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.min_backoff_ms as f64 * self.backoff_scale_factor.powi(exponent);
        let capped = scaled.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.min_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.min_backoff_ms, self.max_backoff_ms
            )));
        }
        if !self.backoff_scale_factor.is_finite() || self.backoff_scale_factor < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_scale_factor must be a finite value >= 1.0, got {}",
                self.backoff_scale_factor
            )));
        }
        Ok(())
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate server addresses as `host:port`.
    pub addresses: Vec<String>,
    #[serde(deserialize_with = "deserialize_protocol")]
    pub protocol: Protocol,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_frame_size: usize,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            protocol: Protocol::Binary,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse the configured addresses.
    pub fn parsed_addresses(&self) -> Result<Vec<Address>, ConfigError> {
        self.addresses
            .iter()
            .map(|address| {
                address
                    .parse::<Address>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid("connect_timeout_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid("max_frame_size must be positive".into()));
        }
        self.parsed_addresses()?;
        self.retry.validate()
    }
}

fn deserialize_protocol<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Protocol, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.parse().map_err(serde::de::Error::custom)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// YAML parsing failed.
    Yaml(serde_yaml::Error),
    /// File I/O failed.
    Io(std::io::Error),
    /// A value is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Yaml(e) => write!(f, "YAML parse error: {}", e),
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Io(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_YAML: &str = r#"
addresses:
  - "10.0.0.1:9090"
  - "[::1]:9091"
protocol: compact
connect_timeout_ms: 250
request_timeout_ms: 2000
retry:
  max_attempts: 3
  min_backoff_ms: 10
  max_backoff_ms: 1000
  backoff_scale_factor: 1.5
  max_retry_time_ms: 5000
  retry_same_address: true
"#;

    #[test]
    fn test_config_parse_all_fields() {
        let config = ClientConfig::from_yaml(FULL_YAML).expect("parse full yaml");

        assert_eq!(config.protocol, Protocol::Compact);
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(
            config.parsed_addresses().unwrap(),
            vec![Address::new("10.0.0.1", 9090), Address::new("::1", 9091)]
        );

        let retry = &config.retry;
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.min_backoff(), Duration::from_millis(10));
        assert_eq!(retry.max_backoff(), Duration::from_secs(1));
        assert_eq!(retry.backoff_scale_factor, 1.5);
        assert_eq!(retry.max_retry_time(), Duration::from_secs(5));
        assert!(retry.retry_same_address);
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::from_yaml("addresses: [\"localhost:1\"]").expect("parse");
        assert_eq!(config.protocol, Protocol::Binary);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }

    #[test]
    fn test_config_rejects_invalid() {
        assert!(matches!(
            ClientConfig::from_yaml("protocol: json"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            ClientConfig::from_yaml("addresses: [\"no-port\"]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_yaml("retry:\n  max_attempts: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_yaml("retry:\n  min_backoff_ms: 10\n  max_backoff_ms: 5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(ClientConfig::default()
            .with_connect_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_backoff_delay() {
        let retry = RetryConfig::default().with_backoff(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            2.0,
        );
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_delay(4), Duration::from_millis(800));
        assert_eq!(retry.backoff_delay(5), Duration::from_millis(1000));
        assert_eq!(retry.backoff_delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_builder_setters() {
        let config = ClientConfig::default()
            .with_address("a:1")
            .with_protocol(Protocol::Compact)
            .with_request_timeout(Duration::from_secs(3))
            .with_retry(RetryConfig::no_retries().with_retry_same_address(true));
        assert!(config.validate().is_ok());
        assert_eq!(config.addresses, vec!["a:1".to_string()]);
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.retry.retry_same_address);
    }
}

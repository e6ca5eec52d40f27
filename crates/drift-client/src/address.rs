// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote addresses and address selection.

use std::fmt;
use std::str::FromStr;

/// A `host:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Error returned when parsing a malformed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(String);

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address '{}': expected host:port", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts `host:port` and `[v6-host]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

/// Chooses the address of the next attempt.
///
/// Returning `None` means no eligible address remains; the retry controller
/// turns that into a no-hosts-available failure.
pub trait AddressSelector: Send + Sync {
    fn select_address(&self, excluding: &[Address]) -> Option<Address>;
}

/// Picks uniformly at random among the configured addresses not excluded.
#[derive(Debug, Clone)]
pub struct SimpleAddressSelector {
    addresses: Vec<Address>,
}

impl SimpleAddressSelector {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }
}

impl AddressSelector for SimpleAddressSelector {
    fn select_address(&self, excluding: &[Address]) -> Option<Address> {
        let eligible: Vec<&Address> = self
            .addresses
            .iter()
            .filter(|address| !excluding.contains(address))
            .collect();
        if eligible.is_empty() {
            return None;
        }
        Some(eligible[fastrand::usize(..eligible.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let address: Address = "localhost:9090".parse().unwrap();
        assert_eq!(address, Address::new("localhost", 9090));
        assert_eq!(address.to_string(), "localhost:9090");

        let v6: Address = "[::1]:7000".parse().unwrap();
        assert_eq!(v6.host(), "::1");
        assert_eq!(v6.to_string(), "[::1]:7000");

        assert!("localhost".parse::<Address>().is_err());
        assert!(":80".parse::<Address>().is_err());
        assert!("host:99999".parse::<Address>().is_err());
    }

    #[test]
    fn test_selector_honours_exclusions() {
        let a = Address::new("a", 1);
        let b = Address::new("b", 2);
        let selector = SimpleAddressSelector::new(vec![a.clone(), b.clone()]);

        for _ in 0..32 {
            assert_eq!(selector.select_address(&[a.clone()]), Some(b.clone()));
        }
        assert_eq!(selector.select_address(&[a, b]), None);
        assert_eq!(SimpleAddressSelector::new(Vec::new()).select_address(&[]), None);
    }

    #[test]
    fn test_selector_spreads_choices() {
        let addresses: Vec<Address> = (0..4).map(|i| Address::new("h", 1000 + i)).collect();
        let selector = SimpleAddressSelector::new(addresses.clone());
        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            seen.extend(selector.select_address(&[]));
        }
        assert_eq!(seen.len(), addresses.len());
    }
}

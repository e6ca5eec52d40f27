// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-method invocation counters.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters for one method, updated lock-free by concurrent calls.
#[derive(Debug, Default)]
pub struct MethodInvocationStats {
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    total_latency_us: AtomicU64,
}

/// Point-in-time copy of [`MethodInvocationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub total_latency: Duration,
}

impl StatsSnapshot {
    pub fn calls(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn mean_latency(&self) -> Option<Duration> {
        let calls = u32::try_from(self.calls()).ok().filter(|&n| n > 0)?;
        Some(self.total_latency / calls)
    }
}

impl MethodInvocationStats {
    /// Record one finished call.
    pub fn record(&self, latency: Duration, retries: u32, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_latency: Duration::from_micros(self.total_latency_us.load(Ordering::Relaxed)),
        }
    }
}

/// Stats of every method called through one client, keyed by method name.
#[derive(Debug, Default)]
pub struct InvocationStatsRegistry {
    methods: DashMap<String, Arc<MethodInvocationStats>>,
}

impl InvocationStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats entry for `method`, created on first use.
    pub fn method(&self, method: &str) -> Arc<MethodInvocationStats> {
        if let Some(stats) = self.methods.get(method) {
            return stats.clone();
        }
        self.methods.entry(method.to_string()).or_default().clone()
    }

    pub fn snapshot(&self, method: &str) -> Option<StatsSnapshot> {
        self.methods.get(method).map(|stats| stats.snapshot())
    }

    /// Snapshots of all methods, sorted by name.
    pub fn snapshots(&self) -> Vec<(String, StatsSnapshot)> {
        let mut all: Vec<(String, StatsSnapshot)> = self
            .methods
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = MethodInvocationStats::default();
        stats.record(Duration::from_millis(10), 0, true);
        stats.record(Duration::from_millis(30), 2, false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.calls(), 2);
        assert_eq!(snapshot.mean_latency(), Some(Duration::from_millis(20)));
        assert_eq!(StatsSnapshot::default().mean_latency(), None);
    }

    #[test]
    fn test_registry_shares_entries() {
        let registry = InvocationStatsRegistry::new();
        let a = registry.method("get");
        let b = registry.method("get");
        a.record(Duration::ZERO, 0, true);
        assert_eq!(b.snapshot().successes, 1);

        registry.method("put").record(Duration::ZERO, 1, false);
        let names: Vec<String> = registry.snapshots().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["get".to_string(), "put".to_string()]);
        assert!(registry.snapshot("missing").is_none());
    }

    #[test]
    fn test_concurrent_updates() {
        let registry = Arc::new(InvocationStatsRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        registry.method("hot").record(Duration::from_micros(1), 0, true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot("hot").unwrap().successes, 1000);
    }
}

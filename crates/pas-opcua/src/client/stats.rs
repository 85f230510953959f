// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Traffic counters for the device client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lock-free traffic counters.
#[derive(Debug, Default)]
pub struct PortStats {
    reads: AtomicU64,
    writes: AtomicU64,
    method_calls: AtomicU64,
    async_calls: AtomicU64,
    completions: AtomicU64,
    failed_completions: AtomicU64,
    errors: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl PortStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read request.
    pub fn record_read(&self, elapsed: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.add_time(elapsed);
    }

    /// Records a write request.
    pub fn record_write(&self, elapsed: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.add_time(elapsed);
    }

    /// Records a synchronous method call.
    pub fn record_call(&self, elapsed: Duration) {
        self.method_calls.fetch_add(1, Ordering::Relaxed);
        self.add_time(elapsed);
    }

    /// Records an async dispatch.
    pub fn record_async_call(&self) {
        self.async_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an async completion.
    pub fn record_completion(&self, good: bool) {
        self.completions.fetch_add(1, Ordering::Relaxed);
        if !good {
            self.failed_completions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a failed request.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn add_time(&self, elapsed: Duration) {
        self.total_response_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Returns a snapshot of the counters.
    pub fn snapshot(&self) -> PortStatsSnapshot {
        let reads = self.reads.load(Ordering::Relaxed);
        let writes = self.writes.load(Ordering::Relaxed);
        let method_calls = self.method_calls.load(Ordering::Relaxed);
        let timed = reads + writes + method_calls;
        let total_us = self.total_response_time_us.load(Ordering::Relaxed);

        PortStatsSnapshot {
            reads,
            writes,
            method_calls,
            async_calls: self.async_calls.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            failed_completions: self.failed_completions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            avg_response_time: if timed > 0 {
                Duration::from_micros(total_us / timed)
            } else {
                Duration::ZERO
            },
        }
    }
}

/// A point-in-time copy of [`PortStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortStatsSnapshot {
    /// Read requests.
    pub reads: u64,
    /// Write requests.
    pub writes: u64,
    /// Synchronous method calls.
    pub method_calls: u64,
    /// Async dispatches.
    pub async_calls: u64,
    /// Async completions received.
    pub completions: u64,
    /// Completions with a bad status.
    pub failed_completions: u64,
    /// Failed requests.
    pub errors: u64,
    /// Mean response time of timed requests.
    pub avg_response_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = PortStats::new();
        stats.record_read(Duration::from_micros(100));
        stats.record_call(Duration::from_micros(300));
        stats.record_async_call();
        stats.record_completion(false);
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.reads, 1);
        assert_eq!(snap.method_calls, 1);
        assert_eq!(snap.async_calls, 1);
        assert_eq!(snap.failed_completions, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.avg_response_time, Duration::from_micros(200));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery metrics.
//!
//! Atomic counters shared by PDP, EDP and the type lookup manager. Transient
//! failures on the receive path are only visible here and in debug logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Discovery counters.
#[derive(Debug, Default)]
pub struct DiscoveryMetrics {
    /// SPDP samples received (valid or not).
    pub announcements_received: AtomicU64,
    /// Participants that reached ALIVE.
    pub participants_discovered: AtomicU64,
    /// Participants removed by disposal.
    pub participants_disposed: AtomicU64,
    /// Participants removed by lease expiry.
    pub leases_expired: AtomicU64,
    /// Announcements rejected by the filtering policy.
    pub participants_filtered: AtomicU64,
    /// Remote endpoints accepted into the proxy store.
    pub endpoints_discovered: AtomicU64,
    /// Remote endpoints removed (disposal or owner removal).
    pub endpoints_removed: AtomicU64,
    /// Samples dropped on the receive path (malformed, unknown owner, ...).
    pub dropped_samples: AtomicU64,
    /// Discovery events discarded because a proxy pool was full.
    pub pool_exhausted: AtomicU64,
    /// Type lookup requests sent.
    pub type_requests_sent: AtomicU64,
    /// Type lookup replies accepted.
    pub type_replies_received: AtomicU64,
}

/// Point-in-time copy of [`DiscoveryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub announcements_received: u64,
    pub participants_discovered: u64,
    pub participants_disposed: u64,
    pub leases_expired: u64,
    pub participants_filtered: u64,
    pub endpoints_discovered: u64,
    pub endpoints_removed: u64,
    pub dropped_samples: u64,
    pub pool_exhausted: u64,
    pub type_requests_sent: u64,
    pub type_replies_received: u64,
}

impl DiscoveryMetrics {
    pub fn new() -> Self {
        crate::trace_fn!("DiscoveryMetrics::new");
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        crate::trace_fn!("DiscoveryMetrics::snapshot");
        MetricsSnapshot {
            announcements_received: self.announcements_received.load(Ordering::Relaxed),
            participants_discovered: self.participants_discovered.load(Ordering::Relaxed),
            participants_disposed: self.participants_disposed.load(Ordering::Relaxed),
            leases_expired: self.leases_expired.load(Ordering::Relaxed),
            participants_filtered: self.participants_filtered.load(Ordering::Relaxed),
            endpoints_discovered: self.endpoints_discovered.load(Ordering::Relaxed),
            endpoints_removed: self.endpoints_removed.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            type_requests_sent: self.type_requests_sent.load(Ordering::Relaxed),
            type_replies_received: self.type_replies_received.load(Ordering::Relaxed),
        }
    }
}

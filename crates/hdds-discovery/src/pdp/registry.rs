// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote participant registry.
//!
//! Owns every remote participant proxy. Proxies live in a [`ProxyPool`];
//! the map from GUID prefix to slot is private and only reachable through
//! the synchronized accessors below. Other components hold an
//! `Arc<ParticipantRegistry>` and look participants up by identity.
//!
//! The lease deadline lives in the map entry next to the pool handle, so
//! removing an entry cancels its expiry before the slot is released.

use crate::config::AllocationLimits;
use crate::error::PoolError;
use crate::guid::{Guid, GuidPrefix};
use crate::proxy::{ParticipantProxyData, PoolHandle, ProxyPool};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;

/// Lifecycle state of a remote participant.
///
/// REMOVED is terminal: the entry is gone and a later announcement with the
/// same identity starts a new proxy at ANNOUNCED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Unknown,
    Announced,
    Alive,
}

/// Outcome of [`ParticipantRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New proxy created (UNKNOWN -> ANNOUNCED).
    Created,
    /// Known proxy refreshed, lease restarted.
    Refreshed,
}

struct Entry {
    handle: PoolHandle,
    state: ParticipantState,
    lease_deadline: Instant,
}

pub struct ParticipantRegistry {
    entries: RwLock<HashMap<GuidPrefix, Entry>>,
    pool: ProxyPool<ParticipantProxyData>,
}

impl ParticipantRegistry {
    pub fn new(limits: AllocationLimits) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            pool: ProxyPool::new("participant", limits),
        }
    }

    /// Insert a new proxy or refresh the existing one for `data.guid`.
    ///
    /// On refresh the mutable attributes are overwritten (identity kept) and
    /// the lease deadline moves to `now + lease_duration`. Pool exhaustion
    /// leaves the registry unchanged.
    pub fn upsert(&self, data: &ParticipantProxyData, now: Instant) -> Result<Upsert, PoolError> {
        crate::trace_fn!("ParticipantRegistry::upsert");
        let prefix = data.prefix();
        let lease_deadline = now + data.lease_duration;
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get_mut(&prefix) {
            self.pool.with_mut(entry.handle, |proxy| proxy.update_from(data))?;
            entry.lease_deadline = lease_deadline;
            return Ok(Upsert::Refreshed);
        }

        let handle = self.pool.acquire()?;
        if let Err(err) = self.pool.with_mut(handle, |proxy| *proxy = data.clone()) {
            if let Err(release_err) = self.pool.release(handle) {
                log::error!("[PDP] releasing participant slot: {}", release_err);
            }
            return Err(err);
        }
        entries.insert(
            prefix,
            Entry {
                handle,
                state: ParticipantState::Announced,
                lease_deadline,
            },
        );
        Ok(Upsert::Created)
    }

    /// ANNOUNCED -> ALIVE. Returns `true` only for the first transition.
    ///
    /// Refreshes never promote a proxy: only the thread that created it does,
    /// once the local side is attached, so listeners see exactly one
    /// discovery per proxy.
    pub fn mark_alive(&self, prefix: &GuidPrefix) -> bool {
        match self.entries.write().get_mut(prefix) {
            Some(entry) if entry.state == ParticipantState::Announced => {
                entry.state = ParticipantState::Alive;
                true
            }
            _ => false,
        }
    }

    /// Remove a participant and release its slot. Returns the final proxy
    /// contents.
    pub fn remove(&self, prefix: &GuidPrefix) -> Option<ParticipantProxyData> {
        let entry = self.entries.write().remove(prefix)?;
        self.reclaim(entry)
    }

    /// Remove a participant only if its lease is still expired at `now`
    /// (a refresh may have raced the lease check).
    pub fn remove_if_expired(
        &self,
        prefix: &GuidPrefix,
        now: Instant,
    ) -> Option<ParticipantProxyData> {
        let entry = {
            let mut entries = self.entries.write();
            let expired = entries
                .get(prefix)
                .is_some_and(|entry| entry.lease_deadline <= now);
            if !expired {
                return None;
            }
            entries.remove(prefix)?
        };
        self.reclaim(entry)
    }

    fn reclaim(&self, entry: Entry) -> Option<ParticipantProxyData> {
        let data = self.pool.with(entry.handle, Clone::clone).ok();
        if let Err(err) = self.pool.release(entry.handle) {
            log::error!("[PDP] releasing participant slot: {}", err);
        }
        data
    }

    /// Participants whose lease deadline is at or before `now`.
    pub fn expired(&self, now: Instant) -> Vec<GuidPrefix> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.lease_deadline <= now)
            .map(|(prefix, _)| *prefix)
            .collect()
    }

    pub fn get(&self, prefix: &GuidPrefix) -> Option<ParticipantProxyData> {
        let entries = self.entries.read();
        let entry = entries.get(prefix)?;
        self.pool.with(entry.handle, Clone::clone).ok()
    }

    pub fn state(&self, prefix: &GuidPrefix) -> ParticipantState {
        self.entries
            .read()
            .get(prefix)
            .map_or(ParticipantState::Unknown, |entry| entry.state)
    }

    pub fn is_alive(&self, prefix: &GuidPrefix) -> bool {
        self.state(prefix) == ParticipantState::Alive
    }

    pub fn contains(&self, prefix: &GuidPrefix) -> bool {
        self.entries.read().contains_key(prefix)
    }

    pub fn lease_deadline(&self, prefix: &GuidPrefix) -> Option<Instant> {
        self.entries.read().get(prefix).map(|entry| entry.lease_deadline)
    }

    pub fn participant_name(&self, guid: &Guid) -> Option<String> {
        let entries = self.entries.read();
        let entry = entries.get(&guid.prefix)?;
        self.pool
            .with(entry.handle, |proxy| proxy.participant_name.clone())
            .ok()
    }

    pub fn prefixes(&self) -> Vec<GuidPrefix> {
        self.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn proxy(n: u8, lease_secs: u64) -> ParticipantProxyData {
        ParticipantProxyData {
            guid: Guid::participant(GuidPrefix([n; 12])),
            lease_duration: Duration::from_secs(lease_secs),
            participant_name: format!("p{}", n),
            ..Default::default()
        }
    }

    #[test]
    fn test_refresh_keeps_single_proxy() {
        let registry = ParticipantRegistry::new(AllocationLimits::new(1, 4));
        let now = Instant::now();
        let p = proxy(1, 10);

        assert_eq!(registry.upsert(&p, now), Ok(Upsert::Created));
        assert_eq!(registry.state(&p.prefix()), ParticipantState::Announced);
        assert!(registry.mark_alive(&p.prefix()));
        assert!(!registry.mark_alive(&p.prefix()));

        let mut renamed = p.clone();
        renamed.participant_name = "renamed".into();
        assert_eq!(
            registry.upsert(&renamed, now + Duration::from_secs(5)),
            Ok(Upsert::Refreshed)
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.pool.in_use(), 1);
        assert_eq!(
            registry.participant_name(&p.guid).as_deref(),
            Some("renamed")
        );
        assert_eq!(
            registry.lease_deadline(&p.prefix()),
            Some(now + Duration::from_secs(15))
        );
    }

    #[test]
    fn test_expiry_respects_refresh() {
        let registry = ParticipantRegistry::new(AllocationLimits::new(1, 4));
        let start = Instant::now();
        let p = proxy(1, 10);
        registry.upsert(&p, start).expect("insert");

        let later = start + Duration::from_secs(11);
        assert_eq!(registry.expired(later), vec![p.prefix()]);

        // Refresh lands between the scan and the removal.
        registry.upsert(&p, later).expect("refresh");
        assert!(registry.remove_if_expired(&p.prefix(), later).is_none());
        assert!(registry.contains(&p.prefix()));

        let removed = registry
            .remove_if_expired(&p.prefix(), later + Duration::from_secs(10))
            .expect("expired");
        assert_eq!(removed.guid, p.guid);
        assert_eq!(registry.pool.in_use(), 0);
        assert_eq!(registry.state(&p.prefix()), ParticipantState::Unknown);
    }

    #[test]
    fn test_exhaustion_leaves_registry_unchanged() {
        let registry = ParticipantRegistry::new(AllocationLimits::new(0, 1));
        let now = Instant::now();
        registry.upsert(&proxy(1, 10), now).expect("first");
        assert!(registry.upsert(&proxy(2, 10), now).is_err());
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(&GuidPrefix([2; 12])));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant Discovery Protocol (SPDP).
//!
//! # Lifecycle
//! ```text
//! UNKNOWN --first announcement--> ANNOUNCED --local channels attached--> ALIVE
//!    ^                                                                     |
//!    +------------- disposal sample / lease expiry (REMOVED) --------------+
//! ```
//!
//! - A new participant is filtered, inserted, attached to our SPDP channels
//!   and then announced to every [`ParticipantListener`] (EDP, type lookup).
//! - Each further announcement refreshes the proxy and restarts its lease.
//! - Removal takes the proxy out of the registry (cancelling its lease),
//!   notifies listeners, then detaches the SPDP channels.
//!
//! Listeners are always called without the registry lock held. Creation
//! and removal of one participant are serialized, so a removal never
//! overtakes the attachment of a participant that is still being created.

mod filter;
mod periodic;
mod registry;

pub use filter::{check_announcement, FilterReason};
pub use periodic::PeriodicTask;
pub use registry::{ParticipantRegistry, ParticipantState, Upsert};

use crate::builtin::{BuiltinEndpointSet, ParticipantFilteringFlags};
use crate::channel::{BuiltinReader, BuiltinWriter, ChannelAttributes, ChannelScope};
use crate::config::DiscoveryConfig;
use crate::error::InitError;
use crate::guid::{EntityId, Guid, GuidPrefix};
use crate::history::{CacheChange, ChangeKind, ChangeListener, InstanceHandle};
use crate::metrics::DiscoveryMetrics;
use crate::proxy::{ParticipantProxyData, ProtocolVersion, VENDOR_ID_HDDS};
use crate::wire::spdp;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Why a participant left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Disposed,
    LeaseExpired,
    /// Removed by a local call.
    Local,
}

/// Participant lifecycle capability (implemented by EDP and type lookup).
pub trait ParticipantListener: Send + Sync {
    /// First transition into ALIVE.
    fn on_participant_discovered(&self, participant: &ParticipantProxyData);

    /// The participant is gone; everything it owned must be dropped.
    fn on_participant_removed(&self, participant: &ParticipantProxyData, reason: RemovalReason);
}

/// One lock per remote participant with a lifecycle change in flight.
#[derive(Default)]
struct LifecycleLocks {
    locks: Mutex<HashMap<GuidPrefix, Arc<Mutex<()>>>>,
}

impl LifecycleLocks {
    fn acquire(&self, prefix: &GuidPrefix) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(*prefix).or_default())
    }

    fn release(&self, prefix: &GuidPrefix, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // Clones are only taken under `locks`: two owners means the map and us.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(prefix);
        }
    }

    /// Run `f` with `prefix`'s lifecycle lock held.
    fn with<R>(&self, prefix: &GuidPrefix, f: impl FnOnce() -> R) -> R {
        let lock = self.acquire(prefix);
        let result = {
            let _guard = lock.lock();
            f()
        };
        self.release(prefix, lock);
        result
    }
}

pub struct ParticipantDiscovery {
    local: ParticipantProxyData,
    registry: Arc<ParticipantRegistry>,
    writer: Arc<BuiltinWriter>,
    reader: Arc<BuiltinReader>,
    filtering: ParticipantFilteringFlags,
    avoid_multicast: bool,
    announcement_period: Duration,
    listeners: RwLock<Vec<Arc<dyn ParticipantListener>>>,
    lifecycle: LifecycleLocks,
    metrics: Arc<DiscoveryMetrics>,
}

impl ParticipantDiscovery {
    /// Create the SPDP writer/reader and the local participant description.
    pub fn new(
        config: &DiscoveryConfig,
        local_prefix: GuidPrefix,
        scope: &ChannelScope<'_>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Result<Self, InitError> {
        crate::trace_fn!("ParticipantDiscovery::new");
        let reader = scope.reader(
            Guid::new(local_prefix, EntityId::SPDP_READER),
            ChannelAttributes::PARTICIPANT,
        )?;
        let writer = scope.writer(
            Guid::new(local_prefix, EntityId::SPDP_WRITER),
            EntityId::SPDP_READER,
            ChannelAttributes::PARTICIPANT,
        )?;

        let mut fixed = config.multicast_locators();
        fixed.extend(config.initial_peer_locators());
        writer.set_fixed_destinations(fixed);

        let local = ParticipantProxyData {
            guid: Guid::participant(local_prefix),
            protocol_version: ProtocolVersion::CURRENT,
            vendor_id: VENDOR_ID_HDDS,
            lease_duration: config.lease_duration(),
            metatraffic_unicast: config.unicast_locators(),
            metatraffic_multicast: config.multicast_locators(),
            builtin_endpoints: config.builtin_endpoints(),
            participant_name: config.participant_name.clone(),
            properties: config
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        log::info!(
            "[PDP] local participant {} ({}) endpoints {:?}",
            local.guid,
            local.participant_name,
            local.builtin_endpoints
        );

        Ok(Self {
            local,
            registry: Arc::new(ParticipantRegistry::new(config.allocation.participants)),
            writer,
            reader,
            filtering: config.filtering_flags(),
            avoid_multicast: config.avoid_builtin_multicast,
            announcement_period: config.announcement_period(),
            listeners: RwLock::new(Vec::new()),
            lifecycle: LifecycleLocks::default(),
            metrics,
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn ParticipantListener>) {
        self.listeners.write().push(listener);
    }

    pub fn local_data(&self) -> &ParticipantProxyData {
        &self.local
    }

    pub fn local_prefix(&self) -> GuidPrefix {
        self.local.prefix()
    }

    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    pub fn writer(&self) -> &Arc<BuiltinWriter> {
        &self.writer
    }

    pub fn reader(&self) -> &Arc<BuiltinReader> {
        &self.reader
    }

    /// Publish our participant state.
    ///
    /// - `dispose`: send the disposal key so peers drop us at once.
    /// - `new_change` (or nothing sent yet): encode a fresh announcement.
    /// - otherwise: re-send the last announcement (periodic refresh).
    pub fn announce_participant_state(&self, new_change: bool, dispose: bool) {
        crate::trace_fn!("ParticipantDiscovery::announce_participant_state");
        let instance = InstanceHandle::from(self.local.guid);
        if dispose {
            log::info!("[PDP] disposing local participant {}", self.local.guid);
            self.writer.write(
                spdp::encode_participant_key(&self.local.guid),
                ChangeKind::NotAliveDisposed,
                instance,
            );
        } else if new_change || self.writer.history().is_empty() {
            self.writer.write(
                spdp::encode_participant(&self.local),
                ChangeKind::Alive,
                instance,
            );
        } else {
            self.writer.resend_history();
        }
    }

    pub fn participant_count(&self) -> usize {
        self.registry.len()
    }

    pub fn state(&self, prefix: &GuidPrefix) -> ParticipantState {
        self.registry.state(prefix)
    }

    pub fn lookup_participant_name(&self, guid: &Guid) -> Option<String> {
        if guid.prefix == self.local.prefix() {
            return Some(self.local.participant_name.clone());
        }
        self.registry.participant_name(guid)
    }

    pub fn participant(&self, prefix: &GuidPrefix) -> Option<ParticipantProxyData> {
        self.registry.get(prefix)
    }

    fn on_announcement(&self, change: &CacheChange) {
        let data = match spdp::decode_participant(&change.payload) {
            Ok(data) => data,
            Err(err) => {
                log::debug!("[PDP] dropping malformed announcement: {}", err);
                DiscoveryMetrics::bump(&self.metrics.dropped_samples);
                return;
            }
        };
        let prefix = data.prefix();
        if prefix == self.local.prefix() {
            return;
        }
        self.lifecycle.with(&prefix, || self.admit(&data));
    }

    fn admit(&self, data: &ParticipantProxyData) {
        let prefix = data.prefix();
        if !self.registry.contains(&prefix) {
            if let Err(reason) = check_announcement(&self.local.prefix(), data, self.filtering) {
                log::debug!("[PDP] ignoring participant {}: {:?}", data.guid, reason);
                DiscoveryMetrics::bump(&self.metrics.participants_filtered);
                return;
            }
        }

        match self.registry.upsert(data, Instant::now()) {
            Ok(Upsert::Refreshed) => {
                log::trace!("[PDP] participant {} refreshed", data.guid);
            }
            Ok(Upsert::Created) => {
                log::info!(
                    "[PDP] new participant {} ({}) lease {:?}",
                    data.guid,
                    data.participant_name,
                    data.lease_duration
                );
                self.assign_remote_endpoints(data);
                if self.registry.mark_alive(&prefix) {
                    DiscoveryMetrics::bump(&self.metrics.participants_discovered);
                    let listeners = self.listeners.read().clone();
                    for listener in listeners {
                        listener.on_participant_discovered(data);
                    }
                }
            }
            Err(err) => {
                log::warn!("[PDP] discarding announcement from {}: {}", data.guid, err);
                DiscoveryMetrics::bump(&self.metrics.pool_exhausted);
            }
        }
    }

    fn on_disposal(&self, change: &CacheChange) {
        let guid = match spdp::decode_participant_key(&change.payload) {
            Ok(guid) => guid,
            Err(_) if !change.instance_handle.is_nil() => change.instance_handle.to_guid(),
            Err(err) => {
                log::debug!("[PDP] dropping disposal without key: {}", err);
                DiscoveryMetrics::bump(&self.metrics.dropped_samples);
                return;
            }
        };
        if self.remove_remote_participant(&guid.prefix, RemovalReason::Disposed) {
            DiscoveryMetrics::bump(&self.metrics.participants_disposed);
        }
    }

    /// Remove a remote participant and cascade to listeners.
    ///
    /// Returns `false` if the participant was not known.
    pub fn remove_remote_participant(&self, prefix: &GuidPrefix, reason: RemovalReason) -> bool {
        crate::trace_fn!("ParticipantDiscovery::remove_remote_participant");
        self.lifecycle
            .with(prefix, || match self.registry.remove(prefix) {
                Some(data) => {
                    self.finish_removal(&data, reason);
                    true
                }
                None => false,
            })
    }

    /// Remove every participant whose lease expired at `now`.
    pub fn expire_leases_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        for prefix in self.registry.expired(now) {
            let expired = self.lifecycle.with(&prefix, || {
                let Some(data) = self.registry.remove_if_expired(&prefix, now) else {
                    return false;
                };
                log::info!("[PDP] lease expired for {}", data.guid);
                DiscoveryMetrics::bump(&self.metrics.leases_expired);
                self.finish_removal(&data, RemovalReason::LeaseExpired);
                true
            });
            if expired {
                removed += 1;
            }
        }
        removed
    }

    fn finish_removal(&self, data: &ParticipantProxyData, reason: RemovalReason) {
        log::info!("[PDP] participant {} removed ({:?})", data.guid, reason);
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_participant_removed(data, reason);
        }
        self.remove_remote_endpoints(data);
    }

    /// Attach our SPDP channels to the remote's, per its capability bits.
    pub fn assign_remote_endpoints(&self, data: &ParticipantProxyData) {
        let prefix = data.prefix();
        let endpoints = data.builtin_endpoints;
        if endpoints.contains(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER) {
            self.reader
                .matched_writer_add(Guid::new(prefix, EntityId::SPDP_WRITER));
        }
        if endpoints.contains(BuiltinEndpointSet::PARTICIPANT_DETECTOR) {
            // Transient-local: the remote gets our announcement right away.
            self.writer.matched_reader_add(
                Guid::new(prefix, EntityId::SPDP_READER),
                data.metatraffic_locators(self.avoid_multicast),
            );
        }
    }

    pub fn remove_remote_endpoints(&self, data: &ParticipantProxyData) {
        let prefix = data.prefix();
        let endpoints = data.builtin_endpoints;
        if endpoints.contains(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER) {
            self.reader
                .matched_writer_remove(Guid::new(prefix, EntityId::SPDP_WRITER));
        }
        if endpoints.contains(BuiltinEndpointSet::PARTICIPANT_DETECTOR) {
            self.writer
                .matched_reader_remove(Guid::new(prefix, EntityId::SPDP_READER));
        }
    }

    /// Spawn the periodic announcer (holds only a weak reference).
    pub fn spawn_announcer(self: &Arc<Self>) -> std::io::Result<PeriodicTask> {
        let period = self.announcement_period;
        let weak: Weak<Self> = Arc::downgrade(self);
        PeriodicTask::spawn("hdds-spdp-announcer", period, move || match weak.upgrade() {
            Some(pdp) => {
                pdp.announce_participant_state(false, false);
                true
            }
            None => false,
        })
    }

    /// Spawn the lease checker (holds only a weak reference).
    pub fn spawn_lease_checker(
        self: &Arc<Self>,
        period: Duration,
    ) -> std::io::Result<PeriodicTask> {
        let weak: Weak<Self> = Arc::downgrade(self);
        PeriodicTask::spawn("hdds-lease-checker", period, move || match weak.upgrade() {
            Some(pdp) => {
                pdp.expire_leases_at(Instant::now());
                true
            }
            None => false,
        })
    }
}

impl ChangeListener for ParticipantDiscovery {
    fn on_change_available(&self, _reader: Guid, change: &CacheChange) {
        crate::trace_fn!("ParticipantDiscovery::on_change_available");
        DiscoveryMetrics::bump(&self.metrics.announcements_received);
        if change.kind.is_alive() {
            self.on_announcement(change);
        } else {
            self.on_disposal(change);
        }
    }
}

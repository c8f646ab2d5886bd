// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint Discovery Protocol (SEDP).
//!
//! Local writers/readers are announced on the publications/subscriptions
//! channels; remote descriptions arriving on those channels are stored and
//! matched against local endpoints of the opposite kind.
//!
//! # Matching
//! A match is derived state: it is recomputed whenever either side changes
//! and [`MatchListener`]s only hear about transitions (no duplicate
//! `on_match` for an unchanged pair).
//!
//! # Locking
//! `locals` is always taken before `matches`; remote stores may be read
//! while `matches` is held but never the other way round. Listeners run
//! with no EDP lock held.

mod matcher;
mod store;

pub use matcher::{check_match, check_qos, Incompatibility};

use crate::builtin::BuiltinEndpointSet;
use crate::channel::{BuiltinReader, BuiltinWriter, ChannelAttributes, ChannelScope};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, InitError};
use crate::guid::{EndpointKind, EntityId, Guid, GuidPrefix};
use crate::history::{CacheChange, ChangeKind, ChangeListener, InstanceHandle};
use crate::metrics::DiscoveryMetrics;
use crate::pdp::{ParticipantListener, ParticipantRegistry, RemovalReason};
use crate::proxy::{EndpointProxyData, ParticipantProxyData};
use crate::type_lookup::types::TypeIdentifier;
use crate::wire::sedp;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use store::EndpointStore;

/// Match notifications for a local endpoint (implemented by the data path).
pub trait MatchListener: Send + Sync {
    fn on_match(&self, local: Guid, remote: &EndpointProxyData);
    fn on_unmatch(&self, local: Guid, remote: &EndpointProxyData);
}

/// Told about type identifiers seen on newly discovered remote endpoints.
pub trait TypeObserver: Send + Sync {
    fn on_type_observed(&self, endpoint: &EndpointProxyData, type_id: TypeIdentifier);
}

struct LocalEndpoint {
    data: EndpointProxyData,
    listener: Arc<dyn MatchListener>,
}

enum Notification {
    Match(Arc<dyn MatchListener>, Guid, EndpointProxyData),
    Unmatch(Arc<dyn MatchListener>, Guid, EndpointProxyData),
}

pub struct EndpointDiscovery {
    local_prefix: GuidPrefix,
    participants: Arc<ParticipantRegistry>,
    avoid_multicast: bool,
    publications_writer: Option<Arc<BuiltinWriter>>,
    publications_reader: Option<Arc<BuiltinReader>>,
    subscriptions_writer: Option<Arc<BuiltinWriter>>,
    subscriptions_reader: Option<Arc<BuiltinReader>>,
    locals: RwLock<HashMap<Guid, LocalEndpoint>>,
    remote_writers: EndpointStore,
    remote_readers: EndpointStore,
    /// (local endpoint, remote endpoint)
    matches: Mutex<HashSet<(Guid, Guid)>>,
    type_observer: RwLock<Option<Arc<dyn TypeObserver>>>,
    metrics: Arc<DiscoveryMetrics>,
}

impl EndpointDiscovery {
    /// Create the SEDP channels enabled by `config.edp`.
    pub fn new(
        config: &DiscoveryConfig,
        local_prefix: GuidPrefix,
        participants: Arc<ParticipantRegistry>,
        scope: &ChannelScope<'_>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Result<Self, InitError> {
        crate::trace_fn!("EndpointDiscovery::new");
        let guid = |entity| Guid::new(local_prefix, entity);

        let (publications_writer, subscriptions_reader) =
            if config.edp.use_publication_writer_and_subscription_reader {
                (
                    Some(scope.writer(
                        guid(EntityId::SEDP_PUBLICATIONS_WRITER),
                        EntityId::SEDP_PUBLICATIONS_READER,
                        ChannelAttributes::ENDPOINT,
                    )?),
                    Some(scope.reader(
                        guid(EntityId::SEDP_SUBSCRIPTIONS_READER),
                        ChannelAttributes::ENDPOINT,
                    )?),
                )
            } else {
                (None, None)
            };

        let (publications_reader, subscriptions_writer) =
            if config.edp.use_publication_reader_and_subscription_writer {
                (
                    Some(scope.reader(
                        guid(EntityId::SEDP_PUBLICATIONS_READER),
                        ChannelAttributes::ENDPOINT,
                    )?),
                    Some(scope.writer(
                        guid(EntityId::SEDP_SUBSCRIPTIONS_WRITER),
                        EntityId::SEDP_SUBSCRIPTIONS_READER,
                        ChannelAttributes::ENDPOINT,
                    )?),
                )
            } else {
                (None, None)
            };

        Ok(Self {
            local_prefix,
            participants,
            avoid_multicast: config.avoid_builtin_multicast,
            publications_writer,
            publications_reader,
            subscriptions_writer,
            subscriptions_reader,
            locals: RwLock::new(HashMap::new()),
            remote_writers: EndpointStore::new("writer", config.allocation.writers),
            remote_readers: EndpointStore::new("reader", config.allocation.readers),
            matches: Mutex::new(HashSet::new()),
            type_observer: RwLock::new(None),
            metrics,
        })
    }

    pub fn set_type_observer(&self, observer: Arc<dyn TypeObserver>) {
        *self.type_observer.write() = Some(observer);
    }

    pub fn publications_writer(&self) -> Option<&Arc<BuiltinWriter>> {
        self.publications_writer.as_ref()
    }

    pub fn publications_reader(&self) -> Option<&Arc<BuiltinReader>> {
        self.publications_reader.as_ref()
    }

    pub fn subscriptions_writer(&self) -> Option<&Arc<BuiltinWriter>> {
        self.subscriptions_writer.as_ref()
    }

    pub fn subscriptions_reader(&self) -> Option<&Arc<BuiltinReader>> {
        self.subscriptions_reader.as_ref()
    }

    /// Register (or update) a local writer and announce it.
    pub fn register_local_writer(
        &self,
        data: EndpointProxyData,
        listener: Arc<dyn MatchListener>,
    ) -> Result<(), DiscoveryError> {
        self.register_local(data, EndpointKind::Writer, listener)
    }

    /// Register (or update) a local reader and announce it.
    pub fn register_local_reader(
        &self,
        data: EndpointProxyData,
        listener: Arc<dyn MatchListener>,
    ) -> Result<(), DiscoveryError> {
        self.register_local(data, EndpointKind::Reader, listener)
    }

    fn register_local(
        &self,
        data: EndpointProxyData,
        kind: EndpointKind,
        listener: Arc<dyn MatchListener>,
    ) -> Result<(), DiscoveryError> {
        crate::trace_fn!("EndpointDiscovery::register_local");
        data.validate()?;
        if data.kind != kind {
            return Err(DiscoveryError::InvalidData(format!(
                "{} is not a {:?}",
                data.guid, kind
            )));
        }
        if data.guid.prefix != self.local_prefix {
            return Err(DiscoveryError::InvalidData(format!(
                "{} does not belong to the local participant",
                data.guid
            )));
        }

        let guid = data.guid;
        match self.announcer_for(kind) {
            Some(writer) => {
                writer.write(
                    sedp::encode_endpoint(&data),
                    ChangeKind::Alive,
                    InstanceHandle::from(guid),
                );
            }
            None => log::debug!("[EDP] {:?} announcements disabled, {} not sent", kind, guid),
        }
        log::debug!(
            "[EDP] local {:?} {} on '{}' ({})",
            kind,
            guid,
            data.topic_name,
            data.type_name
        );
        self.locals
            .write()
            .insert(guid, LocalEndpoint { data, listener });
        self.rematch_local(&guid);
        Ok(())
    }

    /// Remove a local endpoint, announce its disposal and drop its matches.
    pub fn unregister_local_endpoint(&self, guid: &Guid) -> Result<(), DiscoveryError> {
        crate::trace_fn!("EndpointDiscovery::unregister_local_endpoint");
        let (local, pairs) = {
            let mut locals = self.locals.write();
            let local = locals
                .remove(guid)
                .ok_or(DiscoveryError::EndpointNotFound(*guid))?;
            let mut matches = self.matches.lock();
            let pairs: Vec<(Guid, Guid)> =
                matches.iter().filter(|(l, _)| l == guid).copied().collect();
            for pair in &pairs {
                matches.remove(pair);
            }
            (local, pairs)
        };

        if let Some(writer) = self.announcer_for(local.data.kind) {
            writer.write(
                sedp::encode_endpoint_key(guid),
                ChangeKind::NotAliveDisposed,
                InstanceHandle::from(*guid),
            );
        }

        let remotes = self.remote_store(opposite(local.data.kind));
        for (_, remote) in pairs {
            if let Some(remote) = remotes.get(&remote) {
                local.listener.on_unmatch(*guid, &remote);
            }
        }
        Ok(())
    }

    /// Remote endpoints currently matched with `local`.
    pub fn matched_remotes(&self, local: &Guid) -> Vec<Guid> {
        let mut out: Vec<Guid> = self
            .matches
            .lock()
            .iter()
            .filter(|(l, _)| l == local)
            .map(|(_, remote)| *remote)
            .collect();
        out.sort();
        out
    }

    pub fn is_matched(&self, local: &Guid, remote: &Guid) -> bool {
        self.matches.lock().contains(&(*local, *remote))
    }

    pub fn match_count(&self) -> usize {
        self.matches.lock().len()
    }

    pub fn remote_endpoint(&self, guid: &Guid) -> Option<EndpointProxyData> {
        self.remote_writers
            .get(guid)
            .or_else(|| self.remote_readers.get(guid))
    }

    pub fn remote_writer_count(&self) -> usize {
        self.remote_writers.len()
    }

    pub fn remote_reader_count(&self) -> usize {
        self.remote_readers.len()
    }

    pub fn local_endpoint_count(&self) -> usize {
        self.locals.read().len()
    }

    /// Attach SEDP channels to a newly discovered participant.
    pub fn assign_remote_endpoints(&self, participant: &ParticipantProxyData) {
        crate::trace_fn!("EndpointDiscovery::assign_remote_endpoints");
        let prefix = participant.prefix();
        let endpoints = participant.builtin_endpoints;
        let locators = participant.metatraffic_locators(self.avoid_multicast);

        if let Some(writer) = &self.publications_writer {
            if endpoints.contains(BuiltinEndpointSet::PUBLICATION_DETECTOR) {
                writer.matched_reader_add(
                    Guid::new(prefix, EntityId::SEDP_PUBLICATIONS_READER),
                    locators.clone(),
                );
            }
        }
        if let Some(reader) = &self.publications_reader {
            if endpoints.contains(BuiltinEndpointSet::PUBLICATION_ANNOUNCER) {
                reader.matched_writer_add(Guid::new(prefix, EntityId::SEDP_PUBLICATIONS_WRITER));
            }
        }
        if let Some(writer) = &self.subscriptions_writer {
            if endpoints.contains(BuiltinEndpointSet::SUBSCRIPTION_DETECTOR) {
                writer.matched_reader_add(
                    Guid::new(prefix, EntityId::SEDP_SUBSCRIPTIONS_READER),
                    locators,
                );
            }
        }
        if let Some(reader) = &self.subscriptions_reader {
            if endpoints.contains(BuiltinEndpointSet::SUBSCRIPTION_ANNOUNCER) {
                reader.matched_writer_add(Guid::new(prefix, EntityId::SEDP_SUBSCRIPTIONS_WRITER));
            }
        }
    }

    /// Detach SEDP channels from a removed participant.
    pub fn remove_remote_endpoints(&self, participant: &ParticipantProxyData) {
        let prefix = participant.prefix();
        let endpoints = participant.builtin_endpoints;

        if let Some(writer) = &self.publications_writer {
            if endpoints.contains(BuiltinEndpointSet::PUBLICATION_DETECTOR) {
                writer.matched_reader_remove(Guid::new(prefix, EntityId::SEDP_PUBLICATIONS_READER));
            }
        }
        if let Some(reader) = &self.publications_reader {
            if endpoints.contains(BuiltinEndpointSet::PUBLICATION_ANNOUNCER) {
                reader.matched_writer_remove(Guid::new(prefix, EntityId::SEDP_PUBLICATIONS_WRITER));
            }
        }
        if let Some(writer) = &self.subscriptions_writer {
            if endpoints.contains(BuiltinEndpointSet::SUBSCRIPTION_DETECTOR) {
                writer.matched_reader_remove(Guid::new(
                    prefix,
                    EntityId::SEDP_SUBSCRIPTIONS_READER,
                ));
            }
        }
        if let Some(reader) = &self.subscriptions_reader {
            if endpoints.contains(BuiltinEndpointSet::SUBSCRIPTION_ANNOUNCER) {
                reader.matched_writer_remove(Guid::new(
                    prefix,
                    EntityId::SEDP_SUBSCRIPTIONS_WRITER,
                ));
            }
        }
    }

    /// Drop every remote endpoint owned by `prefix` (unmatching as needed).
    pub fn remove_participant_endpoints(&self, prefix: &GuidPrefix) -> usize {
        let mut removed = 0;
        for store in [&self.remote_writers, &self.remote_readers] {
            for guid in store.owned_by(prefix) {
                if self.remove_remote_endpoint(&guid) {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Forget a remote endpoint and unmatch every local endpoint matched
    /// with it.
    pub fn remove_remote_endpoint(&self, guid: &Guid) -> bool {
        crate::trace_fn!("EndpointDiscovery::remove_remote_endpoint");
        let Some(data) = self
            .remote_writers
            .remove(guid)
            .or_else(|| self.remote_readers.remove(guid))
        else {
            return false;
        };
        DiscoveryMetrics::bump(&self.metrics.endpoints_removed);
        log::debug!("[EDP] remote {:?} {} removed", data.kind, guid);

        let notifications: Vec<Notification> = {
            let locals = self.locals.read();
            let mut matches = self.matches.lock();
            let pairs: Vec<(Guid, Guid)> =
                matches.iter().filter(|(_, r)| r == guid).copied().collect();
            pairs
                .into_iter()
                .filter_map(|pair| {
                    matches.remove(&pair);
                    locals.get(&pair.0).map(|local| {
                        Notification::Unmatch(Arc::clone(&local.listener), pair.0, data.clone())
                    })
                })
                .collect()
        };
        dispatch(notifications);
        true
    }

    fn on_remote_description(&self, change: &CacheChange, expected: EndpointKind) {
        let data = match sedp::decode_endpoint(&change.payload) {
            Ok(data) => data,
            Err(err) => {
                log::debug!("[EDP] dropping malformed endpoint description: {}", err);
                DiscoveryMetrics::bump(&self.metrics.dropped_samples);
                return;
            }
        };
        if data.guid.prefix == self.local_prefix {
            return;
        }
        if data.kind != expected {
            log::debug!(
                "[EDP] {:?} {} announced on the {:?} channel",
                data.kind,
                data.guid,
                expected
            );
            DiscoveryMetrics::bump(&self.metrics.dropped_samples);
            return;
        }
        if let Err(err) = data.validate() {
            log::debug!("[EDP] dropping endpoint {}: {}", data.guid, err);
            DiscoveryMetrics::bump(&self.metrics.dropped_samples);
            return;
        }
        // Endpoint data may overtake the owner's announcement: drop it, the
        // owner re-sends after discovery.
        if !self.participants.is_alive(&data.guid.prefix) {
            log::debug!(
                "[EDP] endpoint {} from unknown participant, dropped",
                data.guid
            );
            DiscoveryMetrics::bump(&self.metrics.dropped_samples);
            return;
        }

        let store = self.remote_store(data.kind);
        let is_new = match store.upsert(&data) {
            Ok(is_new) => is_new,
            Err(err) => {
                log::warn!("[EDP] discarding endpoint {}: {}", data.guid, err);
                DiscoveryMetrics::bump(&self.metrics.pool_exhausted);
                return;
            }
        };
        // The owner may have been removed while we were inserting.
        if !self.participants.is_alive(&data.guid.prefix) {
            self.remove_remote_endpoint(&data.guid);
            return;
        }

        if is_new {
            DiscoveryMetrics::bump(&self.metrics.endpoints_discovered);
            log::info!(
                "[EDP] discovered remote {:?} {} on '{}' ({})",
                data.kind,
                data.guid,
                data.topic_name,
                data.type_name
            );
            if let Some(type_id) = data.type_id {
                let observer = self.type_observer.read().clone();
                if let Some(observer) = observer {
                    observer.on_type_observed(&data, type_id);
                }
            }
        }
        self.rematch_remote(&data);
    }

    fn on_remote_disposal(&self, change: &CacheChange, expected: EndpointKind) {
        let guid = match sedp::decode_endpoint_key(&change.payload) {
            Ok(guid) => guid,
            Err(_) if !change.instance_handle.is_nil() => change.instance_handle.to_guid(),
            Err(err) => {
                log::debug!("[EDP] dropping disposal without key: {}", err);
                DiscoveryMetrics::bump(&self.metrics.dropped_samples);
                return;
            }
        };
        if guid.entity_id.endpoint_kind() != Some(expected) {
            log::debug!(
                "[EDP] disposal of {} on the {:?} channel ignored",
                guid,
                expected
            );
            DiscoveryMetrics::bump(&self.metrics.dropped_samples);
            return;
        }
        if self.remote_store(expected).contains(&guid) {
            self.remove_remote_endpoint(&guid);
        }
    }

    /// Recompute matches of one remote endpoint against every local one.
    fn rematch_remote(&self, remote: &EndpointProxyData) {
        let notifications: Vec<Notification> = {
            let locals = self.locals.read();
            let mut matches = self.matches.lock();
            let still_known = self.remote_store(remote.kind).contains(&remote.guid);
            locals
                .iter()
                .filter(|(_, local)| local.data.kind != remote.kind)
                .filter_map(|(guid, local)| {
                    let compatible = still_known && check_match(&local.data, remote).is_ok();
                    transition(
                        &mut matches,
                        (*guid, remote.guid),
                        compatible,
                        &local.listener,
                        remote,
                    )
                })
                .collect()
        };
        dispatch(notifications);
    }

    /// Recompute matches of one local endpoint against every remote one.
    fn rematch_local(&self, local_guid: &Guid) {
        let notifications: Vec<Notification> = {
            let locals = self.locals.read();
            let Some(local) = locals.get(local_guid) else {
                return;
            };
            let remotes = self.remote_store(opposite(local.data.kind)).snapshot();
            let mut matches = self.matches.lock();
            remotes
                .iter()
                .filter_map(|remote| {
                    let compatible = check_match(&local.data, remote).is_ok();
                    transition(
                        &mut matches,
                        (*local_guid, remote.guid),
                        compatible,
                        &local.listener,
                        remote,
                    )
                })
                .collect()
        };
        dispatch(notifications);
    }

    fn remote_store(&self, kind: EndpointKind) -> &EndpointStore {
        match kind {
            EndpointKind::Writer => &self.remote_writers,
            EndpointKind::Reader => &self.remote_readers,
        }
    }

    fn announcer_for(&self, kind: EndpointKind) -> Option<&Arc<BuiltinWriter>> {
        match kind {
            EndpointKind::Writer => self.publications_writer.as_ref(),
            EndpointKind::Reader => self.subscriptions_writer.as_ref(),
        }
    }
}

fn opposite(kind: EndpointKind) -> EndpointKind {
    match kind {
        EndpointKind::Writer => EndpointKind::Reader,
        EndpointKind::Reader => EndpointKind::Writer,
    }
}

fn transition(
    matches: &mut HashSet<(Guid, Guid)>,
    pair: (Guid, Guid),
    compatible: bool,
    listener: &Arc<dyn MatchListener>,
    remote: &EndpointProxyData,
) -> Option<Notification> {
    let matched = matches.contains(&pair);
    if compatible && !matched {
        matches.insert(pair);
        log::debug!("[EDP] match {} <-> {}", pair.0, pair.1);
        Some(Notification::Match(Arc::clone(listener), pair.0, remote.clone()))
    } else if !compatible && matched {
        matches.remove(&pair);
        log::debug!("[EDP] unmatch {} <-> {}", pair.0, pair.1);
        Some(Notification::Unmatch(Arc::clone(listener), pair.0, remote.clone()))
    } else {
        None
    }
}

fn dispatch(notifications: Vec<Notification>) {
    for notification in notifications {
        match notification {
            Notification::Match(listener, local, remote) => listener.on_match(local, &remote),
            Notification::Unmatch(listener, local, remote) => listener.on_unmatch(local, &remote),
        }
    }
}

impl ChangeListener for EndpointDiscovery {
    fn on_change_available(&self, reader: Guid, change: &CacheChange) {
        crate::trace_fn!("EndpointDiscovery::on_change_available");
        let expected = if reader.entity_id == EntityId::SEDP_PUBLICATIONS_READER {
            EndpointKind::Writer
        } else if reader.entity_id == EntityId::SEDP_SUBSCRIPTIONS_READER {
            EndpointKind::Reader
        } else {
            log::debug!("[EDP] change for unexpected reader {:?}", reader.entity_id);
            return;
        };
        if change.kind.is_alive() {
            self.on_remote_description(change, expected);
        } else {
            self.on_remote_disposal(change, expected);
        }
    }
}

impl ParticipantListener for EndpointDiscovery {
    fn on_participant_discovered(&self, participant: &ParticipantProxyData) {
        self.assign_remote_endpoints(participant);
    }

    fn on_participant_removed(&self, participant: &ParticipantProxyData, reason: RemovalReason) {
        let removed = self.remove_participant_endpoints(&participant.prefix());
        log::debug!(
            "[EDP] participant {} gone ({:?}), {} endpoint(s) dropped",
            participant.guid,
            reason,
            removed
        );
        self.remove_remote_endpoints(participant);
    }
}

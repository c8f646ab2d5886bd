// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin discovery channels.
//!
//! A channel is one directional, sequence-numbered data path: a
//! [`BuiltinWriter`] on one participant feeding [`BuiltinReader`]s on peers.
//! Delivery goes through the [`Transport`] collaborator; reliability
//! mechanics (heartbeats, repair) belong to the transport, discovery only
//! consumes the ordered change log.
//!
//! Readers do not store listeners. The component that owns a reader passes
//! itself as the [`ChangeListener`] when it feeds a change in, so there is
//! no reference cycle between channels and discovery components.

use crate::guid::{EntityId, Guid, GuidPrefix};
use crate::history::{
    CacheChange, ChangeKind, ChangeListener, InstanceHandle, ReaderHistory, SequenceNumber,
    WriterHistory,
};
use crate::locator::Locator;
use crate::qos::{Durability, Reliability};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Channel creation failure reported by a [`ChannelFactory`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ChannelError(pub String);

/// Reliability/durability of a builtin channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAttributes {
    pub reliability: Reliability,
    pub durability: Durability,
}

impl ChannelAttributes {
    /// SPDP: best effort, last announcement kept for periodic re-send.
    pub const PARTICIPANT: Self = Self {
        reliability: Reliability::BestEffort,
        durability: Durability::TransientLocal,
    };

    /// SEDP: reliable, endpoint descriptions replayed to late joiners.
    pub const ENDPOINT: Self = Self {
        reliability: Reliability::Reliable,
        durability: Durability::TransientLocal,
    };

    /// Type lookup request/reply: reliable, volatile.
    pub const TYPE_LOOKUP: Self = Self {
        reliability: Reliability::Reliable,
        durability: Durability::Volatile,
    };

    fn keeps_history(&self) -> bool {
        self.durability.rank() >= Durability::TransientLocal.rank()
    }
}

/// Where a change goes: a reader GUID plus the locators to reach it.
///
/// A reader with an unknown prefix addresses whoever listens on the
/// locators (multicast group or initial peer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub reader: Guid,
    pub locators: Vec<Locator>,
}

/// Transport collaborator.
pub trait Transport: Send + Sync {
    fn send(&self, destinations: &[Destination], change: &CacheChange);
}

/// Outbound builtin channel.
pub struct BuiltinWriter {
    guid: Guid,
    remote_reader: EntityId,
    attributes: ChannelAttributes,
    history: WriterHistory,
    transport: Arc<dyn Transport>,
    matched_readers: RwLock<BTreeMap<Guid, Vec<Locator>>>,
    fixed_destinations: RwLock<Vec<Locator>>,
}

impl std::fmt::Debug for BuiltinWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinWriter")
            .field("guid", &self.guid)
            .field("remote_reader", &self.remote_reader)
            .finish_non_exhaustive()
    }
}

impl BuiltinWriter {
    /// `remote_reader` is the entity id of the counterpart reader on peers.
    pub fn new(
        guid: Guid,
        remote_reader: EntityId,
        attributes: ChannelAttributes,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            guid,
            remote_reader,
            attributes,
            history: WriterHistory::new(guid, attributes.keeps_history()),
            transport,
            matched_readers: RwLock::new(BTreeMap::new()),
            fixed_destinations: RwLock::new(Vec::new()),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn remote_reader(&self) -> EntityId {
        self.remote_reader
    }

    pub fn attributes(&self) -> ChannelAttributes {
        self.attributes
    }

    pub fn history(&self) -> &WriterHistory {
        &self.history
    }

    /// Locators that receive every change regardless of matching.
    pub fn set_fixed_destinations(&self, locators: Vec<Locator>) {
        *self.fixed_destinations.write() = locators;
    }

    /// Append a change and send it to every destination.
    pub fn write(
        &self,
        payload: Vec<u8>,
        kind: ChangeKind,
        instance_handle: InstanceHandle,
    ) -> SequenceNumber {
        let change = self.history.append(payload, kind, instance_handle);
        let destinations = self.destinations();
        if !destinations.is_empty() {
            self.transport.send(&destinations, &change);
        }
        // Best-effort volatile changes are done once dispatched.
        if self.attributes.reliability == Reliability::BestEffort
            && !self.attributes.keeps_history()
        {
            self.history.remove(change.sequence_number);
        }
        change.sequence_number
    }

    /// Re-send every retained change to every destination.
    pub fn resend_history(&self) {
        let destinations = self.destinations();
        if destinations.is_empty() {
            return;
        }
        for change in self.history.changes() {
            self.transport.send(&destinations, &change);
        }
    }

    /// Delivery acknowledged up to `sequence_number` (reliable volatile
    /// channels drop acknowledged changes).
    pub fn acknowledge(&self, sequence_number: SequenceNumber) -> usize {
        if self.attributes.reliability != Reliability::Reliable || self.attributes.keeps_history()
        {
            return 0;
        }
        self.history.remove_up_to(sequence_number)
    }

    /// Start sending to a remote reader. Transient-local history is replayed
    /// to it right away. Returns `false` if it was already matched.
    pub fn matched_reader_add(&self, reader: Guid, locators: Vec<Locator>) -> bool {
        let destination = Destination {
            reader,
            locators: locators.clone(),
        };
        {
            let mut matched = self.matched_readers.write();
            if matched.contains_key(&reader) {
                matched.insert(reader, locators);
                return false;
            }
            matched.insert(reader, locators);
        }
        if self.attributes.keeps_history() {
            for change in self.history.changes() {
                self.transport
                    .send(std::slice::from_ref(&destination), &change);
            }
        }
        true
    }

    pub fn matched_reader_remove(&self, reader: Guid) -> bool {
        self.matched_readers.write().remove(&reader).is_some()
    }

    pub fn is_matched(&self, reader: Guid) -> bool {
        self.matched_readers.read().contains_key(&reader)
    }

    pub fn matched_reader_count(&self) -> usize {
        self.matched_readers.read().len()
    }

    fn destinations(&self) -> Vec<Destination> {
        let mut out: Vec<Destination> = self
            .matched_readers
            .read()
            .iter()
            .map(|(reader, locators)| Destination {
                reader: *reader,
                locators: locators.clone(),
            })
            .collect();
        let fixed = self.fixed_destinations.read();
        if !fixed.is_empty() {
            out.push(Destination {
                reader: Guid::new(GuidPrefix::UNKNOWN, self.remote_reader),
                locators: fixed.clone(),
            });
        }
        out
    }
}

/// Inbound builtin channel.
pub struct BuiltinReader {
    guid: Guid,
    attributes: ChannelAttributes,
    stateless: bool,
    history: ReaderHistory,
    matched_writers: RwLock<HashSet<Guid>>,
}

impl BuiltinReader {
    /// Best-effort readers are stateless: they accept changes from any
    /// writer. Reliable readers only accept matched writers.
    pub fn new(guid: Guid, attributes: ChannelAttributes) -> Self {
        let stateless = attributes.reliability == Reliability::BestEffort;
        Self {
            guid,
            attributes,
            stateless,
            history: if stateless {
                ReaderHistory::stateless()
            } else {
                ReaderHistory::new()
            },
            matched_writers: RwLock::new(HashSet::new()),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn attributes(&self) -> ChannelAttributes {
        self.attributes
    }

    pub fn history(&self) -> &ReaderHistory {
        &self.history
    }

    pub fn matched_writer_add(&self, writer: Guid) -> bool {
        self.matched_writers.write().insert(writer)
    }

    pub fn matched_writer_remove(&self, writer: Guid) -> bool {
        let removed = self.matched_writers.write().remove(&writer);
        if removed {
            self.history.remove_writer(writer);
        }
        removed
    }

    pub fn is_matched(&self, writer: Guid) -> bool {
        self.matched_writers.read().contains(&writer)
    }

    pub fn matched_writer_count(&self) -> usize {
        self.matched_writers.read().len()
    }

    /// Feed an inbound change. The listener runs once per accepted change;
    /// the change leaves the history right after dispatch.
    pub fn receive(&self, change: &CacheChange, listener: &dyn ChangeListener) -> bool {
        if !self.stateless && !self.is_matched(change.writer_guid) {
            log::debug!(
                "[history] {:?}: drop change from unmatched writer {}",
                self.guid.entity_id,
                change.writer_guid
            );
            return false;
        }
        if !self.history.received(change) {
            return false;
        }
        listener.on_change_available(self.guid, change);
        self.history
            .remove(change.writer_guid, change.sequence_number);
        true
    }
}

/// Creates builtin channels; creation may fail (resources, transport).
pub trait ChannelFactory: Send + Sync {
    fn create_writer(
        &self,
        guid: Guid,
        remote_reader: EntityId,
        attributes: ChannelAttributes,
    ) -> Result<Arc<BuiltinWriter>, ChannelError>;

    fn create_reader(
        &self,
        guid: Guid,
        attributes: ChannelAttributes,
    ) -> Result<Arc<BuiltinReader>, ChannelError>;

    /// Release a channel previously created by this factory.
    fn delete_channel(&self, guid: Guid);
}

/// Factory that builds channels over a shared transport.
pub struct TransportChannelFactory {
    transport: Arc<dyn Transport>,
}

impl TransportChannelFactory {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl ChannelFactory for TransportChannelFactory {
    fn create_writer(
        &self,
        guid: Guid,
        remote_reader: EntityId,
        attributes: ChannelAttributes,
    ) -> Result<Arc<BuiltinWriter>, ChannelError> {
        Ok(Arc::new(BuiltinWriter::new(
            guid,
            remote_reader,
            attributes,
            Arc::clone(&self.transport),
        )))
    }

    fn create_reader(
        &self,
        guid: Guid,
        attributes: ChannelAttributes,
    ) -> Result<Arc<BuiltinReader>, ChannelError> {
        Ok(Arc::new(BuiltinReader::new(guid, attributes)))
    }

    fn delete_channel(&self, _guid: Guid) {}
}

/// Tracks channels created during protocol init so a failure can release
/// everything created before it.
pub struct ChannelScope<'a> {
    factory: &'a dyn ChannelFactory,
    created: Mutex<Vec<Guid>>,
}

impl<'a> ChannelScope<'a> {
    pub fn new(factory: &'a dyn ChannelFactory) -> Self {
        Self {
            factory,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn writer(
        &self,
        guid: Guid,
        remote_reader: EntityId,
        attributes: ChannelAttributes,
    ) -> Result<Arc<BuiltinWriter>, crate::error::InitError> {
        let writer = self
            .factory
            .create_writer(guid, remote_reader, attributes)
            .map_err(|e| init_error(guid, e))?;
        self.created.lock().push(guid);
        Ok(writer)
    }

    pub fn reader(
        &self,
        guid: Guid,
        attributes: ChannelAttributes,
    ) -> Result<Arc<BuiltinReader>, crate::error::InitError> {
        let reader = self
            .factory
            .create_reader(guid, attributes)
            .map_err(|e| init_error(guid, e))?;
        self.created.lock().push(guid);
        Ok(reader)
    }

    /// Release every channel created through this scope (newest first).
    pub fn rollback(self) {
        let created = std::mem::take(&mut *self.created.lock());
        for guid in created.into_iter().rev() {
            log::debug!("[builtin] releasing partially created channel {}", guid);
            self.factory.delete_channel(guid);
        }
    }

    /// Keep the channels; returns their GUIDs for later release.
    pub fn commit(self) -> Vec<Guid> {
        std::mem::take(&mut *self.created.lock())
    }
}

fn init_error(guid: Guid, err: ChannelError) -> crate::error::InitError {
    log::error!(
        "[builtin] failed to create channel {:?}: {}",
        guid.entity_id,
        err
    );
    crate::error::InitError {
        entity: guid.entity_id,
        reason: err.0,
    }
}

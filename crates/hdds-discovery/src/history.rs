// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Change logs for the builtin discovery channels.
//!
//! Writer side: sequence numbers are assigned on append, starting at 1 and
//! strictly increasing. Reader side (stateful): changes are accepted once per
//! (writer, sequence number); anything at or below the highest number seen
//! from that writer is a duplicate and is discarded. Stateless readers keep
//! no per-writer state and accept every change, so periodic re-sends of the
//! same announcement still reach the listener.

use crate::guid::Guid;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SequenceNumber = i64;

/// Change kind (RTPS ChangeKind_t).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Alive,
    NotAliveDisposed,
    NotAliveUnregistered,
}

impl ChangeKind {
    pub fn is_alive(self) -> bool {
        matches!(self, ChangeKind::Alive)
    }
}

/// Key of the instance a change belongs to (the described entity's GUID for
/// discovery topics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceHandle(pub [u8; 16]);

impl From<Guid> for InstanceHandle {
    fn from(guid: Guid) -> Self {
        InstanceHandle(guid.as_bytes())
    }
}

impl InstanceHandle {
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }

    pub fn to_guid(self) -> Guid {
        Guid::from_bytes(self.0)
    }
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheChange {
    pub writer_guid: Guid,
    pub sequence_number: SequenceNumber,
    pub kind: ChangeKind,
    pub instance_handle: InstanceHandle,
    pub payload: Arc<[u8]>,
}

/// Capability handed to a reader channel: invoked once per accepted change.
pub trait ChangeListener: Send + Sync {
    fn on_change_available(&self, reader: Guid, change: &CacheChange);
}

struct WriterHistoryInner {
    next_sequence: SequenceNumber,
    changes: BTreeMap<SequenceNumber, CacheChange>,
}

/// Outbound change log of one builtin writer.
pub struct WriterHistory {
    writer_guid: Guid,
    keep_latest_per_instance: bool,
    inner: Mutex<WriterHistoryInner>,
}

impl WriterHistory {
    /// `keep_latest_per_instance` replaces older changes of the same instance
    /// on append (transient-local discovery data).
    pub fn new(writer_guid: Guid, keep_latest_per_instance: bool) -> Self {
        Self {
            writer_guid,
            keep_latest_per_instance,
            inner: Mutex::new(WriterHistoryInner {
                next_sequence: 1,
                changes: BTreeMap::new(),
            }),
        }
    }

    /// Append a change and return it with its assigned sequence number.
    pub fn append(
        &self,
        payload: Vec<u8>,
        kind: ChangeKind,
        instance_handle: InstanceHandle,
    ) -> CacheChange {
        let mut inner = self.inner.lock();
        let sequence_number = inner.next_sequence;
        inner.next_sequence += 1;

        if self.keep_latest_per_instance {
            inner
                .changes
                .retain(|_, change| change.instance_handle != instance_handle);
        }

        let change = CacheChange {
            writer_guid: self.writer_guid,
            sequence_number,
            kind,
            instance_handle,
            payload: Arc::from(payload),
        };
        inner.changes.insert(sequence_number, change.clone());
        change
    }

    pub fn remove(&self, sequence_number: SequenceNumber) -> bool {
        self.inner.lock().changes.remove(&sequence_number).is_some()
    }

    /// Remove every change up to and including `sequence_number`.
    pub fn remove_up_to(&self, sequence_number: SequenceNumber) -> usize {
        let mut inner = self.inner.lock();
        let keep = inner.changes.split_off(&(sequence_number + 1));
        let removed = inner.changes.len();
        inner.changes = keep;
        removed
    }

    pub fn get(&self, sequence_number: SequenceNumber) -> Option<CacheChange> {
        self.inner.lock().changes.get(&sequence_number).cloned()
    }

    /// Snapshot of the retained changes in sequence order.
    pub fn changes(&self) -> Vec<CacheChange> {
        self.inner.lock().changes.values().cloned().collect()
    }

    pub fn last_change(&self) -> Option<CacheChange> {
        self.inner
            .lock()
            .changes
            .values()
            .next_back()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest sequence number assigned so far (0 before the first append).
    pub fn last_sequence_number(&self) -> SequenceNumber {
        self.inner.lock().next_sequence - 1
    }
}

/// Inbound change log of one builtin reader.
pub struct ReaderHistory {
    filter_duplicates: bool,
    highest_received: DashMap<Guid, SequenceNumber>,
    pending: Mutex<BTreeMap<(Guid, SequenceNumber), CacheChange>>,
}

impl ReaderHistory {
    /// History of a stateful reader (duplicates filtered per writer).
    pub fn new() -> Self {
        Self {
            filter_duplicates: true,
            highest_received: DashMap::new(),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// History of a stateless reader (no per-writer sequence tracking).
    pub fn stateless() -> Self {
        Self {
            filter_duplicates: false,
            ..Self::new()
        }
    }

    /// Store `change` unless it is a duplicate. Returns `false` for duplicates.
    pub fn received(&self, change: &CacheChange) -> bool {
        if self.filter_duplicates {
            let mut highest = self
                .highest_received
                .entry(change.writer_guid)
                .or_insert(0);
            if change.sequence_number <= *highest {
                log::debug!(
                    "[history] duplicate seq {} from {} (highest {})",
                    change.sequence_number,
                    change.writer_guid,
                    *highest
                );
                return false;
            }
            *highest = change.sequence_number;
        }
        self.pending.lock().insert(
            (change.writer_guid, change.sequence_number),
            change.clone(),
        );
        true
    }

    pub fn remove(&self, writer_guid: Guid, sequence_number: SequenceNumber) -> bool {
        self.pending
            .lock()
            .remove(&(writer_guid, sequence_number))
            .is_some()
    }

    /// Forget a writer (after it was unmatched).
    pub fn remove_writer(&self, writer_guid: Guid) {
        self.highest_received.remove(&writer_guid);
        self.pending
            .lock()
            .retain(|(writer, _), _| *writer != writer_guid);
    }

    pub fn highest_received(&self, writer_guid: Guid) -> Option<SequenceNumber> {
        self.highest_received.get(&writer_guid).map(|seq| *seq)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReaderHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{EntityId, GuidPrefix};

    fn writer_guid() -> Guid {
        Guid::new(GuidPrefix([1; 12]), EntityId::SPDP_WRITER)
    }

    #[test]
    fn test_sequence_numbers_monotonic() {
        let history = WriterHistory::new(writer_guid(), false);
        let a = history.append(vec![1], ChangeKind::Alive, InstanceHandle([1; 16]));
        let b = history.append(vec![2], ChangeKind::Alive, InstanceHandle([2; 16]));
        assert_eq!(a.sequence_number, 1);
        assert_eq!(b.sequence_number, 2);
        assert_eq!(history.len(), 2);

        assert!(history.remove(1));
        assert!(!history.remove(1));
        assert_eq!(history.last_sequence_number(), 2);
    }

    #[test]
    fn test_keep_latest_per_instance() {
        let history = WriterHistory::new(writer_guid(), true);
        history.append(vec![1], ChangeKind::Alive, InstanceHandle([1; 16]));
        history.append(vec![2], ChangeKind::Alive, InstanceHandle([2; 16]));
        history.append(vec![3], ChangeKind::NotAliveDisposed, InstanceHandle([1; 16]));

        let changes = history.changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].sequence_number, 2);
        assert_eq!(changes[1].kind, ChangeKind::NotAliveDisposed);
    }

    #[test]
    fn test_remove_up_to() {
        let history = WriterHistory::new(writer_guid(), false);
        for i in 0..5u8 {
            history.append(vec![i], ChangeKind::Alive, InstanceHandle([i; 16]));
        }
        assert_eq!(history.remove_up_to(3), 3);
        assert_eq!(history.changes()[0].sequence_number, 4);
    }

    #[test]
    fn test_reader_discards_duplicates() {
        let writer = WriterHistory::new(writer_guid(), false);
        let reader = ReaderHistory::new();
        let c1 = writer.append(vec![1], ChangeKind::Alive, InstanceHandle::default());
        let c2 = writer.append(vec![2], ChangeKind::Alive, InstanceHandle::default());

        assert!(reader.received(&c1));
        assert!(reader.received(&c2));
        assert!(!reader.received(&c1));
        assert!(!reader.received(&c2));
        assert_eq!(reader.highest_received(writer_guid()), Some(2));

        reader.remove_writer(writer_guid());
        assert!(reader.is_empty());
        assert!(reader.received(&c1));
    }

    #[test]
    fn test_stateless_reader_accepts_resends() {
        let writer = WriterHistory::new(writer_guid(), true);
        let reader = ReaderHistory::stateless();
        let c1 = writer.append(vec![1], ChangeKind::Alive, InstanceHandle::default());

        assert!(reader.received(&c1));
        assert!(reader.remove(c1.writer_guid, c1.sequence_number));
        assert!(reader.received(&c1));
        assert_eq!(reader.highest_received(writer_guid()), None);
    }
}

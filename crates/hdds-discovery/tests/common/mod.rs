// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory discovery network shared by the integration tests.
//!
//! Every participant sends through the same [`Bus`]. Sends are queued and
//! only delivered by [`Bus::pump`], so tests control interleaving. A
//! destination with an unknown prefix reaches every other participant
//! (multicast); otherwise only the participant owning the prefix.

#![allow(dead_code)]

use hdds_discovery::type_lookup::types::{TypeIdentifier, TypeIdentifierWithSize};
use hdds_discovery::type_lookup::{GetTypesOut, ReturnCode};
use hdds_discovery::{
    BuiltinProtocols, CacheChange, Destination, DiscoveryConfig, EndpointProxyData, Guid,
    GuidPrefix, InMemoryTypeRegistry, MatchListener, SampleIdentity, Transport,
    TransportChannelFactory, TypeLookupListener, TypeRegistry,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Upper bound on deliveries per pump (guards against send loops).
const MAX_DELIVERIES: usize = 100_000;

struct Delivery {
    from: GuidPrefix,
    reader: Guid,
    change: CacheChange,
}

#[derive(Default)]
pub struct Bus {
    queue: Mutex<VecDeque<Delivery>>,
    nodes: Mutex<Vec<Arc<BuiltinProtocols>>>,
    sent: Mutex<Vec<(Guid, CacheChange)>>,
}

impl Bus {
    pub fn new() -> Arc<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        Arc::new(Self::default())
    }

    /// Init a participant attached to this bus.
    pub fn node(
        self: &Arc<Self>,
        prefix: GuidPrefix,
        config: DiscoveryConfig,
        registry: Arc<dyn TypeRegistry>,
    ) -> Arc<BuiltinProtocols> {
        let transport = Arc::new(BusTransport {
            bus: Arc::clone(self),
        });
        let protocols = BuiltinProtocols::init(
            config,
            prefix,
            Arc::new(TransportChannelFactory::new(transport)),
            registry,
        )
        .expect("init participant");
        let protocols = Arc::new(protocols);
        self.nodes.lock().push(Arc::clone(&protocols));
        protocols
    }

    /// Detach a participant: queued traffic to it is dropped from now on.
    pub fn detach(&self, prefix: GuidPrefix) {
        self.nodes.lock().retain(|node| node.local_prefix() != prefix);
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drop everything queued without delivering it.
    pub fn discard(&self) -> usize {
        let mut queue = self.queue.lock();
        let n = queue.len();
        queue.clear();
        n
    }

    /// Every (destination reader, change) handed to the bus so far.
    pub fn sent(&self) -> Vec<(Guid, CacheChange)> {
        self.sent.lock().clone()
    }

    /// Deliver queued changes (including the ones produced while
    /// delivering) until the bus is idle. Returns the number of deliveries.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            let Some(delivery) = self.queue.lock().pop_front() else {
                return delivered;
            };
            let targets: Vec<Arc<BuiltinProtocols>> = self
                .nodes
                .lock()
                .iter()
                .filter(|node| {
                    let prefix = node.local_prefix();
                    if delivery.reader.prefix.is_unknown() {
                        prefix != delivery.from
                    } else {
                        prefix == delivery.reader.prefix
                    }
                })
                .cloned()
                .collect();
            for node in targets {
                // Readers a node does not run are simply not reachable.
                let _ = node.receive(delivery.reader.entity_id, &delivery.change);
                delivered += 1;
            }
            assert!(delivered < MAX_DELIVERIES, "bus did not settle");
        }
    }
}

struct BusTransport {
    bus: Arc<Bus>,
}

impl Transport for BusTransport {
    fn send(&self, destinations: &[Destination], change: &CacheChange) {
        let mut queue = self.bus.queue.lock();
        let mut sent = self.bus.sent.lock();
        for destination in destinations {
            sent.push((destination.reader, change.clone()));
            queue.push_back(Delivery {
                from: change.writer_guid.prefix,
                reader: destination.reader,
                change: change.clone(),
            });
        }
    }
}

pub fn prefix(host: u32, participant: u16) -> GuidPrefix {
    GuidPrefix::new([0x01, 0xAA], host, 4242, participant)
}

pub fn registry() -> Arc<InMemoryTypeRegistry> {
    Arc::new(InMemoryTypeRegistry::new())
}

/// Config announcing only local writers (publications writer,
/// subscriptions reader).
pub fn writer_side_config() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.edp.use_publication_writer_and_subscription_reader = true;
    config.edp.use_publication_reader_and_subscription_writer = false;
    config
}

/// Config announcing only local readers (publications reader,
/// subscriptions writer).
pub fn reader_side_config() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.edp.use_publication_writer_and_subscription_reader = false;
    config.edp.use_publication_reader_and_subscription_writer = true;
    config
}

/// Announce every participant, then let discovery settle.
pub fn settle(bus: &Bus, nodes: &[&Arc<BuiltinProtocols>]) {
    for node in nodes {
        node.pdp().announce_participant_state(true, false);
    }
    bus.pump();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    Matched(Guid, Guid),
    Unmatched(Guid, Guid),
}

/// Records match transitions in arrival order.
#[derive(Default)]
pub struct RecordingMatchListener {
    events: Mutex<Vec<MatchEvent>>,
}

impl RecordingMatchListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<MatchEvent> {
        self.events.lock().clone()
    }

    pub fn matched(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MatchEvent::Matched(..)))
            .count()
    }

    pub fn unmatched(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MatchEvent::Unmatched(..)))
            .count()
    }
}

impl MatchListener for RecordingMatchListener {
    fn on_match(&self, local: Guid, remote: &EndpointProxyData) {
        self.events.lock().push(MatchEvent::Matched(local, remote.guid));
    }

    fn on_unmatch(&self, local: Guid, remote: &EndpointProxyData) {
        self.events
            .lock()
            .push(MatchEvent::Unmatched(local, remote.guid));
    }
}

/// Records type lookup replies.
#[derive(Default)]
pub struct RecordingTypeListener {
    pub types: Mutex<Vec<(SampleIdentity, Result<GetTypesOut, ReturnCode>)>>,
    pub dependencies: Mutex<Vec<(SampleIdentity, Result<Vec<TypeIdentifierWithSize>, ReturnCode>)>>,
}

impl RecordingTypeListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dependency_ids(&self) -> Vec<TypeIdentifier> {
        self.dependencies
            .lock()
            .iter()
            .filter_map(|(_, result)| result.as_ref().ok())
            .flatten()
            .map(|entry| entry.type_id)
            .collect()
    }
}

impl TypeLookupListener for RecordingTypeListener {
    fn on_types_reply(&self, request: SampleIdentity, result: &Result<GetTypesOut, ReturnCode>) {
        self.types.lock().push((request, result.clone()));
    }

    fn on_dependencies_reply(
        &self,
        request: SampleIdentity,
        result: &Result<Vec<TypeIdentifierWithSize>, ReturnCode>,
    ) {
        self.dependencies.lock().push((request, result.clone()));
    }
}

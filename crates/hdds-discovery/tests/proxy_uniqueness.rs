// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::unwrap_used, clippy::expect_used)]

//! One proxy per GUID, bounded pools, and listeners told exactly once.

mod common;

use common::{prefix, reader_side_config, registry, settle, writer_side_config, Bus};
use hdds_discovery::config::AllocationLimits;
use hdds_discovery::{
    DiscoveryConfig, EndpointProxyData, EndpointQos, EntityId, Guid, ParticipantListener,
    ParticipantProxyData, RemovalReason,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Counting {
    discovered: Mutex<Vec<Guid>>,
    removed: Mutex<Vec<(Guid, RemovalReason)>>,
}

impl ParticipantListener for Counting {
    fn on_participant_discovered(&self, participant: &ParticipantProxyData) {
        self.discovered.lock().push(participant.guid);
    }

    fn on_participant_removed(&self, participant: &ParticipantProxyData, reason: RemovalReason) {
        self.removed.lock().push((participant.guid, reason));
    }
}

#[test]
fn test_repeated_announcements_keep_one_proxy() {
    let bus = Bus::new();
    let a = bus.node(prefix(0x0a00_0001, 0), DiscoveryConfig::default(), registry());
    let b = bus.node(prefix(0x0a00_0002, 0), DiscoveryConfig::default(), registry());
    let counting = Arc::new(Counting::default());
    b.pdp().add_listener(counting.clone());

    settle(&bus, &[&a, &b]);
    for _ in 0..10 {
        a.pdp().announce_participant_state(false, false);
        a.pdp().announce_participant_state(true, false);
    }
    bus.pump();

    assert_eq!(b.pdp().participant_count(), 1);
    assert_eq!(
        *counting.discovered.lock(),
        vec![Guid::participant(a.local_prefix())]
    );
    assert_eq!(b.metrics().snapshot().participants_discovered, 1);
    assert!(b.metrics().snapshot().announcements_received > 10);

    // Disposal twice (multicast + matched unicast copy): removed once.
    a.pdp().announce_participant_state(false, true);
    a.pdp().announce_participant_state(false, true);
    bus.pump();
    assert_eq!(
        *counting.removed.lock(),
        vec![(Guid::participant(a.local_prefix()), RemovalReason::Disposed)]
    );
    assert_eq!(b.pdp().participant_count(), 0);
}

#[test]
fn test_updated_endpoint_keeps_one_proxy() {
    let bus = Bus::new();
    let a = bus.node(prefix(0x0a00_0001, 0), writer_side_config(), registry());
    let b = bus.node(prefix(0x0a00_0002, 0), reader_side_config(), registry());
    settle(&bus, &[&a, &b]);

    let guid = Guid::new(a.local_prefix(), EntityId::user_writer(9));
    for topic in ["Alpha", "Beta", "Gamma"] {
        a.edp()
            .register_local_writer(
                EndpointProxyData::writer(guid, topic, "demo::Msg", EndpointQos::reliable()),
                common::RecordingMatchListener::new(),
            )
            .expect("register writer");
    }
    bus.pump();

    assert_eq!(b.edp().remote_writer_count(), 1);
    let seen = b.edp().remote_endpoint(&guid).expect("writer known");
    assert_eq!(seen.topic_name, "Gamma");
    assert_eq!(b.metrics().snapshot().endpoints_discovered, 1);
}

#[test]
fn test_participant_pool_is_bounded() {
    let mut tight = DiscoveryConfig::default();
    tight.allocation.participants = AllocationLimits::new(1, 1);

    let bus = Bus::new();
    let local = bus.node(prefix(0x0a00_0001, 0), tight, registry());
    let first = bus.node(prefix(0x0a00_0002, 0), DiscoveryConfig::default(), registry());
    let second = bus.node(prefix(0x0a00_0003, 0), DiscoveryConfig::default(), registry());

    first.pdp().announce_participant_state(true, false);
    bus.pump();
    second.pdp().announce_participant_state(true, false);
    bus.pump();

    assert_eq!(local.pdp().participant_count(), 1);
    assert!(local.pdp().participant(&first.local_prefix()).is_some());
    assert!(local.pdp().participant(&second.local_prefix()).is_none());
    assert!(local.metrics().snapshot().pool_exhausted >= 1);

    // Freeing the slot lets the next announcement in.
    first.pdp().announce_participant_state(false, true);
    bus.pump();
    second.pdp().announce_participant_state(false, false);
    bus.pump();
    assert!(local.pdp().participant(&second.local_prefix()).is_some());
}

#[test]
fn test_local_endpoint_validation() {
    let bus = Bus::new();
    let a = bus.node(prefix(0x0a00_0001, 0), DiscoveryConfig::default(), registry());
    let foreign = Guid::new(prefix(0x0a00_0009, 0), EntityId::user_writer(1));

    let err = a.edp().register_local_writer(
        EndpointProxyData::writer(foreign, "Chatter", "std_msgs::String", EndpointQos::reliable()),
        common::RecordingMatchListener::new(),
    );
    assert!(err.is_err());

    let reader_as_writer = Guid::new(a.local_prefix(), EntityId::user_reader(1));
    let err = a.edp().register_local_writer(
        EndpointProxyData::reader(
            reader_as_writer,
            "Chatter",
            "std_msgs::String",
            EndpointQos::reliable(),
        ),
        common::RecordingMatchListener::new(),
    );
    assert!(err.is_err());
    assert_eq!(a.edp().local_endpoint_count(), 0);

    let unknown = Guid::new(a.local_prefix(), EntityId::user_writer(42));
    assert!(a.edp().unregister_local_endpoint(&unknown).is_err());
}

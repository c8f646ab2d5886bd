// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::uninlined_format_args)] // Test readability

//! A participant disposed while its endpoints are still being attached.
//!
//! The transport holds the first send to the remote publications reader
//! (the transient-local replay done while the new participant is wired
//! up). The disposal arrives from another thread during that window.
//! Once the send is let through, nothing may stay attached to the removed
//! participant.

mod common;

use common::{prefix, RecordingMatchListener};
use hdds_discovery::wire::spdp;
use hdds_discovery::{
    BuiltinEndpointSet, BuiltinProtocols, CacheChange, ChangeKind, Destination, DiscoveryConfig,
    EndpointProxyData, EndpointQos, EntityId, Guid, InMemoryTypeRegistry, InstanceHandle, Locator,
    ParticipantProxyData, ParticipantState, Transport, TransportChannelFactory,
};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct GateState {
    open: bool,
    entered: bool,
}

/// Blocks sends to a remote publications reader until opened.
#[derive(Default)]
struct GatedTransport {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GatedTransport {
    fn wait_entered(&self) {
        let mut state = self.state.lock();
        while !state.entered {
            let timed_out = self
                .changed
                .wait_for(&mut state, Duration::from_secs(5))
                .timed_out();
            assert!(!timed_out, "publications replay never started");
        }
    }

    fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }
}

impl Transport for GatedTransport {
    fn send(&self, destinations: &[Destination], _change: &CacheChange) {
        let gated = destinations
            .iter()
            .any(|d| d.reader.entity_id == EntityId::SEDP_PUBLICATIONS_READER);
        if !gated {
            return;
        }
        let mut state = self.state.lock();
        state.entered = true;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
    }
}

fn remote_participant() -> ParticipantProxyData {
    ParticipantProxyData {
        guid: Guid::participant(prefix(0x0a00_0001, 0)),
        lease_duration: Duration::from_secs(20),
        metatraffic_unicast: vec![Locator::udpv4([10, 0, 0, 1], 7410)],
        builtin_endpoints: BuiltinEndpointSet::PARTICIPANT_ANNOUNCER
            | BuiltinEndpointSet::PARTICIPANT_DETECTOR
            | BuiltinEndpointSet::PUBLICATION_ANNOUNCER
            | BuiltinEndpointSet::PUBLICATION_DETECTOR
            | BuiltinEndpointSet::SUBSCRIPTION_ANNOUNCER
            | BuiltinEndpointSet::SUBSCRIPTION_DETECTOR
            | BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_WRITER
            | BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_READER
            | BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_WRITER
            | BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_READER,
        participant_name: "remote".into(),
        ..Default::default()
    }
}

fn spdp_change(remote: &ParticipantProxyData, sequence_number: i64, alive: bool) -> CacheChange {
    let (kind, payload) = if alive {
        (ChangeKind::Alive, spdp::encode_participant(remote))
    } else {
        (ChangeKind::NotAliveDisposed, spdp::encode_participant_key(&remote.guid))
    };
    CacheChange {
        writer_guid: Guid::new(remote.prefix(), EntityId::SPDP_WRITER),
        sequence_number,
        kind,
        instance_handle: InstanceHandle::from(remote.guid),
        payload: Arc::from(payload),
    }
}

#[test]
fn test_disposal_during_endpoint_attachment_leaves_nothing_attached() {
    let _ = env_logger::builder().is_test(true).try_init();
    let gate = Arc::new(GatedTransport::default());
    let local = BuiltinProtocols::init(
        DiscoveryConfig::default(),
        prefix(0x0a00_0002, 0),
        Arc::new(TransportChannelFactory::new(gate.clone())),
        Arc::new(InMemoryTypeRegistry::new()),
    )
    .expect("init participant");

    // Gives the publications writer transient-local history to replay.
    local
        .edp()
        .register_local_writer(
            EndpointProxyData::writer(
                Guid::new(local.local_prefix(), EntityId::user_writer(1)),
                "Chatter",
                "std_msgs::String",
                EndpointQos::reliable(),
            ),
            RecordingMatchListener::new(),
        )
        .expect("register writer");

    let remote = remote_participant();
    let announcement = spdp_change(&remote, 1, true);
    let disposal = spdp_change(&remote, 2, false);

    std::thread::scope(|scope| {
        let announcing = scope.spawn(|| local.receive(EntityId::SPDP_READER, &announcement));
        gate.wait_entered();
        let disposing = scope.spawn(|| local.receive(EntityId::SPDP_READER, &disposal));
        // Let the disposal run as far as it can while attachment is held.
        std::thread::sleep(Duration::from_millis(50));
        gate.open();
        announcing.join().expect("announcing thread").expect("announcement");
        disposing.join().expect("disposing thread").expect("disposal");
    });

    let remote_prefix = remote.prefix();
    let remote_guid = |entity_id| Guid::new(remote_prefix, entity_id);
    assert_eq!(local.pdp().state(&remote_prefix), ParticipantState::Unknown);
    assert_eq!(local.metrics().snapshot().participants_disposed, 1);

    assert!(!local.pdp().writer().is_matched(remote_guid(EntityId::SPDP_READER)));
    assert!(!local.pdp().reader().is_matched(remote_guid(EntityId::SPDP_WRITER)));

    let edp = local.edp();
    let publications_writer = edp.publications_writer().expect("publications writer");
    let subscriptions_writer = edp.subscriptions_writer().expect("subscriptions writer");
    let publications_reader = edp.publications_reader().expect("publications reader");
    let subscriptions_reader = edp.subscriptions_reader().expect("subscriptions reader");
    assert!(!publications_writer.is_matched(remote_guid(EntityId::SEDP_PUBLICATIONS_READER)));
    assert!(!subscriptions_writer.is_matched(remote_guid(EntityId::SEDP_SUBSCRIPTIONS_READER)));
    assert!(!publications_reader.is_matched(remote_guid(EntityId::SEDP_PUBLICATIONS_WRITER)));
    assert!(!subscriptions_reader.is_matched(remote_guid(EntityId::SEDP_SUBSCRIPTIONS_WRITER)));

    let type_lookup = local.type_lookup();
    let request_writer = type_lookup.request_writer().expect("request writer");
    let reply_writer = type_lookup.reply_writer().expect("reply writer");
    let request_reader = type_lookup.request_reader().expect("request reader");
    let reply_reader = type_lookup.reply_reader().expect("reply reader");
    assert!(!request_writer.is_matched(remote_guid(EntityId::TYPELOOKUP_REQUEST_READER)));
    assert!(!reply_writer.is_matched(remote_guid(EntityId::TYPELOOKUP_REPLY_READER)));
    assert!(!request_reader.is_matched(remote_guid(EntityId::TYPELOOKUP_REQUEST_WRITER)));
    assert!(!reply_reader.is_matched(remote_guid(EntityId::TYPELOOKUP_REPLY_WRITER)));
}

#[test]
fn test_participant_can_return_after_disposal() {
    let _ = env_logger::builder().is_test(true).try_init();
    let gate = Arc::new(GatedTransport::default());
    gate.open();
    let local = BuiltinProtocols::init(
        DiscoveryConfig::default(),
        prefix(0x0a00_0002, 0),
        Arc::new(TransportChannelFactory::new(gate)),
        Arc::new(InMemoryTypeRegistry::new()),
    )
    .expect("init participant");

    let remote = remote_participant();
    let remote_prefix = remote.prefix();
    let publications_reader = Guid::new(remote_prefix, EntityId::SEDP_PUBLICATIONS_READER);
    let writer = local.edp().publications_writer().expect("publications writer");

    local.receive(EntityId::SPDP_READER, &spdp_change(&remote, 1, true)).expect("announce");
    assert_eq!(local.pdp().state(&remote_prefix), ParticipantState::Alive);
    assert!(writer.is_matched(publications_reader));

    local.receive(EntityId::SPDP_READER, &spdp_change(&remote, 2, false)).expect("dispose");
    assert_eq!(local.pdp().state(&remote_prefix), ParticipantState::Unknown);
    assert!(!writer.is_matched(publications_reader));

    local.receive(EntityId::SPDP_READER, &spdp_change(&remote, 3, true)).expect("announce");
    assert_eq!(local.pdp().state(&remote_prefix), ParticipantState::Alive);
    assert!(writer.is_matched(publications_reader));
}

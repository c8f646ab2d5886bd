// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::uninlined_format_args)] // Test readability

//! Lease expiry: a participant that stops announcing is removed once its
//! lease runs out, with the same cascade as an explicit disposal.

mod common;

use common::{
    prefix, reader_side_config, registry, settle, writer_side_config, Bus, MatchEvent,
    RecordingMatchListener,
};
use hdds_discovery::{EndpointProxyData, EndpointQos, EntityId, Guid, ParticipantState};
use std::time::{Duration, Instant};

#[test]
fn test_lease_expiry_removes_participant_and_endpoints() {
    let bus = Bus::new();
    let a = bus.node(prefix(0x0a00_0001, 0), writer_side_config(), registry());
    let b = bus.node(prefix(0x0a00_0002, 0), reader_side_config(), registry());

    let writer_guid = Guid::new(a.local_prefix(), EntityId::user_writer(3));
    let reader_guid = Guid::new(b.local_prefix(), EntityId::user_reader(3));
    a.edp()
        .register_local_writer(
            EndpointProxyData::writer(
                writer_guid,
                "Pose",
                "geometry::Pose",
                EndpointQos::reliable(),
            ),
            RecordingMatchListener::new(),
        )
        .expect("register writer");
    let on_b = RecordingMatchListener::new();
    b.edp()
        .register_local_reader(
            EndpointProxyData::reader(
                reader_guid,
                "Pose",
                "geometry::Pose",
                EndpointQos::reliable(),
            ),
            on_b.clone(),
        )
        .expect("register reader");
    settle(&bus, &[&a, &b]);
    assert_eq!(on_b.matched(), 1);

    let lease = a.config().lease_duration();

    // Well inside the lease: nothing expires.
    assert_eq!(b.pdp().expire_leases_at(Instant::now() + lease / 2), 0);
    assert_eq!(b.pdp().state(&a.local_prefix()), ParticipantState::Alive);

    // A goes silent; B's clock passes the deadline.
    bus.detach(a.local_prefix());
    let removed = b
        .pdp()
        .expire_leases_at(Instant::now() + lease + Duration::from_secs(1));
    assert_eq!(removed, 1);
    assert_eq!(b.pdp().state(&a.local_prefix()), ParticipantState::Unknown);
    assert_eq!(
        on_b.events(),
        vec![
            MatchEvent::Matched(reader_guid, writer_guid),
            MatchEvent::Unmatched(reader_guid, writer_guid),
        ]
    );
    assert_eq!(b.edp().remote_writer_count(), 0);
    assert_eq!(b.metrics().snapshot().leases_expired, 1);

    // Already gone: a second pass is a no-op.
    assert_eq!(
        b.pdp()
            .expire_leases_at(Instant::now() + lease + Duration::from_secs(2)),
        0
    );
    assert_eq!(on_b.unmatched(), 1);
}

#[test]
fn test_refresh_moves_deadline() {
    let bus = Bus::new();
    let a = bus.node(prefix(0x0a00_0001, 0), writer_side_config(), registry());
    let b = bus.node(prefix(0x0a00_0002, 0), reader_side_config(), registry());
    settle(&bus, &[&a, &b]);

    let before = b
        .pdp()
        .registry()
        .lease_deadline(&a.local_prefix())
        .expect("deadline");
    std::thread::sleep(Duration::from_millis(20));
    a.pdp().announce_participant_state(false, false);
    bus.pump();
    let after = b
        .pdp()
        .registry()
        .lease_deadline(&a.local_prefix())
        .expect("deadline");
    assert!(after > before);
    assert_eq!(b.pdp().participant_count(), 1);
}

#[test]
fn test_background_lease_checker_expires_silent_peer() {
    let mut fast = reader_side_config();
    fast.lease_duration_ms = 400;
    fast.announcement_period_ms = 100;
    fast.lease_check_period_ms = 20;

    let mut short_lease = writer_side_config();
    short_lease.lease_duration_ms = 200;
    short_lease.announcement_period_ms = 100;

    let bus = Bus::new();
    let a = bus.node(prefix(0x0a00_0001, 0), short_lease, registry());
    let b = bus.node(prefix(0x0a00_0002, 0), fast, registry());
    settle(&bus, &[&a, &b]);
    assert_eq!(b.pdp().state(&a.local_prefix()), ParticipantState::Alive);

    // Nobody pumps from here on, so A's lease is never refreshed.
    b.start().expect("start");
    assert!(b.is_running());

    let deadline = Instant::now() + Duration::from_secs(5);
    while b.pdp().state(&a.local_prefix()) != ParticipantState::Unknown {
        assert!(Instant::now() < deadline, "lease checker never ran");
        std::thread::sleep(Duration::from_millis(20));
    }

    b.stop();
    assert!(!b.is_running());
    assert_eq!(b.metrics().snapshot().leases_expired, 1);
}

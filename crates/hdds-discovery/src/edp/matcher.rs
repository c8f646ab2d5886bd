// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer/reader compatibility (RxO: requested vs offered).
//!
//! | Policy      | Rule                                                 |
//! |-------------|------------------------------------------------------|
//! | Topic       | Names equal                                          |
//! | Type        | Type names equal                                     |
//! | Reliability | Writer >= Reader (Reliable > BestEffort)             |
//! | Durability  | Writer >= Reader (Persistent > Transient > TransientLocal > Volatile) |
//! | Liveliness  | Writer kind >= reader kind, writer lease <= reader lease |
//!
//! The check only depends on which side is the writer, never on which side
//! is local, so both participants reach the same verdict for a pair.

use crate::guid::EndpointKind;
use crate::proxy::EndpointProxyData;
use crate::qos::{EndpointQos, Reliability};

/// First rule a pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incompatibility {
    /// Both endpoints are readers or both are writers.
    SameKind,
    Topic,
    TypeName,
    Reliability,
    Durability,
    LivelinessKind,
    LivelinessLease,
}

/// Check whether two endpoints of opposite kinds can communicate.
///
/// Symmetric: `check_match(a, b) == check_match(b, a)`.
pub fn check_match(a: &EndpointProxyData, b: &EndpointProxyData) -> Result<(), Incompatibility> {
    crate::trace_fn!("matcher::check_match");
    let (writer, reader) = match (a.kind, b.kind) {
        (EndpointKind::Writer, EndpointKind::Reader) => (a, b),
        (EndpointKind::Reader, EndpointKind::Writer) => (b, a),
        _ => return Err(Incompatibility::SameKind),
    };

    if writer.topic_name != reader.topic_name {
        return Err(Incompatibility::Topic);
    }
    if writer.type_name != reader.type_name {
        log::debug!(
            "[EDP] type mismatch on '{}' (writer={}, reader={})",
            writer.topic_name,
            writer.type_name,
            reader.type_name
        );
        return Err(Incompatibility::TypeName);
    }
    let verdict = check_qos(&writer.qos, &reader.qos);
    if let Err(reason) = verdict {
        log::debug!(
            "[EDP] incompatible QoS on '{}' ({:?}): writer={:?} reader={:?}",
            writer.topic_name,
            reason,
            writer.qos,
            reader.qos
        );
    }
    verdict
}

/// QoS part of the match (offered = writer, requested = reader).
pub fn check_qos(offered: &EndpointQos, requested: &EndpointQos) -> Result<(), Incompatibility> {
    if offered.reliability == Reliability::BestEffort
        && requested.reliability == Reliability::Reliable
    {
        return Err(Incompatibility::Reliability);
    }
    if offered.durability.rank() < requested.durability.rank() {
        return Err(Incompatibility::Durability);
    }
    if offered.liveliness.kind.rank() < requested.liveliness.kind.rank() {
        return Err(Incompatibility::LivelinessKind);
    }
    // `None` is an infinite lease.
    let lease_ok = match (
        offered.liveliness.lease_duration,
        requested.liveliness.lease_duration,
    ) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(offered), Some(requested)) => offered <= requested,
    };
    if !lease_ok {
        return Err(Incompatibility::LivelinessLease);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{EntityId, Guid, GuidPrefix};
    use crate::qos::{Durability, LivelinessKind};
    use std::time::Duration;

    fn writer(qos: EndpointQos) -> EndpointProxyData {
        let guid = Guid::new(GuidPrefix([1; 12]), EntityId::user_writer(1));
        EndpointProxyData::writer(guid, "Chatter", "std_msgs::String", qos)
    }

    fn reader(qos: EndpointQos) -> EndpointProxyData {
        let guid = Guid::new(GuidPrefix([2; 12]), EntityId::user_reader(1));
        EndpointProxyData::reader(guid, "Chatter", "std_msgs::String", qos)
    }

    #[test]
    fn test_reliability_rule() {
        let be = EndpointQos::best_effort();
        let rel = EndpointQos::reliable();
        assert!(check_match(&writer(rel), &reader(be)).is_ok());
        assert!(check_match(&writer(rel), &reader(rel)).is_ok());
        assert!(check_match(&writer(be), &reader(be)).is_ok());
        assert_eq!(
            check_match(&writer(be), &reader(rel)),
            Err(Incompatibility::Reliability)
        );
    }

    #[test]
    fn test_durability_rule() {
        let volatile = EndpointQos::reliable();
        let transient_local = EndpointQos::reliable().with_durability(Durability::TransientLocal);
        assert!(check_match(&writer(transient_local), &reader(volatile)).is_ok());
        assert_eq!(
            check_match(&writer(volatile), &reader(transient_local)),
            Err(Incompatibility::Durability)
        );
    }

    #[test]
    fn test_liveliness_rule() {
        let by_topic = EndpointQos::reliable()
            .with_liveliness(LivelinessKind::ManualByTopic, Some(Duration::from_secs(1)));
        let automatic = EndpointQos::reliable()
            .with_liveliness(LivelinessKind::Automatic, Some(Duration::from_secs(5)));
        assert!(check_match(&writer(by_topic), &reader(automatic)).is_ok());
        assert_eq!(
            check_match(&writer(automatic), &reader(by_topic)),
            Err(Incompatibility::LivelinessKind)
        );

        let infinite = EndpointQos::reliable();
        assert_eq!(
            check_match(&writer(infinite), &reader(automatic)),
            Err(Incompatibility::LivelinessLease)
        );
        assert!(check_match(&writer(automatic), &reader(infinite)).is_ok());
    }

    #[test]
    fn test_names_and_kinds() {
        let mut r = reader(EndpointQos::best_effort());
        r.type_name = "other".into();
        assert_eq!(
            check_match(&writer(EndpointQos::reliable()), &r),
            Err(Incompatibility::TypeName)
        );
        r.topic_name = "Other".into();
        assert_eq!(
            check_match(&writer(EndpointQos::reliable()), &r),
            Err(Incompatibility::Topic)
        );
        assert_eq!(
            check_match(&writer(EndpointQos::reliable()), &writer(EndpointQos::reliable())),
            Err(Incompatibility::SameKind)
        );
    }

    #[test]
    fn test_symmetry() {
        let w = writer(EndpointQos::best_effort());
        let r = reader(EndpointQos::reliable());
        assert_eq!(check_match(&w, &r), check_match(&r, &w));
    }
}

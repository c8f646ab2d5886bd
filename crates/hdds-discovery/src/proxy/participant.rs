// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote participant description (SPDP DATA contents).

use super::pool::Poolable;
use crate::builtin::BuiltinEndpointSet;
use crate::guid::{Guid, GuidPrefix};
use crate::locator::Locator;
use std::time::Duration;

/// RTPS protocol version announced by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const CURRENT: ProtocolVersion = ProtocolVersion { major: 2, minor: 4 };
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// HDDS vendor id.
pub const VENDOR_ID_HDDS: [u8; 2] = [0x01, 0xAA];

/// Participant proxy.
///
/// `guid` is the identity: it is set once when the proxy is created and
/// [`update_from`](Self::update_from) never touches it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticipantProxyData {
    pub guid: Guid,
    pub protocol_version: ProtocolVersion,
    pub vendor_id: [u8; 2],
    pub lease_duration: Duration,
    pub metatraffic_unicast: Vec<Locator>,
    pub metatraffic_multicast: Vec<Locator>,
    pub builtin_endpoints: BuiltinEndpointSet,
    pub participant_name: String,
    pub properties: Vec<(String, String)>,
}

impl Poolable for ParticipantProxyData {}

impl ParticipantProxyData {
    pub fn prefix(&self) -> GuidPrefix {
        self.guid.prefix
    }

    pub fn has_metatraffic_locators(&self) -> bool {
        !self.metatraffic_unicast.is_empty() || !self.metatraffic_multicast.is_empty()
    }

    /// Locators to reach this participant's builtin endpoints.
    ///
    /// With `avoid_multicast`, multicast locators are skipped whenever at
    /// least one unicast locator is known.
    pub fn metatraffic_locators(&self, avoid_multicast: bool) -> Vec<Locator> {
        if avoid_multicast && !self.metatraffic_unicast.is_empty() {
            return self.metatraffic_unicast.clone();
        }
        self.metatraffic_unicast
            .iter()
            .chain(self.metatraffic_multicast.iter())
            .copied()
            .collect()
    }

    /// Overwrite the mutable attributes with a fresher announcement.
    pub fn update_from(&mut self, fresh: &ParticipantProxyData) {
        self.protocol_version = fresh.protocol_version;
        self.vendor_id = fresh.vendor_id;
        self.lease_duration = fresh.lease_duration;
        self.metatraffic_unicast.clone_from(&fresh.metatraffic_unicast);
        self.metatraffic_multicast.clone_from(&fresh.metatraffic_multicast);
        self.builtin_endpoints = fresh.builtin_endpoints;
        self.participant_name.clone_from(&fresh.participant_name);
        self.properties.clone_from(&fresh.properties);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParticipantProxyData {
        ParticipantProxyData {
            guid: Guid::participant(GuidPrefix([1; 12])),
            lease_duration: Duration::from_secs(10),
            metatraffic_unicast: vec![Locator::udpv4([10, 0, 0, 1], 7410)],
            metatraffic_multicast: vec![Locator::udpv4([239, 255, 0, 1], 7400)],
            ..Default::default()
        }
    }

    #[test]
    fn test_metatraffic_locator_selection() {
        let p = sample();
        assert_eq!(p.metatraffic_locators(true).len(), 1);
        assert_eq!(p.metatraffic_locators(false).len(), 2);

        let mut multicast_only = sample();
        multicast_only.metatraffic_unicast.clear();
        assert_eq!(multicast_only.metatraffic_locators(true).len(), 1);
    }

    #[test]
    fn test_update_preserves_identity() {
        let mut p = sample();
        let mut fresh = sample();
        fresh.guid = Guid::participant(GuidPrefix([2; 12]));
        fresh.participant_name = "renamed".into();
        fresh.lease_duration = Duration::from_secs(30);

        p.update_from(&fresh);
        assert_eq!(p.guid, Guid::participant(GuidPrefix([1; 12])));
        assert_eq!(p.participant_name, "renamed");
        assert_eq!(p.lease_duration, Duration::from_secs(30));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut p = sample();
        p.reset();
        assert_eq!(p, ParticipantProxyData::default());
        assert!(!p.has_metatraffic_locators());
    }
}

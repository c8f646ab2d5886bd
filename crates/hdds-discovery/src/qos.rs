// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS subset carried by endpoint proxies.
//!
//! Only the policies that take part in discovery matching are modelled:
//! reliability, durability and liveliness. Everything else is a local
//! concern of the data path.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reliability kind (RTPS wire values: BEST_EFFORT=1, RELIABLE=2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    BestEffort,
    Reliable,
}

impl Reliability {
    pub fn to_wire(self) -> u32 {
        match self {
            Reliability::BestEffort => 1,
            Reliability::Reliable => 2,
        }
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Reliability::BestEffort),
            2 => Some(Reliability::Reliable),
            _ => None,
        }
    }
}

/// Durability kind, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

impl Durability {
    /// Strength rank used for RxO comparison.
    pub fn rank(self) -> u8 {
        match self {
            Durability::Volatile => 0,
            Durability::TransientLocal => 1,
            Durability::Transient => 2,
            Durability::Persistent => 3,
        }
    }

    pub fn to_wire(self) -> u32 {
        u32::from(self.rank())
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Durability::Volatile),
            1 => Some(Durability::TransientLocal),
            2 => Some(Durability::Transient),
            3 => Some(Durability::Persistent),
            _ => None,
        }
    }
}

/// Liveliness kind, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivelinessKind {
    Automatic,
    ManualByParticipant,
    ManualByTopic,
}

impl LivelinessKind {
    pub fn rank(self) -> u8 {
        match self {
            LivelinessKind::Automatic => 0,
            LivelinessKind::ManualByParticipant => 1,
            LivelinessKind::ManualByTopic => 2,
        }
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(LivelinessKind::Automatic),
            1 => Some(LivelinessKind::ManualByParticipant),
            2 => Some(LivelinessKind::ManualByTopic),
            _ => None,
        }
    }
}

/// Liveliness policy: kind plus lease duration (`None` = infinite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Liveliness {
    pub kind: LivelinessKind,
    pub lease_duration: Option<Duration>,
}

impl Default for Liveliness {
    fn default() -> Self {
        Self {
            kind: LivelinessKind::Automatic,
            lease_duration: None,
        }
    }
}

/// QoS policies exchanged over SEDP and used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointQos {
    pub reliability: Reliability,
    pub durability: Durability,
    pub liveliness: Liveliness,
}

impl EndpointQos {
    pub fn best_effort() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            durability: Durability::Volatile,
            liveliness: Liveliness::default(),
        }
    }

    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            ..Self::best_effort()
        }
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_liveliness(mut self, kind: LivelinessKind, lease: Option<Duration>) -> Self {
        self.liveliness = Liveliness {
            kind,
            lease_duration: lease,
        };
        self
    }
}

impl Default for EndpointQos {
    fn default() -> Self {
        Self::best_effort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durability_rank_order() {
        assert!(Durability::Volatile.rank() < Durability::TransientLocal.rank());
        assert!(Durability::TransientLocal.rank() < Durability::Transient.rank());
        assert!(Durability::Transient.rank() < Durability::Persistent.rank());
    }

    #[test]
    fn test_wire_values() {
        for r in [Reliability::BestEffort, Reliability::Reliable] {
            assert_eq!(Reliability::from_wire(r.to_wire()), Some(r));
        }
        for d in [
            Durability::Volatile,
            Durability::TransientLocal,
            Durability::Transient,
            Durability::Persistent,
        ] {
            assert_eq!(Durability::from_wire(d.to_wire()), Some(d));
        }
        assert_eq!(Reliability::from_wire(0), None);
        assert_eq!(LivelinessKind::from_wire(7), None);
    }

    #[test]
    fn test_builders() {
        let qos = EndpointQos::reliable()
            .with_durability(Durability::TransientLocal)
            .with_liveliness(LivelinessKind::ManualByTopic, Some(Duration::from_secs(2)));
        assert_eq!(qos.reliability, Reliability::Reliable);
        assert_eq!(qos.durability, Durability::TransientLocal);
        assert_eq!(qos.liveliness.kind, LivelinessKind::ManualByTopic);
    }
}

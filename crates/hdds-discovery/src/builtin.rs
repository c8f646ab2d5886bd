// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin endpoint capability bitmask and participant filtering flags.
//!
//! The bitmask is advertised in every participant announcement
//! (PID_BUILTIN_ENDPOINT_SET) and tells peers which discovery channels
//! exist on the announcing side. A local channel is attached to a remote
//! peer only when the peer advertises the counterpart bit.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Builtin endpoint set (RTPS 8.5.3.2 + XTypes 7.6.3.3.4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BuiltinEndpointSet(pub u32);

impl BuiltinEndpointSet {
    pub const PARTICIPANT_ANNOUNCER: Self = Self(1 << 0);
    pub const PARTICIPANT_DETECTOR: Self = Self(1 << 1);
    pub const PUBLICATION_ANNOUNCER: Self = Self(1 << 2);
    pub const PUBLICATION_DETECTOR: Self = Self(1 << 3);
    pub const SUBSCRIPTION_ANNOUNCER: Self = Self(1 << 4);
    pub const SUBSCRIPTION_DETECTOR: Self = Self(1 << 5);
    pub const PARTICIPANT_MESSAGE_DATA_WRITER: Self = Self(1 << 10);
    pub const PARTICIPANT_MESSAGE_DATA_READER: Self = Self(1 << 11);
    pub const TYPELOOKUP_SERVICE_REQUEST_DATA_WRITER: Self = Self(1 << 12);
    pub const TYPELOOKUP_SERVICE_REQUEST_DATA_READER: Self = Self(1 << 13);
    pub const TYPELOOKUP_SERVICE_REPLY_DATA_WRITER: Self = Self(1 << 14);
    pub const TYPELOOKUP_SERVICE_REPLY_DATA_READER: Self = Self(1 << 15);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BuiltinEndpointSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BuiltinEndpointSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for BuiltinEndpointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinEndpointSet(0x{:08x})", self.0)
    }
}

/// Participant filtering policy (which remote announcements to ignore).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParticipantFilteringFlags(pub u32);

impl ParticipantFilteringFlags {
    pub const NO_FILTER: Self = Self(0);
    pub const FILTER_DIFFERENT_HOST: Self = Self(0x1);
    pub const FILTER_DIFFERENT_PROCESS: Self = Self(0x2);
    pub const FILTER_SAME_PROCESS: Self = Self(0x4);

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ParticipantFilteringFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ParticipantFilteringFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantFilteringFlags(0x{:x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_set_ops() {
        let mut set = BuiltinEndpointSet::PARTICIPANT_ANNOUNCER
            | BuiltinEndpointSet::PARTICIPANT_DETECTOR;
        assert!(set.contains(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER));
        assert!(!set.contains(BuiltinEndpointSet::PUBLICATION_ANNOUNCER));

        set.insert(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_READER);
        assert_eq!(set.bits(), 0x0000_8003);

        set.remove(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER);
        assert_eq!(set.bits(), 0x0000_8002);
        assert!(BuiltinEndpointSet::empty().is_empty());
    }

    #[test]
    fn test_filter_flags_contains() {
        let flags = ParticipantFilteringFlags::FILTER_DIFFERENT_PROCESS
            | ParticipantFilteringFlags::FILTER_SAME_PROCESS;
        assert!(flags.contains(ParticipantFilteringFlags::FILTER_SAME_PROCESS));
        assert!(!flags.contains(ParticipantFilteringFlags::FILTER_DIFFERENT_HOST));
        assert!(!flags.contains(ParticipantFilteringFlags::NO_FILTER));
        assert!(ParticipantFilteringFlags::NO_FILTER.is_empty());
    }
}

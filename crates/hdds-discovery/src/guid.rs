// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS GUID (Globally Unique Identifier) and builtin entity identifiers.

use std::fmt;

/// Endpoint kind (Writer or Reader), derived from the entity kind octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// DataWriter endpoint.
    Writer,
    /// DataReader endpoint.
    Reader,
}

/// 12-byte GUID prefix identifying one participant.
///
/// # Layout
/// - bytes 0-1: vendor id
/// - bytes 2-5: host id
/// - bytes 6-9: process id
/// - bytes 10-11: participant counter within the process
///
/// Host and process predicates rely on this layout, the same one every
/// vendor we interoperate with uses for locally generated prefixes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct GuidPrefix(pub [u8; 12]);

impl GuidPrefix {
    /// Prefix with all zeros (GUIDPREFIX_UNKNOWN).
    pub const UNKNOWN: GuidPrefix = GuidPrefix([0; 12]);

    /// Build a prefix from its vendor/host/process/counter parts.
    pub fn new(vendor_id: [u8; 2], host_id: u32, process_id: u32, participant_id: u16) -> Self {
        let mut bytes = [0u8; 12];
        bytes[0..2].copy_from_slice(&vendor_id);
        bytes[2..6].copy_from_slice(&host_id.to_be_bytes());
        bytes[6..10].copy_from_slice(&process_id.to_be_bytes());
        bytes[10..12].copy_from_slice(&participant_id.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == [0; 12]
    }

    /// Both prefixes were generated on the same host.
    pub fn is_on_same_host_as(&self, other: &GuidPrefix) -> bool {
        self.0[2..6] == other.0[2..6]
    }

    /// Both prefixes were generated by the same process on the same host.
    pub fn is_on_same_process_as(&self, other: &GuidPrefix) -> bool {
        self.0[2..10] == other.0[2..10]
    }
}

impl fmt::Display for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuidPrefix({})", self)
    }
}

/// 4-byte entity identifier (3-byte key + 1-byte kind).
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub [u8; 4]);

impl EntityId {
    pub const UNKNOWN: EntityId = EntityId([0x00, 0x00, 0x00, 0x00]);
    pub const PARTICIPANT: EntityId = EntityId([0x00, 0x00, 0x01, 0xC1]);

    pub const SPDP_WRITER: EntityId = EntityId([0x00, 0x01, 0x00, 0xC2]);
    pub const SPDP_READER: EntityId = EntityId([0x00, 0x01, 0x00, 0xC7]);

    pub const SEDP_PUBLICATIONS_WRITER: EntityId = EntityId([0x00, 0x00, 0x03, 0xC2]);
    pub const SEDP_PUBLICATIONS_READER: EntityId = EntityId([0x00, 0x00, 0x03, 0xC7]);
    pub const SEDP_SUBSCRIPTIONS_WRITER: EntityId = EntityId([0x00, 0x00, 0x04, 0xC2]);
    pub const SEDP_SUBSCRIPTIONS_READER: EntityId = EntityId([0x00, 0x00, 0x04, 0xC7]);

    pub const TYPELOOKUP_REQUEST_WRITER: EntityId = EntityId([0x00, 0x03, 0x00, 0xC3]);
    pub const TYPELOOKUP_REQUEST_READER: EntityId = EntityId([0x00, 0x03, 0x00, 0xC4]);
    pub const TYPELOOKUP_REPLY_WRITER: EntityId = EntityId([0x00, 0x03, 0x01, 0xC3]);
    pub const TYPELOOKUP_REPLY_READER: EntityId = EntityId([0x00, 0x03, 0x01, 0xC4]);

    /// User-defined writer entity (`key` is the 3-byte entity key).
    pub fn user_writer(key: u32) -> Self {
        let k = key.to_be_bytes();
        EntityId([k[1], k[2], k[3], 0x02])
    }

    /// User-defined reader entity (`key` is the 3-byte entity key).
    pub fn user_reader(key: u32) -> Self {
        let k = key.to_be_bytes();
        EntityId([k[1], k[2], k[3], 0x07])
    }

    /// Endpoint kind from the entity kind octet (RTPS 9.3.1.2).
    ///
    /// - 0x02, 0x03, 0xC2, 0xC3 -> Writer
    /// - 0x04, 0x07, 0xC4, 0xC7 -> Reader
    pub fn endpoint_kind(&self) -> Option<EndpointKind> {
        match self.0[3] {
            0x02 | 0x03 | 0xC2 | 0xC3 => Some(EndpointKind::Writer),
            0x04 | 0x07 | 0xC4 | 0xC7 => Some(EndpointKind::Reader),
            _ => None,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityId({:02x}.{:02x}.{:02x}.{:02x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// RTPS GUID
///
/// 16-byte identifier: 12-byte participant prefix + 4-byte entity id.
///
/// # Display Format
/// Hex with dots: "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct Guid {
    pub prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl Guid {
    pub const fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    /// GUID of the participant owning `prefix`.
    pub const fn participant(prefix: GuidPrefix) -> Self {
        Self::new(prefix, EntityId::PARTICIPANT)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; 12];
        let mut entity_id = [0u8; 4];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self {
            prefix: GuidPrefix(prefix),
            entity_id: EntityId(entity_id),
        }
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix.0);
        bytes[12..16].copy_from_slice(&self.entity_id.0);
        bytes
    }

    pub fn is_unknown(&self) -> bool {
        self.prefix.is_unknown() && self.entity_id == EntityId::UNKNOWN
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        for byte in &self.entity_id.0 {
            write!(f, ".{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type identifiers and type objects exchanged by the type lookup service.
//!
//! Follows DDS-XTypes v1.3 section 7.3.4. Only the identifier shapes that
//! discovery needs to route are modelled; type objects stay opaque bytes.

use crate::error::{ParseError, UnionError};
use crate::wire::cdr::{CdrReader, CdrResult, CdrWriter};
use std::fmt;

pub const EQUIVALENCE_HASH_LEN: usize = 14;

// TypeIdentifier discriminators (XTypes 7.3.4.2)
pub const TI_STRING8_SMALL: u8 = 0x70;
pub const TI_STRING8_LARGE: u8 = 0x71;
pub const TI_STRONGLY_CONNECTED_COMPONENT: u8 = 0xB0;
pub const EK_MINIMAL: u8 = 0xF1;
pub const EK_COMPLETE: u8 = 0xF2;

// Primitive type kinds
pub const TK_BOOLEAN: u8 = 0x01;
pub const TK_BYTE: u8 = 0x02;
pub const TK_INT16: u8 = 0x03;
pub const TK_INT32: u8 = 0x04;
pub const TK_INT64: u8 = 0x05;
pub const TK_UINT16: u8 = 0x06;
pub const TK_UINT32: u8 = 0x07;
pub const TK_UINT64: u8 = 0x08;
pub const TK_FLOAT32: u8 = 0x09;
pub const TK_FLOAT64: u8 = 0x0A;
pub const TK_FLOAT128: u8 = 0x0B;
pub const TK_INT8: u8 = 0x0C;
pub const TK_UINT8: u8 = 0x0D;
pub const TK_CHAR8: u8 = 0x10;
pub const TK_CHAR16: u8 = 0x11;

fn is_primitive_kind(kind: u8) -> bool {
    matches!(kind, TK_BOOLEAN..=TK_UINT8 | TK_CHAR8 | TK_CHAR16)
}

/// EquivalenceHash - 14-byte truncated MD5 of a serialized type object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EquivalenceHash(pub [u8; EQUIVALENCE_HASH_LEN]);

impl EquivalenceHash {
    /// MD5 over `data`, truncated to 14 bytes (XTypes 7.3.4.8).
    pub fn compute(data: &[u8]) -> Self {
        use md5::{Digest, Md5};

        let mut hasher = Md5::new();
        hasher.update(data);
        let digest = hasher.finalize();

        let mut bytes = [0u8; EQUIVALENCE_HASH_LEN];
        bytes.copy_from_slice(&digest[..EQUIVALENCE_HASH_LEN]);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; EQUIVALENCE_HASH_LEN] {
        &self.0
    }
}

impl fmt::Debug for EquivalenceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EquivalenceHash(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Which type object representation a hash was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquivalenceKind {
    Minimal,
    Complete,
}

impl EquivalenceKind {
    pub const fn discriminator(self) -> u8 {
        match self {
            EquivalenceKind::Minimal => EK_MINIMAL,
            EquivalenceKind::Complete => EK_COMPLETE,
        }
    }
}

/// Hash of a strongly connected component, tagged with its equivalence kind.
///
/// The variant is the discriminator: there is no way to hold a hash without
/// a valid kind. Building one from a raw discriminator, or reading it back
/// through the wrong accessor, returns [`UnionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeObjectHashId {
    Complete(EquivalenceHash),
    Minimal(EquivalenceHash),
}

impl TypeObjectHashId {
    pub fn from_discriminator(
        discriminator: u8,
        hash: EquivalenceHash,
    ) -> Result<Self, UnionError> {
        match discriminator {
            EK_COMPLETE => Ok(TypeObjectHashId::Complete(hash)),
            EK_MINIMAL => Ok(TypeObjectHashId::Minimal(hash)),
            other => {
                log::error!(
                    "[TypeLookup] TypeObjectHashId: invalid discriminator 0x{:02x}",
                    other
                );
                Err(UnionError::InvalidDiscriminator(other))
            }
        }
    }

    pub const fn discriminator(&self) -> u8 {
        match self {
            TypeObjectHashId::Complete(_) => EK_COMPLETE,
            TypeObjectHashId::Minimal(_) => EK_MINIMAL,
        }
    }

    /// Replace the active hash, selecting the variant from `discriminator`.
    pub fn set(&mut self, discriminator: u8, hash: EquivalenceHash) -> Result<(), UnionError> {
        *self = Self::from_discriminator(discriminator, hash)?;
        Ok(())
    }

    pub fn complete_hash(&self) -> Result<&EquivalenceHash, UnionError> {
        match self {
            TypeObjectHashId::Complete(hash) => Ok(hash),
            TypeObjectHashId::Minimal(_) => Err(self.wrong_variant(EK_COMPLETE)),
        }
    }

    pub fn minimal_hash(&self) -> Result<&EquivalenceHash, UnionError> {
        match self {
            TypeObjectHashId::Minimal(hash) => Ok(hash),
            TypeObjectHashId::Complete(_) => Err(self.wrong_variant(EK_MINIMAL)),
        }
    }

    fn wrong_variant(&self, requested: u8) -> UnionError {
        let err = UnionError::WrongVariant {
            requested,
            active: self.discriminator(),
        };
        log::error!("[TypeLookup] TypeObjectHashId: {}", err);
        err
    }
}

/// TypeIdentifier (XTypes 7.3.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeIdentifier {
    /// TK_* primitive kind.
    Primitive(u8),
    /// `string<bound>` with bound <= 255.
    StringSmall { bound: u8 },
    /// `string<bound>` with bound > 255.
    StringLarge { bound: u32 },
    /// Member of a strongly connected component (cyclic types).
    StronglyConnected {
        sc_component_id: TypeObjectHashId,
        scc_length: i32,
        scc_index: i32,
    },
    Minimal(EquivalenceHash),
    Complete(EquivalenceHash),
}

impl TypeIdentifier {
    pub const fn discriminator(&self) -> u8 {
        match self {
            TypeIdentifier::Primitive(kind) => *kind,
            TypeIdentifier::StringSmall { .. } => TI_STRING8_SMALL,
            TypeIdentifier::StringLarge { .. } => TI_STRING8_LARGE,
            TypeIdentifier::StronglyConnected { .. } => TI_STRONGLY_CONNECTED_COMPONENT,
            TypeIdentifier::Minimal(_) => EK_MINIMAL,
            TypeIdentifier::Complete(_) => EK_COMPLETE,
        }
    }

    /// Identifier is a direct content hash (EK_MINIMAL / EK_COMPLETE).
    pub const fn is_direct_hash(&self) -> bool {
        matches!(
            self,
            TypeIdentifier::Minimal(_) | TypeIdentifier::Complete(_)
        )
    }

    pub const fn is_complete(&self) -> bool {
        matches!(self, TypeIdentifier::Complete(_))
    }

    pub fn encode(&self, w: &mut CdrWriter) {
        w.write_u8(self.discriminator());
        match self {
            TypeIdentifier::Primitive(_) => {}
            TypeIdentifier::StringSmall { bound } => w.write_u8(*bound),
            TypeIdentifier::StringLarge { bound } => w.write_u32(*bound),
            TypeIdentifier::StronglyConnected {
                sc_component_id,
                scc_length,
                scc_index,
            } => {
                let hash = match sc_component_id {
                    TypeObjectHashId::Complete(h) | TypeObjectHashId::Minimal(h) => h,
                };
                w.write_u8(sc_component_id.discriminator());
                w.write_bytes(hash.as_bytes());
                w.write_i32(*scc_length);
                w.write_i32(*scc_index);
            }
            TypeIdentifier::Minimal(hash) | TypeIdentifier::Complete(hash) => {
                w.write_bytes(hash.as_bytes());
            }
        }
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        let discriminator = r.read_u8()?;
        match discriminator {
            TI_STRING8_SMALL => Ok(TypeIdentifier::StringSmall {
                bound: r.read_u8()?,
            }),
            TI_STRING8_LARGE => Ok(TypeIdentifier::StringLarge {
                bound: r.read_u32()?,
            }),
            TI_STRONGLY_CONNECTED_COMPONENT => {
                let kind = r.read_u8()?;
                let hash = EquivalenceHash(r.read_array()?);
                // Remote input: a bad discriminator is a decode failure, not a
                // local contract violation.
                let sc_component_id = match kind {
                    EK_COMPLETE => TypeObjectHashId::Complete(hash),
                    EK_MINIMAL => TypeObjectHashId::Minimal(hash),
                    other => {
                        return Err(ParseError::InvalidValue(format!(
                            "strongly connected hash kind 0x{:02x}",
                            other
                        )))
                    }
                };
                Ok(TypeIdentifier::StronglyConnected {
                    sc_component_id,
                    scc_length: r.read_i32()?,
                    scc_index: r.read_i32()?,
                })
            }
            EK_MINIMAL => Ok(TypeIdentifier::Minimal(EquivalenceHash(r.read_array()?))),
            EK_COMPLETE => Ok(TypeIdentifier::Complete(EquivalenceHash(r.read_array()?))),
            kind if is_primitive_kind(kind) => Ok(TypeIdentifier::Primitive(kind)),
            other => Err(ParseError::InvalidValue(format!(
                "unknown TypeIdentifier discriminator 0x{:02x}",
                other
            ))),
        }
    }
}

/// Serialized type object (opaque to discovery).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeObject {
    pub kind: EquivalenceKind,
    pub data: Vec<u8>,
}

impl TypeObject {
    pub fn complete(data: Vec<u8>) -> Self {
        Self {
            kind: EquivalenceKind::Complete,
            data,
        }
    }

    pub fn minimal(data: Vec<u8>) -> Self {
        Self {
            kind: EquivalenceKind::Minimal,
            data,
        }
    }

    /// Hash-based identifier of this object.
    pub fn identifier(&self) -> TypeIdentifier {
        let hash = EquivalenceHash::compute(&self.data);
        match self.kind {
            EquivalenceKind::Complete => TypeIdentifier::Complete(hash),
            EquivalenceKind::Minimal => TypeIdentifier::Minimal(hash),
        }
    }

    pub fn encode(&self, w: &mut CdrWriter) {
        w.write_u8(self.kind.discriminator());
        w.write_octet_seq(&self.data);
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        let kind = match r.read_u8()? {
            EK_COMPLETE => EquivalenceKind::Complete,
            EK_MINIMAL => EquivalenceKind::Minimal,
            other => {
                return Err(ParseError::InvalidValue(format!(
                    "unknown TypeObject kind 0x{:02x}",
                    other
                )))
            }
        };
        Ok(Self {
            kind,
            data: r.read_octet_seq()?,
        })
    }
}

/// Dependency entry: identifier plus the size of its serialized type object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIdentifierWithSize {
    pub type_id: TypeIdentifier,
    pub typeobject_serialized_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIdentifierTypeObjectPair {
    pub type_identifier: TypeIdentifier,
    pub type_object: TypeObject,
}

/// (complete identifier, minimal identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeIdentifierPair {
    pub type_identifier1: TypeIdentifier,
    pub type_identifier2: TypeIdentifier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::cdr::Endianness;

    #[test]
    fn test_hash_is_truncated_md5() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        let hash = EquivalenceHash::compute(b"");
        assert_eq!(
            hash.0,
            [0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8]
        );
    }

    #[test]
    fn test_hash_id_wrong_variant_is_error() {
        let hash = EquivalenceHash([7; 14]);
        let id = TypeObjectHashId::Complete(hash);
        assert_eq!(id.complete_hash(), Ok(&hash));
        assert_eq!(
            id.minimal_hash(),
            Err(UnionError::WrongVariant {
                requested: EK_MINIMAL,
                active: EK_COMPLETE
            })
        );
    }

    #[test]
    fn test_hash_id_invalid_discriminator() {
        let mut id = TypeObjectHashId::Minimal(EquivalenceHash([1; 14]));
        assert_eq!(
            id.set(0x42, EquivalenceHash([2; 14])),
            Err(UnionError::InvalidDiscriminator(0x42))
        );
        // Unchanged after a failed set.
        assert_eq!(id.discriminator(), EK_MINIMAL);

        id.set(EK_COMPLETE, EquivalenceHash([2; 14]))
            .expect("valid discriminator");
        assert_eq!(id.complete_hash(), Ok(&EquivalenceHash([2; 14])));
    }

    #[test]
    fn test_identifier_codec() {
        let ids = [
            TypeIdentifier::Primitive(TK_INT32),
            TypeIdentifier::StringSmall { bound: 64 },
            TypeIdentifier::StringLarge { bound: 4096 },
            TypeIdentifier::StronglyConnected {
                sc_component_id: TypeObjectHashId::Minimal(EquivalenceHash([3; 14])),
                scc_length: 2,
                scc_index: 1,
            },
            TypeIdentifier::Complete(EquivalenceHash([9; 14])),
        ];
        for endianness in [Endianness::Little, Endianness::Big] {
            let mut w = CdrWriter::new(endianness);
            for id in &ids {
                id.encode(&mut w);
            }
            let bytes = w.into_inner();
            let mut r = CdrReader::new(&bytes, endianness);
            for id in &ids {
                assert_eq!(&TypeIdentifier::decode(&mut r).expect("decode"), id);
            }
        }
    }

    #[test]
    fn test_unknown_discriminator_rejected() {
        let bytes = [0xEEu8];
        let mut r = CdrReader::new(&bytes, Endianness::Little);
        assert!(TypeIdentifier::decode(&mut r).is_err());
    }

    #[test]
    fn test_direct_hash_predicate() {
        assert!(TypeIdentifier::Minimal(EquivalenceHash::default()).is_direct_hash());
        assert!(!TypeIdentifier::Primitive(TK_BOOLEAN).is_direct_hash());
        assert!(!TypeIdentifier::StringSmall { bound: 1 }.is_direct_hash());
    }
}

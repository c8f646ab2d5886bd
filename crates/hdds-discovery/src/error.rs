// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared across the discovery subsystem.
//!
//! Network-facing failures (malformed payloads, unknown participants) are
//! transient: they are logged and counted, never propagated past the receive
//! path. The types below surface to local callers.

use crate::guid::{EntityId, Guid, GuidPrefix};
use thiserror::Error;

/// Discovery operation errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Requested participant not present in the registry.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(GuidPrefix),

    /// Requested endpoint not present in the local registry.
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(Guid),

    /// Parsing or decoding failed.
    #[error("Parse failed: {0}")]
    ParseFailed(#[from] ParseError),

    /// Proxy pool reached its configured maximum.
    #[error("Resource exhausted: {0}")]
    Pool(#[from] PoolError),

    /// Generic invalid data or invariant violation.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Tagged value accessed through the wrong variant.
    #[error("Contract violation: {0}")]
    Contract(#[from] UnionError),

    /// Builtin channel required by the operation is not enabled.
    #[error("Channel not available: {0:?}")]
    ChannelUnavailable(EntityId),

    /// Builtin protocol initialization failed.
    #[error("Initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Announcer or lease checker thread could not be started.
    #[error("Discovery thread spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Decode errors for wire payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("buffer too short: need {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unsupported encapsulation 0x{0:02x}")]
    UnsupportedEncapsulation(u8),

    #[error("missing mandatory parameter 0x{0:04x}")]
    MissingParameter(u16),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Proxy pool errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every slot up to the configured maximum is in use.
    #[error("{pool} pool exhausted ({maximum} slots in use)")]
    Exhausted { pool: &'static str, maximum: usize },

    /// Handle does not refer to an acquired slot.
    #[error("{pool} pool: stale handle {index}")]
    StaleHandle { pool: &'static str, index: usize },
}

/// Wrong-variant access or invalid discriminator on a tagged value.
///
/// Raised only by local misuse; these indicate a programming or protocol
/// version bug and are never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnionError {
    #[error("discriminator 0x{0:02x} does not select any variant")]
    InvalidDiscriminator(u8),

    #[error("accessed variant 0x{requested:02x} while active variant is 0x{active:02x}")]
    WrongVariant { requested: u8, active: u8 },
}

/// Builtin protocol initialization failure.
///
/// Every channel created before the failing one has already been released
/// when this error is returned.
#[derive(Debug, Error)]
#[error("failed to create builtin channel {entity:?}: {reason}")]
pub struct InitError {
    pub entity: EntityId,
    pub reason: String,
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

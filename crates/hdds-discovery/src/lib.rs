// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hdds-discovery
//!
//! RTPS builtin discovery for HDDS: participant discovery (SPDP), endpoint
//! discovery (SEDP) with QoS matching, and the XTypes type lookup service.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        BuiltinProtocols                             |
//! |   init (all-or-nothing) | receive routing | announcer / lease tasks |
//! +---------------------------------------------------------------------+
//! |   PDP                  |   EDP                  |   Type Lookup       |
//! |   participant registry |   endpoint stores      |   request / reply   |
//! |   filtering, leases    |   matcher, listeners   |   dependency cache  |
//! +---------------------------------------------------------------------+
//! |   channel: builtin writers/readers over history change logs         |
//! +---------------------------------------------------------------------+
//! |   Transport (external): delivery, repair, sockets                   |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hdds_discovery::{
//!     BuiltinProtocols, CacheChange, Destination, DiscoveryConfig, GuidPrefix,
//!     InMemoryTypeRegistry, Transport, TransportChannelFactory,
//! };
//! use std::sync::Arc;
//!
//! struct Udp;
//! impl Transport for Udp {
//!     fn send(&self, _destinations: &[Destination], _change: &CacheChange) {
//!         // serialize into RTPS DATA submessages and send
//!     }
//! }
//!
//! fn main() -> hdds_discovery::Result<()> {
//!     let config = DiscoveryConfig::from_file("discovery.toml")?;
//!     let protocols = BuiltinProtocols::init(
//!         config,
//!         GuidPrefix::new([0x01, 0xAA], 0x0a00_0001, 4242, 0),
//!         Arc::new(TransportChannelFactory::new(Arc::new(Udp))),
//!         Arc::new(InMemoryTypeRegistry::new()),
//!     )?;
//!     protocols.start()?;
//!     // feed inbound builtin DATA with protocols.receive(reader, &change)
//!     Ok(())
//! }
//! ```
//!
//! ## Modules Overview
//!
//! - [`pdp`] - participant lifecycle, filtering, leases
//! - [`edp`] - endpoint descriptions and matching
//! - [`type_lookup`] - getTypes / getTypeDependencies service
//! - [`wire`] - CDR, encapsulation and parameter list codecs

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Function-entry tracing macro (enabled with the `trace` feature).
pub mod logging;

/// Builtin endpoint bitmask and participant filtering flags.
pub mod builtin;
/// Builtin protocols orchestrator.
pub mod builtin_protocols;
/// Builtin discovery channels, transport and channel factory seams.
pub mod channel;
/// Discovery configuration (programmatic and TOML).
pub mod config;
/// Endpoint Discovery Protocol.
pub mod edp;
/// Error types.
pub mod error;
/// GUIDs, prefixes and builtin entity ids.
pub mod guid;
/// Change logs for builtin channels.
pub mod history;
/// Locators (transport addresses).
pub mod locator;
/// Discovery counters.
pub mod metrics;
/// Participant Discovery Protocol.
pub mod pdp;
/// Proxy data and bounded proxy pools.
pub mod proxy;
/// QoS subset used for endpoint matching.
pub mod qos;
/// Type lookup service.
pub mod type_lookup;
/// Wire codecs for discovery payloads.
pub mod wire;

pub use builtin::{BuiltinEndpointSet, ParticipantFilteringFlags};
pub use builtin_protocols::BuiltinProtocols;
pub use channel::{
    BuiltinReader, BuiltinWriter, ChannelAttributes, ChannelError, ChannelFactory, Destination,
    Transport, TransportChannelFactory,
};
pub use config::{ConfigError, DiscoveryConfig};
pub use edp::{EndpointDiscovery, MatchListener, TypeObserver};
pub use error::{DiscoveryError, InitError, ParseError, PoolError, Result, UnionError};
pub use guid::{EndpointKind, EntityId, Guid, GuidPrefix};
pub use history::{CacheChange, ChangeKind, ChangeListener, InstanceHandle, SequenceNumber};
pub use locator::Locator;
pub use metrics::{DiscoveryMetrics, MetricsSnapshot};
pub use pdp::{ParticipantDiscovery, ParticipantListener, ParticipantState, RemovalReason};
pub use proxy::{EndpointProxyData, ParticipantProxyData};
pub use qos::{Durability, EndpointQos, LivelinessKind, Reliability};
pub use type_lookup::{
    InMemoryTypeRegistry, SampleIdentity, TypeLookupListener, TypeLookupManager, TypeRegistry,
};

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.
//!
//! ```toml
//! participant_name = "sensor-node"
//! lease_duration_ms = 20000
//! announcement_period_ms = 3000
//! ignore_participant_flags = ["filter_different_host"]
//! initial_peers = ["192.168.1.20:7410"]
//!
//! [allocation.participants]
//! initial = 4
//! maximum = 32
//!
//! [type_lookup]
//! use_client = true
//! use_server = false
//! ```

use crate::builtin::{BuiltinEndpointSet, ParticipantFilteringFlags};
use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Participant filtering policy entries (combined into a bitmask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFlag {
    FilterDifferentHost,
    FilterDifferentProcess,
    FilterSameProcess,
}

/// Pool sizing: pre-allocated slots and hard ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLimits {
    pub initial: usize,
    pub maximum: usize,
}

impl AllocationLimits {
    pub const fn new(initial: usize, maximum: usize) -> Self {
        Self { initial, maximum }
    }
}

/// Proxy pool sizing per proxy kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub participants: AllocationLimits,
    pub readers: AllocationLimits,
    pub writers: AllocationLimits,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            participants: AllocationLimits::new(8, 256),
            readers: AllocationLimits::new(32, 4096),
            writers: AllocationLimits::new(32, 4096),
        }
    }
}

/// Which SEDP channel pairs this participant runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdpConfig {
    /// Publications writer + subscriptions reader (announce local writers).
    pub use_publication_writer_and_subscription_reader: bool,
    /// Publications reader + subscriptions writer (announce local readers).
    pub use_publication_reader_and_subscription_writer: bool,
}

impl Default for EdpConfig {
    fn default() -> Self {
        Self {
            use_publication_writer_and_subscription_reader: true,
            use_publication_reader_and_subscription_writer: true,
        }
    }
}

/// Type lookup service sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeLookupConfig {
    /// Request writer + reply reader.
    pub use_client: bool,
    /// Request reader + reply writer.
    pub use_server: bool,
}

impl Default for TypeLookupConfig {
    fn default() -> Self {
        Self {
            use_client: true,
            use_server: true,
        }
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Name announced in PID_ENTITY_NAME.
    pub participant_name: String,

    /// Lease duration announced to peers (milliseconds).
    pub lease_duration_ms: u64,

    /// Period of participant re-announcement (milliseconds).
    pub announcement_period_ms: u64,

    /// Period of the lease expiry check (milliseconds).
    pub lease_check_period_ms: u64,

    /// Remote announcements matching any of these are ignored.
    pub ignore_participant_flags: Vec<FilterFlag>,

    /// Prefer unicast metatraffic locators when the peer advertises some.
    pub avoid_builtin_multicast: bool,

    /// Extra SPDP destinations (unicast peers outside the multicast group).
    pub initial_peers: Vec<SocketAddr>,

    pub metatraffic_unicast: Vec<SocketAddr>,
    pub metatraffic_multicast: Vec<SocketAddr>,

    pub allocation: AllocationConfig,
    pub edp: EdpConfig,
    pub type_lookup: TypeLookupConfig,

    /// Opaque properties (PID_PROPERTY_LIST).
    pub properties: BTreeMap<String, String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            participant_name: "hdds-participant".to_string(),
            lease_duration_ms: 20_000,
            announcement_period_ms: 3_000,
            lease_check_period_ms: 1_000,
            ignore_participant_flags: Vec::new(),
            avoid_builtin_multicast: true,
            initial_peers: Vec::new(),
            metatraffic_unicast: Vec::new(),
            metatraffic_multicast: vec![SocketAddr::from(([239, 255, 0, 1], 7400))],
            allocation: AllocationConfig::default(),
            edp: EdpConfig::default(),
            type_lookup: TypeLookupConfig::default(),
            properties: BTreeMap::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_duration_ms == 0 {
            return Err(ConfigError::Invalid("lease_duration_ms must be > 0".into()));
        }
        if self.announcement_period_ms == 0
            || self.announcement_period_ms >= self.lease_duration_ms
        {
            return Err(ConfigError::Invalid(format!(
                "announcement_period_ms ({}) must be in 1..lease_duration_ms ({})",
                self.announcement_period_ms, self.lease_duration_ms
            )));
        }
        if self.lease_check_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "lease_check_period_ms must be > 0".into(),
            ));
        }

        let pools = [
            ("participants", self.allocation.participants),
            ("readers", self.allocation.readers),
            ("writers", self.allocation.writers),
        ];
        for (name, limits) in pools {
            if limits.maximum == 0 {
                return Err(ConfigError::Invalid(format!(
                    "allocation.{}.maximum must be > 0",
                    name
                )));
            }
            if limits.initial > limits.maximum {
                return Err(ConfigError::Invalid(format!(
                    "allocation.{}: initial ({}) exceeds maximum ({})",
                    name, limits.initial, limits.maximum
                )));
            }
        }

        Ok(())
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn announcement_period(&self) -> Duration {
        Duration::from_millis(self.announcement_period_ms)
    }

    pub fn lease_check_period(&self) -> Duration {
        Duration::from_millis(self.lease_check_period_ms)
    }

    pub fn filtering_flags(&self) -> ParticipantFilteringFlags {
        self.ignore_participant_flags
            .iter()
            .fold(ParticipantFilteringFlags::NO_FILTER, |acc, flag| {
                acc | match flag {
                    FilterFlag::FilterDifferentHost => {
                        ParticipantFilteringFlags::FILTER_DIFFERENT_HOST
                    }
                    FilterFlag::FilterDifferentProcess => {
                        ParticipantFilteringFlags::FILTER_DIFFERENT_PROCESS
                    }
                    FilterFlag::FilterSameProcess => ParticipantFilteringFlags::FILTER_SAME_PROCESS,
                }
            })
    }

    /// Builtin endpoint bitmask announced by the local participant.
    pub fn builtin_endpoints(&self) -> BuiltinEndpointSet {
        let mut set =
            BuiltinEndpointSet::PARTICIPANT_ANNOUNCER | BuiltinEndpointSet::PARTICIPANT_DETECTOR;
        if self.edp.use_publication_writer_and_subscription_reader {
            set |= BuiltinEndpointSet::PUBLICATION_ANNOUNCER
                | BuiltinEndpointSet::SUBSCRIPTION_DETECTOR;
        }
        if self.edp.use_publication_reader_and_subscription_writer {
            set |= BuiltinEndpointSet::PUBLICATION_DETECTOR
                | BuiltinEndpointSet::SUBSCRIPTION_ANNOUNCER;
        }
        if self.type_lookup.use_client {
            set |= BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_WRITER
                | BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_READER;
        }
        if self.type_lookup.use_server {
            set |= BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_READER
                | BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_WRITER;
        }
        set
    }

    pub fn unicast_locators(&self) -> Vec<Locator> {
        self.metatraffic_unicast.iter().copied().map(Locator::from).collect()
    }

    pub fn multicast_locators(&self) -> Vec<Locator> {
        self.metatraffic_multicast.iter().copied().map(Locator::from).collect()
    }

    pub fn initial_peer_locators(&self) -> Vec<Locator> {
        self.initial_peers.iter().copied().map(Locator::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        DiscoveryConfig::default()
            .validate()
            .expect("default config should validate");
    }

    #[test]
    fn test_from_toml_str() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            participant_name = "node-a"
            lease_duration_ms = 5000
            announcement_period_ms = 1000
            ignore_participant_flags = ["filter_different_host", "filter_same_process"]
            initial_peers = ["192.168.1.20:7410"]

            [allocation.participants]
            initial = 2
            maximum = 4

            [type_lookup]
            use_client = true
            use_server = false
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.participant_name, "node-a");
        assert_eq!(config.lease_duration(), Duration::from_secs(5));
        assert_eq!(config.allocation.participants, AllocationLimits::new(2, 4));
        assert_eq!(config.allocation.readers, AllocationConfig::default().readers);
        assert_eq!(config.initial_peer_locators().len(), 1);
        assert_eq!(
            config.filtering_flags(),
            ParticipantFilteringFlags::FILTER_DIFFERENT_HOST
                | ParticipantFilteringFlags::FILTER_SAME_PROCESS
        );
        assert!(!config.type_lookup.use_server);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = DiscoveryConfig {
            lease_duration_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DiscoveryConfig {
            announcement_period_ms: 30_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = DiscoveryConfig::default();
        config.allocation.writers = AllocationLimits::new(10, 5);
        let err = config.validate().expect_err("initial > maximum");
        assert!(err.to_string().contains("allocation.writers"));
    }

    #[test]
    fn test_builtin_endpoints_from_flags() {
        let mut config = DiscoveryConfig::default();
        config.edp.use_publication_reader_and_subscription_writer = false;
        config.type_lookup.use_server = false;

        let set = config.builtin_endpoints();
        assert!(set.contains(BuiltinEndpointSet::PUBLICATION_ANNOUNCER));
        assert!(set.contains(BuiltinEndpointSet::SUBSCRIPTION_DETECTOR));
        assert!(!set.contains(BuiltinEndpointSet::PUBLICATION_DETECTOR));
        assert!(set.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_WRITER));
        assert!(!set.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_WRITER));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader/writer endpoint description (SEDP DATA contents).

use super::pool::Poolable;
use crate::error::DiscoveryError;
use crate::guid::{EndpointKind, Guid};
use crate::locator::Locator;
use crate::qos::EndpointQos;
use crate::type_lookup::types::TypeIdentifier;

/// Endpoint proxy (local or remote reader/writer).
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointProxyData {
    pub guid: Guid,
    /// Owning participant (identity reference, not ownership).
    pub participant_guid: Guid,
    pub kind: EndpointKind,
    pub topic_name: String,
    pub type_name: String,
    pub qos: EndpointQos,
    /// Empty means "use the participant's locators".
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    /// Identifier of the data type, when the endpoint advertises one.
    pub type_id: Option<TypeIdentifier>,
}

impl Default for EndpointProxyData {
    fn default() -> Self {
        Self {
            guid: Guid::default(),
            participant_guid: Guid::default(),
            kind: EndpointKind::Reader,
            topic_name: String::new(),
            type_name: String::new(),
            qos: EndpointQos::default(),
            unicast_locators: Vec::new(),
            multicast_locators: Vec::new(),
            type_id: None,
        }
    }
}

impl Poolable for EndpointProxyData {}

impl EndpointProxyData {
    pub fn writer(guid: Guid, topic_name: &str, type_name: &str, qos: EndpointQos) -> Self {
        Self::new(guid, EndpointKind::Writer, topic_name, type_name, qos)
    }

    pub fn reader(guid: Guid, topic_name: &str, type_name: &str, qos: EndpointQos) -> Self {
        Self::new(guid, EndpointKind::Reader, topic_name, type_name, qos)
    }

    fn new(
        guid: Guid,
        kind: EndpointKind,
        topic_name: &str,
        type_name: &str,
        qos: EndpointQos,
    ) -> Self {
        Self {
            guid,
            participant_guid: Guid::participant(guid.prefix),
            kind,
            topic_name: topic_name.to_string(),
            type_name: type_name.to_string(),
            qos,
            ..Default::default()
        }
    }

    pub fn with_type_id(mut self, type_id: TypeIdentifier) -> Self {
        self.type_id = Some(type_id);
        self
    }

    /// Check the identity invariants.
    ///
    /// - The endpoint prefix equals the owning participant prefix.
    /// - The entity kind octet agrees with `kind`.
    /// - Topic and type names are present.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.guid.prefix != self.participant_guid.prefix {
            return Err(DiscoveryError::InvalidData(format!(
                "endpoint {} not owned by participant {}",
                self.guid, self.participant_guid
            )));
        }
        if self.guid.entity_id.endpoint_kind() != Some(self.kind) {
            return Err(DiscoveryError::InvalidData(format!(
                "entity id {:?} is not a {:?}",
                self.guid.entity_id, self.kind
            )));
        }
        if self.topic_name.is_empty() || self.type_name.is_empty() {
            return Err(DiscoveryError::InvalidData(format!(
                "endpoint {} without topic or type name",
                self.guid
            )));
        }
        Ok(())
    }
}

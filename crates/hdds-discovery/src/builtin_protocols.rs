// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin protocols orchestrator.
//!
//! Owns PDP, EDP and the type lookup manager, wires their capabilities
//! together and routes inbound changes to the right builtin reader.
//!
//! ```text
//!            ParticipantListener             TypeObserver
//!   PDP  ------------------------->  EDP  ------------------>  TypeLookup
//!    |                                                             ^
//!    +-------------------- ParticipantListener --------------------+
//! ```
//!
//! Init is all-or-nothing: if any builtin channel cannot be created, the
//! channels created before it are released and init fails.

use crate::channel::{ChannelFactory, ChannelScope};
use crate::config::DiscoveryConfig;
use crate::edp::EndpointDiscovery;
use crate::error::{DiscoveryError, InitError, Result};
use crate::guid::{EntityId, Guid, GuidPrefix};
use crate::history::CacheChange;
use crate::metrics::DiscoveryMetrics;
use crate::pdp::{ParticipantDiscovery, PeriodicTask};
use crate::type_lookup::{TypeLookupManager, TypeRegistry};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct BuiltinProtocols {
    config: DiscoveryConfig,
    factory: Arc<dyn ChannelFactory>,
    channels: Vec<Guid>,
    metrics: Arc<DiscoveryMetrics>,
    pdp: Arc<ParticipantDiscovery>,
    edp: Arc<EndpointDiscovery>,
    type_lookup: Arc<TypeLookupManager>,
    tasks: Mutex<Vec<PeriodicTask>>,
}

type Components = (ParticipantDiscovery, EndpointDiscovery, TypeLookupManager);

fn build(
    config: &DiscoveryConfig,
    local_prefix: GuidPrefix,
    registry: Arc<dyn TypeRegistry>,
    scope: &ChannelScope<'_>,
    metrics: &Arc<DiscoveryMetrics>,
) -> std::result::Result<Components, InitError> {
    let pdp = ParticipantDiscovery::new(config, local_prefix, scope, Arc::clone(metrics))?;
    let edp = EndpointDiscovery::new(
        config,
        local_prefix,
        Arc::clone(pdp.registry()),
        scope,
        Arc::clone(metrics),
    )?;
    let type_lookup =
        TypeLookupManager::new(config, local_prefix, registry, scope, Arc::clone(metrics))?;
    Ok((pdp, edp, type_lookup))
}

impl BuiltinProtocols {
    /// Validate `config`, create every builtin channel and wire the
    /// protocols together. Nothing is sent until [`start`](Self::start).
    pub fn init(
        config: DiscoveryConfig,
        local_prefix: GuidPrefix,
        factory: Arc<dyn ChannelFactory>,
        registry: Arc<dyn TypeRegistry>,
    ) -> Result<Self> {
        crate::trace_fn!("BuiltinProtocols::init");
        config.validate()?;
        let metrics = Arc::new(DiscoveryMetrics::new());

        let scope = ChannelScope::new(factory.as_ref());
        let built = build(&config, local_prefix, registry, &scope, &metrics);
        let (pdp, edp, type_lookup) = match built {
            Ok(components) => components,
            Err(err) => {
                scope.rollback();
                return Err(DiscoveryError::Init(err));
            }
        };
        let channels = scope.commit();

        let pdp = Arc::new(pdp);
        let edp = Arc::new(edp);
        let type_lookup = Arc::new(type_lookup);
        pdp.add_listener(edp.clone());
        pdp.add_listener(type_lookup.clone());
        edp.set_type_observer(type_lookup.clone());

        log::info!(
            "[builtin] participant {} ready ({} builtin channels)",
            pdp.local_data().guid,
            channels.len()
        );

        Ok(Self {
            config,
            factory,
            channels,
            metrics,
            pdp,
            edp,
            type_lookup,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Announce the local participant and start the periodic announcer and
    /// lease checker threads.
    pub fn start(&self) -> Result<()> {
        crate::trace_fn!("BuiltinProtocols::start");
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Ok(());
        }
        self.pdp.announce_participant_state(true, false);

        let spawned = self.pdp.spawn_announcer().and_then(|announcer| {
            tasks.push(announcer);
            self.pdp.spawn_lease_checker(self.config.lease_check_period())
        });
        match spawned {
            Ok(checker) => {
                tasks.push(checker);
                Ok(())
            }
            Err(err) => {
                log::error!("[builtin] failed to spawn discovery thread: {}", err);
                tasks.clear();
                Err(DiscoveryError::Spawn(err))
            }
        }
    }

    /// Stop the background threads and tell peers we are leaving.
    pub fn stop(&self) {
        crate::trace_fn!("BuiltinProtocols::stop");
        let tasks: Vec<PeriodicTask> = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.stop();
        }
        self.pdp.announce_participant_state(false, true);
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// Hand an inbound change to the builtin reader `reader`.
    ///
    /// Returns `Ok(false)` when the reader discarded it (unmatched writer,
    /// duplicate), and `ChannelUnavailable` when that reader is not part of
    /// this participant's configuration.
    pub fn receive(&self, reader: EntityId, change: &CacheChange) -> Result<bool> {
        crate::trace_fn!("BuiltinProtocols::receive");
        let accepted = match reader {
            EntityId::SPDP_READER => self.pdp.reader().receive(change, &*self.pdp),
            EntityId::SEDP_PUBLICATIONS_READER => self
                .edp
                .publications_reader()
                .ok_or(DiscoveryError::ChannelUnavailable(reader))?
                .receive(change, &*self.edp),
            EntityId::SEDP_SUBSCRIPTIONS_READER => self
                .edp
                .subscriptions_reader()
                .ok_or(DiscoveryError::ChannelUnavailable(reader))?
                .receive(change, &*self.edp),
            EntityId::TYPELOOKUP_REQUEST_READER => self
                .type_lookup
                .request_reader()
                .ok_or(DiscoveryError::ChannelUnavailable(reader))?
                .receive(change, &*self.type_lookup),
            EntityId::TYPELOOKUP_REPLY_READER => self
                .type_lookup
                .reply_reader()
                .ok_or(DiscoveryError::ChannelUnavailable(reader))?
                .receive(change, &*self.type_lookup),
            other => return Err(DiscoveryError::ChannelUnavailable(other)),
        };
        Ok(accepted)
    }

    pub fn local_prefix(&self) -> GuidPrefix {
        self.pdp.local_prefix()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn pdp(&self) -> &Arc<ParticipantDiscovery> {
        &self.pdp
    }

    pub fn edp(&self) -> &Arc<EndpointDiscovery> {
        &self.edp
    }

    pub fn type_lookup(&self) -> &Arc<TypeLookupManager> {
        &self.type_lookup
    }

    pub fn metrics(&self) -> &Arc<DiscoveryMetrics> {
        &self.metrics
    }

    /// Builtin channels owned by this participant.
    pub fn channels(&self) -> &[Guid] {
        &self.channels
    }
}

impl Drop for BuiltinProtocols {
    fn drop(&mut self) {
        self.stop();
        for guid in self.channels.iter().rev() {
            self.factory.delete_channel(*guid);
        }
    }
}

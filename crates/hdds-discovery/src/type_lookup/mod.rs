// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type lookup service (XTypes 7.6.3.3).
//!
//! Request/reply RPC over two reliable volatile channel pairs:
//!
//! ```text
//!   client                                 server
//!   request writer  ----- getTypes ----->  request reader
//!   reply reader    <---- reply ---------  reply writer
//! ```
//!
//! The client side issues `getTypes` / `getTypeDependencies` and returns the
//! request identity at once; replies are correlated through a pending table
//! and handed to [`TypeLookupListener`]s. Paginated dependency replies are
//! followed up automatically until the last page, then reported once.
//!
//! The server side answers from a [`TypeRegistry`], caching dependency sets
//! in a [`DependencyCache`] while they are being paged out.

mod cache;
mod messages;
mod registry;
pub mod types;

pub use cache::{DependencyCache, DependencyPage, DEPENDENCY_PAGE_SIZE};
pub use messages::{
    GetTypeDependenciesIn, GetTypeDependenciesOut, GetTypesIn, GetTypesOut, ReplyHeader,
    RequestHeader, ReturnCode, SampleIdentity, TypeLookupCall, TypeLookupReply,
    TypeLookupRequest, TypeLookupReturn, GET_DEPENDENCIES_HASH, GET_TYPES_HASH,
};
pub use registry::{DependencyError, InMemoryTypeRegistry, TypeRegistry};

use crate::builtin::BuiltinEndpointSet;
use crate::channel::{BuiltinReader, BuiltinWriter, ChannelAttributes, ChannelScope};
use crate::config::DiscoveryConfig;
use crate::edp::TypeObserver;
use crate::error::InitError;
use crate::guid::{EntityId, Guid, GuidPrefix};
use crate::history::{CacheChange, ChangeKind, ChangeListener, InstanceHandle, SequenceNumber};
use crate::metrics::DiscoveryMetrics;
use crate::pdp::{ParticipantListener, RemovalReason};
use crate::proxy::{EndpointProxyData, ParticipantProxyData};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use self::types::{
    TypeIdentifier, TypeIdentifierPair, TypeIdentifierTypeObjectPair, TypeIdentifierWithSize,
};

const INSTANCE_NAME_PREFIX: &str = "dds.builtin.TOS.";

/// Reply notifications for requests issued through the manager.
///
/// `request` is the identity returned by the call that started the
/// exchange, also for dependency sets fetched over several pages.
pub trait TypeLookupListener: Send + Sync {
    fn on_types_reply(&self, _request: SampleIdentity, _result: &Result<GetTypesOut, ReturnCode>) {}

    fn on_dependencies_reply(
        &self,
        _request: SampleIdentity,
        _result: &Result<Vec<TypeIdentifierWithSize>, ReturnCode>,
    ) {
    }
}

enum PendingCall {
    Types {
        type_ids: Vec<TypeIdentifier>,
        collected: GetTypesOut,
        last_error: Option<ReturnCode>,
    },
    Dependencies {
        type_ids: Vec<TypeIdentifier>,
        accumulated: Vec<TypeIdentifierWithSize>,
    },
}

impl PendingCall {
    fn for_call(call: &TypeLookupCall) -> Self {
        match call {
            TypeLookupCall::GetTypes(input) => PendingCall::Types {
                type_ids: input.type_ids.clone(),
                collected: GetTypesOut::default(),
                last_error: None,
            },
            TypeLookupCall::GetDependencies(input) => PendingCall::Dependencies {
                type_ids: input.type_ids.clone(),
                accumulated: Vec::new(),
            },
        }
    }
}

struct PendingRequest {
    origin: SampleIdentity,
    call: PendingCall,
    /// Request writer change carrying the request, once written.
    change: Option<SequenceNumber>,
    /// Servers the request went to that have not answered yet.
    outstanding: usize,
}

/// What a correlated reply does to its pending request.
enum Step {
    /// Other servers may still resolve it.
    Wait,
    Finish(Option<ReturnCode>),
    FollowUp(i32),
    /// Reply operation differs from the request's.
    Mismatch,
}

enum Outcome {
    Nothing,
    Types(Vec<TypeIdentifier>, Result<GetTypesOut, ReturnCode>),
    Dependencies(Result<Vec<TypeIdentifierWithSize>, ReturnCode>),
    FollowUp(SampleIdentity, TypeLookupCall),
}

/// Type fetched on behalf of remote endpoints.
struct ObservedType {
    request: SampleIdentity,
    /// Participants owning endpoints that use the type.
    users: HashSet<GuidPrefix>,
}

fn merge_types(collected: &mut GetTypesOut, out: GetTypesOut) {
    for pair in out.types {
        if !collected
            .types
            .iter()
            .any(|known| known.type_identifier == pair.type_identifier)
        {
            collected.types.push(pair);
        }
    }
    for pair in out.complete_to_minimal {
        if !collected.complete_to_minimal.contains(&pair) {
            collected.complete_to_minimal.push(pair);
        }
    }
}

fn resolves(out: &GetTypesOut, type_id: &TypeIdentifier) -> bool {
    out.types.iter().any(|pair| pair.type_identifier == *type_id)
}

/// Service instance name for a participant: `dds.builtin.TOS.` followed by
/// the lower-cased GUID without separators.
pub fn instance_name_for(participant: &Guid) -> String {
    let guid: String = participant
        .to_string()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '.' && *c != '|')
        .collect();
    format!("{}{}", INSTANCE_NAME_PREFIX, guid)
}

fn return_code_for(err: &DependencyError) -> ReturnCode {
    match err {
        DependencyError::UnknownIdentifier(_) => ReturnCode::NoData,
        DependencyError::NotADirectHash(_) => ReturnCode::BadParameter,
    }
}

pub struct TypeLookupManager {
    local_prefix: GuidPrefix,
    instance_name: String,
    avoid_multicast: bool,
    registry: Arc<dyn TypeRegistry>,
    request_writer: Option<Arc<BuiltinWriter>>,
    reply_reader: Option<Arc<BuiltinReader>>,
    request_reader: Option<Arc<BuiltinReader>>,
    reply_writer: Option<Arc<BuiltinWriter>>,
    sequence: AtomicI64,
    pending: Mutex<HashMap<SampleIdentity, PendingRequest>>,
    cache: DependencyCache,
    /// Identifiers requested because a remote endpoint used them.
    requested: Mutex<HashMap<TypeIdentifier, ObservedType>>,
    listeners: RwLock<Vec<Arc<dyn TypeLookupListener>>>,
    metrics: Arc<DiscoveryMetrics>,
}

impl TypeLookupManager {
    /// Create the client and/or server channels selected by
    /// `config.type_lookup`.
    pub fn new(
        config: &DiscoveryConfig,
        local_prefix: GuidPrefix,
        registry: Arc<dyn TypeRegistry>,
        scope: &ChannelScope<'_>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Result<Self, InitError> {
        crate::trace_fn!("TypeLookupManager::new");
        let guid = |entity| Guid::new(local_prefix, entity);

        let (request_writer, reply_reader) = if config.type_lookup.use_client {
            (
                Some(scope.writer(
                    guid(EntityId::TYPELOOKUP_REQUEST_WRITER),
                    EntityId::TYPELOOKUP_REQUEST_READER,
                    ChannelAttributes::TYPE_LOOKUP,
                )?),
                Some(scope.reader(
                    guid(EntityId::TYPELOOKUP_REPLY_READER),
                    ChannelAttributes::TYPE_LOOKUP,
                )?),
            )
        } else {
            (None, None)
        };

        let (request_reader, reply_writer) = if config.type_lookup.use_server {
            (
                Some(scope.reader(
                    guid(EntityId::TYPELOOKUP_REQUEST_READER),
                    ChannelAttributes::TYPE_LOOKUP,
                )?),
                Some(scope.writer(
                    guid(EntityId::TYPELOOKUP_REPLY_WRITER),
                    EntityId::TYPELOOKUP_REPLY_READER,
                    ChannelAttributes::TYPE_LOOKUP,
                )?),
            )
        } else {
            (None, None)
        };

        let instance_name = instance_name_for(&Guid::participant(local_prefix));
        log::info!(
            "[TypeLookup] service {} (client={}, server={})",
            instance_name,
            request_writer.is_some(),
            request_reader.is_some()
        );

        Ok(Self {
            local_prefix,
            instance_name,
            avoid_multicast: config.avoid_builtin_multicast,
            registry,
            request_writer,
            reply_reader,
            request_reader,
            reply_writer,
            sequence: AtomicI64::new(0),
            pending: Mutex::new(HashMap::new()),
            cache: DependencyCache::new(),
            requested: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            metrics,
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn TypeLookupListener>) {
        self.listeners.write().push(listener);
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn registry(&self) -> &Arc<dyn TypeRegistry> {
        &self.registry
    }

    pub fn request_writer(&self) -> Option<&Arc<BuiltinWriter>> {
        self.request_writer.as_ref()
    }

    pub fn reply_reader(&self) -> Option<&Arc<BuiltinReader>> {
        self.reply_reader.as_ref()
    }

    pub fn request_reader(&self) -> Option<&Arc<BuiltinReader>> {
        self.request_reader.as_ref()
    }

    pub fn reply_writer(&self) -> Option<&Arc<BuiltinWriter>> {
        self.reply_writer.as_ref()
    }

    /// Ask matched servers for the type objects of `type_ids`.
    ///
    /// Returns `None` when the client side is disabled.
    pub fn get_types(&self, type_ids: Vec<TypeIdentifier>) -> Option<SampleIdentity> {
        crate::trace_fn!("TypeLookupManager::get_types");
        self.start_request(TypeLookupCall::GetTypes(GetTypesIn { type_ids }))
    }

    /// Ask matched servers for the full dependency set of `type_ids`.
    ///
    /// Every page is fetched before listeners hear about the result.
    /// Returns `None` when the client side is disabled.
    pub fn get_type_dependencies(&self, type_ids: Vec<TypeIdentifier>) -> Option<SampleIdentity> {
        crate::trace_fn!("TypeLookupManager::get_type_dependencies");
        self.start_request(TypeLookupCall::GetDependencies(GetTypeDependenciesIn {
            type_ids,
            continuation_point: 0,
        }))
    }

    /// Drop a request (and any follow-up) started with `request`.
    pub fn cancel_request(&self, request: &SampleIdentity) -> bool {
        let cancelled: Vec<PendingRequest> = {
            let mut pending = self.pending.lock();
            let keys: Vec<SampleIdentity> = pending
                .iter()
                .filter(|(_, entry)| entry.origin == *request)
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| pending.remove(key)).collect()
        };
        if let Some(writer) = &self.request_writer {
            for seq in cancelled.iter().filter_map(|entry| entry.change) {
                writer.history().remove(seq);
            }
        }
        self.requested
            .lock()
            .retain(|_, observed| observed.request != *request);
        !cancelled.is_empty()
    }

    /// `true` while any page of `request` is outstanding.
    pub fn is_pending(&self, request: &SampleIdentity) -> bool {
        self.pending
            .lock()
            .values()
            .any(|entry| entry.origin == *request)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn dependency_cache(&self) -> &DependencyCache {
        &self.cache
    }

    /// `true` while `type_id` counts as fetched (or being fetched) for a
    /// remote endpoint.
    pub fn is_type_requested(&self, type_id: &TypeIdentifier) -> bool {
        self.requested.lock().contains_key(type_id)
    }

    /// Server-side `getTypes` resolution.
    ///
    /// Unknown identifiers are skipped. When no requested identifier is a
    /// complete hash the reply also maps each result to its minimal id (the
    /// requested id itself if the registry has no minimal one).
    pub fn get_registered_type_object(&self, type_ids: &[TypeIdentifier]) -> GetTypesOut {
        crate::trace_fn!("TypeLookupManager::get_registered_type_object");
        let with_minimal = !type_ids.iter().any(TypeIdentifier::is_complete);
        let mut out = GetTypesOut::default();
        for type_id in type_ids {
            let Some(type_object) = self.registry.lookup(type_id) else {
                log::debug!("[TypeLookup] getTypes: {:?} not registered", type_id);
                continue;
            };
            out.types.push(TypeIdentifierTypeObjectPair {
                type_identifier: *type_id,
                type_object,
            });
            if with_minimal {
                out.complete_to_minimal.push(TypeIdentifierPair {
                    type_identifier1: *type_id,
                    type_identifier2: self.registry.minimal_identifier(type_id).unwrap_or(*type_id),
                });
            }
        }
        out
    }

    /// Server-side `getTypeDependencies` resolution: one page starting at
    /// `continuation_point`.
    pub fn get_registered_type_dependencies(
        &self,
        type_ids: &[TypeIdentifier],
        continuation_point: i32,
    ) -> Result<GetTypeDependenciesOut, ReturnCode> {
        crate::trace_fn!("TypeLookupManager::get_registered_type_dependencies");
        let cursor = u32::try_from(continuation_point).map_err(|_| ReturnCode::BadParameter)?;
        let page = self
            .cache
            .page(type_ids, cursor, || self.registry.dependencies(type_ids))
            .map_err(|err| {
                log::debug!("[TypeLookup] getTypeDependencies failed: {}", err);
                return_code_for(&err)
            })?;
        Ok(GetTypeDependenciesOut {
            dependent_typeids: page.entries,
            continuation_point: page.continuation_point as i32,
        })
    }

    fn next_request_id(&self, writer: &BuiltinWriter) -> SampleIdentity {
        SampleIdentity::new(
            writer.guid(),
            self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
        )
    }

    fn start_request(&self, call: TypeLookupCall) -> Option<SampleIdentity> {
        let Some(writer) = self.request_writer.as_ref() else {
            log::debug!("[TypeLookup] client disabled, request not sent");
            return None;
        };
        let request_id = self.next_request_id(writer);
        self.issue(request_id, call);
        Some(request_id)
    }

    /// Register `request_id` as a new exchange and send it.
    fn issue(&self, request_id: SampleIdentity, call: TypeLookupCall) {
        let mut pending = self.pending.lock();
        self.register(&mut pending, request_id, request_id, PendingCall::for_call(&call));
        drop(pending);
        self.write_request(request_id, call);
    }

    fn register(
        &self,
        pending: &mut HashMap<SampleIdentity, PendingRequest>,
        request_id: SampleIdentity,
        origin: SampleIdentity,
        call: PendingCall,
    ) {
        let outstanding = self
            .request_writer
            .as_ref()
            .map_or(0, |writer| writer.matched_reader_count())
            .max(1);
        pending.insert(
            request_id,
            PendingRequest {
                origin,
                call,
                change: None,
                outstanding,
            },
        );
    }

    /// Write a registered request. Registration comes first: the reply may
    /// arrive before `write` returns.
    fn write_request(&self, request_id: SampleIdentity, call: TypeLookupCall) {
        let Some(writer) = self.request_writer.as_ref() else {
            return;
        };
        if !self.pending.lock().contains_key(&request_id) {
            log::debug!("[TypeLookup] {:?} cancelled before sending", request_id);
            return;
        }

        let request = TypeLookupRequest {
            header: RequestHeader {
                request_id,
                instance_name: self.instance_name.clone(),
            },
            call,
        };
        let seq = writer.write(request.encode(), ChangeKind::Alive, InstanceHandle::default());
        let answered = match self.pending.lock().get_mut(&request_id) {
            Some(entry) => {
                entry.change = Some(seq);
                false
            }
            None => true,
        };
        if answered {
            writer.history().remove(seq);
        }
        DiscoveryMetrics::bump(&self.metrics.type_requests_sent);
        log::debug!("[TypeLookup] sent {:?}", request_id);
    }

    fn on_request(&self, change: &CacheChange) {
        let request = match TypeLookupRequest::decode(&change.payload) {
            Ok(request) => request,
            Err(err) => {
                log::debug!("[TypeLookup] dropping request: {}", err);
                DiscoveryMetrics::bump(&self.metrics.dropped_samples);
                return;
            }
        };
        let Some(writer) = self.reply_writer.as_ref() else {
            return;
        };
        log::debug!(
            "[TypeLookup] request {:?} from {}",
            request.header.request_id,
            request.header.instance_name
        );

        let result = match &request.call {
            TypeLookupCall::GetTypes(input) => {
                TypeLookupReturn::GetTypes(Ok(self.get_registered_type_object(&input.type_ids)))
            }
            TypeLookupCall::GetDependencies(input) => TypeLookupReturn::GetDependencies(
                self.get_registered_type_dependencies(&input.type_ids, input.continuation_point),
            ),
        };
        let reply = TypeLookupReply {
            header: ReplyHeader {
                related_request_id: request.header.request_id,
            },
            result,
        };
        let seq = writer.write(reply.encode(), ChangeKind::Alive, InstanceHandle::default());
        // Handed to the transport; replies are never re-sent by us.
        writer.history().remove(seq);
    }

    fn on_reply(&self, change: &CacheChange) {
        let reply = match TypeLookupReply::decode(&change.payload) {
            Ok(reply) => reply,
            Err(err) => {
                log::debug!("[TypeLookup] dropping reply: {}", err);
                DiscoveryMetrics::bump(&self.metrics.dropped_samples);
                return;
            }
        };
        let Some(writer) = self.request_writer.as_ref() else {
            return;
        };
        let related = reply.header.related_request_id;
        if related.writer_guid != writer.guid() {
            log::trace!("[TypeLookup] reply for another client {:?}", related);
            return;
        }

        let (origin, change, outcome) = {
            let mut pending = self.pending.lock();
            let Some(entry) = pending.get_mut(&related) else {
                log::debug!("[TypeLookup] reply for unknown request {:?}", related);
                return;
            };
            DiscoveryMetrics::bump(&self.metrics.type_replies_received);
            entry.outstanding = entry.outstanding.saturating_sub(1);
            let outstanding = entry.outstanding;
            let step = match (&mut entry.call, reply.result) {
                (
                    PendingCall::Types {
                        type_ids,
                        collected,
                        last_error,
                    },
                    TypeLookupReturn::GetTypes(result),
                ) => {
                    match result {
                        Ok(out) => merge_types(collected, out),
                        Err(code) => *last_error = Some(code),
                    }
                    if outstanding == 0 || type_ids.iter().all(|id| resolves(&*collected, id)) {
                        Step::Finish(None)
                    } else {
                        Step::Wait
                    }
                }
                (
                    PendingCall::Dependencies { accumulated, .. },
                    TypeLookupReturn::GetDependencies(Ok(out)),
                ) => {
                    accumulated.extend(out.dependent_typeids);
                    if out.continuation_point != 0 {
                        Step::FollowUp(out.continuation_point)
                    } else {
                        Step::Finish(None)
                    }
                }
                (
                    PendingCall::Dependencies { .. },
                    TypeLookupReturn::GetDependencies(Err(code)),
                ) => {
                    if outstanding == 0 {
                        Step::Finish(Some(code))
                    } else {
                        Step::Wait
                    }
                }
                (_, result) => {
                    log::debug!(
                        "[TypeLookup] reply to {:?} has operation 0x{:08x}",
                        related,
                        result.operation_hash()
                    );
                    Step::Mismatch
                }
            };
            if let Step::Wait = step {
                log::debug!(
                    "[TypeLookup] {:?}: waiting for {} more server(s)",
                    related,
                    outstanding
                );
                return;
            }
            let Some(entry) = pending.remove(&related) else {
                return;
            };
            let origin = entry.origin;
            let outcome = match (step, entry.call) {
                (Step::Mismatch, PendingCall::Types { type_ids, .. }) => {
                    Outcome::Types(type_ids, Err(ReturnCode::Error))
                }
                (Step::Mismatch, PendingCall::Dependencies { .. }) => {
                    Outcome::Dependencies(Err(ReturnCode::Error))
                }
                (
                    Step::Finish(_),
                    PendingCall::Types {
                        type_ids,
                        collected,
                        last_error,
                    },
                ) => {
                    let result = match last_error {
                        Some(code) if collected.types.is_empty() => Err(code),
                        _ => Ok(collected),
                    };
                    Outcome::Types(type_ids, result)
                }
                (Step::Finish(Some(code)), PendingCall::Dependencies { .. }) => {
                    Outcome::Dependencies(Err(code))
                }
                (Step::Finish(None), PendingCall::Dependencies { accumulated, .. }) => {
                    Outcome::Dependencies(Ok(accumulated))
                }
                (
                    Step::FollowUp(cursor),
                    PendingCall::Dependencies {
                        type_ids,
                        accumulated,
                    },
                ) => {
                    log::debug!(
                        "[TypeLookup] {:?}: {} dependencies so far, fetching page {}",
                        origin,
                        accumulated.len(),
                        cursor
                    );
                    // Registered under the same lock so a cancel of `origin`
                    // always finds either this page or the next one.
                    let next = self.next_request_id(writer);
                    let call = TypeLookupCall::GetDependencies(GetTypeDependenciesIn {
                        type_ids: type_ids.clone(),
                        continuation_point: cursor,
                    });
                    self.register(
                        &mut pending,
                        next,
                        origin,
                        PendingCall::Dependencies {
                            type_ids,
                            accumulated,
                        },
                    );
                    Outcome::FollowUp(next, call)
                }
                (Step::Wait, _) | (Step::FollowUp(_), PendingCall::Types { .. }) => {
                    Outcome::Nothing
                }
            };
            (origin, entry.change, outcome)
        };
        if let Some(seq) = change {
            writer.history().remove(seq);
        }

        match outcome {
            Outcome::Nothing => {}
            Outcome::FollowUp(next, call) => self.write_request(next, call),
            Outcome::Types(type_ids, result) => {
                self.forget_unresolved(origin, &type_ids, &result);
                self.notify(|listener| listener.on_types_reply(origin, &result));
            }
            Outcome::Dependencies(result) => {
                self.notify(|listener| listener.on_dependencies_reply(origin, &result));
            }
        }
    }

    /// Let identifiers an observed request did not resolve be requested
    /// again (another server may know them).
    fn forget_unresolved(
        &self,
        origin: SampleIdentity,
        type_ids: &[TypeIdentifier],
        result: &Result<GetTypesOut, ReturnCode>,
    ) {
        let mut requested = self.requested.lock();
        for type_id in type_ids {
            let resolved = result.as_ref().is_ok_and(|out| resolves(out, type_id));
            let observed = requested
                .get(type_id)
                .is_some_and(|observed| observed.request == origin);
            if observed && !resolved {
                log::debug!("[TypeLookup] {:?} unresolved by {:?}", type_id, origin);
                requested.remove(type_id);
            }
        }
    }

    fn notify<F>(&self, call: F)
    where
        F: Fn(&dyn TypeLookupListener),
    {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            call(listener.as_ref());
        }
    }

    /// Attach our channels to a remote participant, per its capability bits.
    pub fn assign_remote_endpoints(&self, participant: &ParticipantProxyData) {
        crate::trace_fn!("TypeLookupManager::assign_remote_endpoints");
        let prefix = participant.prefix();
        let endpoints = participant.builtin_endpoints;
        let locators = participant.metatraffic_locators(self.avoid_multicast);

        if let Some(reader) = &self.request_reader {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_WRITER) {
                reader.matched_writer_add(Guid::new(prefix, EntityId::TYPELOOKUP_REQUEST_WRITER));
            }
        }
        if let Some(reader) = &self.reply_reader {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_WRITER) {
                reader.matched_writer_add(Guid::new(prefix, EntityId::TYPELOOKUP_REPLY_WRITER));
            }
        }
        if let Some(writer) = &self.request_writer {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_READER) {
                writer.matched_reader_add(
                    Guid::new(prefix, EntityId::TYPELOOKUP_REQUEST_READER),
                    locators.clone(),
                );
            }
        }
        if let Some(writer) = &self.reply_writer {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_READER) {
                writer.matched_reader_add(
                    Guid::new(prefix, EntityId::TYPELOOKUP_REPLY_READER),
                    locators,
                );
            }
        }
    }

    pub fn remove_remote_endpoints(&self, participant: &ParticipantProxyData) {
        let prefix = participant.prefix();
        let endpoints = participant.builtin_endpoints;

        if let Some(reader) = &self.request_reader {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_WRITER) {
                reader.matched_writer_remove(Guid::new(
                    prefix,
                    EntityId::TYPELOOKUP_REQUEST_WRITER,
                ));
            }
        }
        if let Some(reader) = &self.reply_reader {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_WRITER) {
                reader.matched_writer_remove(Guid::new(prefix, EntityId::TYPELOOKUP_REPLY_WRITER));
            }
        }
        if let Some(writer) = &self.request_writer {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REQUEST_DATA_READER) {
                writer.matched_reader_remove(Guid::new(
                    prefix,
                    EntityId::TYPELOOKUP_REQUEST_READER,
                ));
            }
        }
        if let Some(writer) = &self.reply_writer {
            if endpoints.contains(BuiltinEndpointSet::TYPELOOKUP_SERVICE_REPLY_DATA_READER) {
                writer.matched_reader_remove(Guid::new(prefix, EntityId::TYPELOOKUP_REPLY_READER));
            }
        }
    }
}

impl ChangeListener for TypeLookupManager {
    fn on_change_available(&self, reader: Guid, change: &CacheChange) {
        crate::trace_fn!("TypeLookupManager::on_change_available");
        if !change.kind.is_alive() {
            return;
        }
        if reader.entity_id == EntityId::TYPELOOKUP_REQUEST_READER {
            self.on_request(change);
        } else if reader.entity_id == EntityId::TYPELOOKUP_REPLY_READER {
            self.on_reply(change);
        } else {
            log::debug!("[TypeLookup] change for unexpected reader {:?}", reader.entity_id);
        }
    }
}

impl ParticipantListener for TypeLookupManager {
    fn on_participant_discovered(&self, participant: &ParticipantProxyData) {
        self.assign_remote_endpoints(participant);
    }

    fn on_participant_removed(&self, participant: &ParticipantProxyData, _reason: RemovalReason) {
        let prefix = participant.prefix();
        self.requested.lock().retain(|_, observed| {
            observed.users.remove(&prefix);
            !observed.users.is_empty()
        });
        self.remove_remote_endpoints(participant);
    }
}

impl TypeObserver for TypeLookupManager {
    /// Fetch hashed types that remote endpoints use and we do not know.
    fn on_type_observed(&self, endpoint: &EndpointProxyData, type_id: TypeIdentifier) {
        if !type_id.is_direct_hash() || endpoint.guid.prefix == self.local_prefix {
            return;
        }
        if self.registry.lookup(&type_id).is_some() {
            return;
        }
        let Some(writer) = self.request_writer.as_ref() else {
            return;
        };
        let owner = endpoint.guid.prefix;
        let request_id = {
            let mut requested = self.requested.lock();
            if let Some(observed) = requested.get_mut(&type_id) {
                observed.users.insert(owner);
                return;
            }
            let request_id = self.next_request_id(writer);
            requested.insert(
                type_id,
                ObservedType {
                    request: request_id,
                    users: HashSet::from([owner]),
                },
            );
            request_id
        };
        log::debug!(
            "[TypeLookup] '{}' uses unknown type {:?}, requesting it",
            endpoint.type_name,
            type_id
        );
        self.issue(
            request_id,
            TypeLookupCall::GetTypes(GetTypesIn {
                type_ids: vec![type_id],
            }),
        );
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry collaborator.
//!
//! The type lookup server answers from a [`TypeRegistry`]; how types get
//! into it (IDL compilation, dynamic types) is not a discovery concern.
//! [`InMemoryTypeRegistry`] is the default implementation.

use super::types::{TypeIdentifier, TypeIdentifierWithSize, TypeObject};
use crate::wire::cdr::{CdrWriter, Endianness};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Why a dependency query failed (aborts the whole request).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("type identifier {0:?} is not registered")]
    UnknownIdentifier(TypeIdentifier),

    #[error("type identifier {0:?} is not a direct hash")]
    NotADirectHash(TypeIdentifier),
}

/// Source of type objects for the lookup server.
pub trait TypeRegistry: Send + Sync {
    /// Type object registered under `type_id`.
    fn lookup(&self, type_id: &TypeIdentifier) -> Option<TypeObject>;

    /// Minimal identifier paired with a complete one, if known.
    fn minimal_identifier(&self, type_id: &TypeIdentifier) -> Option<TypeIdentifier>;

    /// Transitive dependency closure of `type_ids`, excluding the inputs.
    ///
    /// Every input must be a registered direct hash. The returned order is
    /// deterministic for a given registry content and input order.
    fn dependencies(
        &self,
        type_ids: &[TypeIdentifier],
    ) -> Result<Vec<TypeIdentifierWithSize>, DependencyError>;
}

struct RegisteredType {
    object: TypeObject,
    minimal: Option<TypeIdentifier>,
    dependencies: Vec<TypeIdentifier>,
}

/// Registry backed by a hash map keyed by the objects' equivalence hashes.
#[derive(Default)]
pub struct InMemoryTypeRegistry {
    types: RwLock<HashMap<TypeIdentifier, RegisteredType>>,
}

impl InMemoryTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type object with its direct dependencies. Returns its
    /// hash identifier.
    pub fn register(
        &self,
        object: TypeObject,
        dependencies: Vec<TypeIdentifier>,
    ) -> TypeIdentifier {
        let type_id = object.identifier();
        log::debug!(
            "[TypeLookup] registered {:?} ({} direct dependencies)",
            type_id,
            dependencies.len()
        );
        self.types.write().insert(
            type_id,
            RegisteredType {
                object,
                minimal: None,
                dependencies,
            },
        );
        type_id
    }

    /// Register the complete and minimal representations of one type.
    ///
    /// Returns `(complete id, minimal id)`.
    pub fn register_pair(
        &self,
        complete: TypeObject,
        minimal: TypeObject,
        dependencies: Vec<TypeIdentifier>,
    ) -> (TypeIdentifier, TypeIdentifier) {
        let minimal_id = self.register(minimal, dependencies.clone());
        let complete_id = self.register(complete, dependencies);
        if let Some(entry) = self.types.write().get_mut(&complete_id) {
            entry.minimal = Some(minimal_id);
        }
        (complete_id, minimal_id)
    }

    pub fn contains(&self, type_id: &TypeIdentifier) -> bool {
        self.types.read().contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn serialized_size(object: &TypeObject) -> u32 {
    let mut w = CdrWriter::new(Endianness::Little);
    object.encode(&mut w);
    w.len() as u32
}

impl TypeRegistry for InMemoryTypeRegistry {
    fn lookup(&self, type_id: &TypeIdentifier) -> Option<TypeObject> {
        self.types
            .read()
            .get(type_id)
            .map(|entry| entry.object.clone())
    }

    fn minimal_identifier(&self, type_id: &TypeIdentifier) -> Option<TypeIdentifier> {
        self.types.read().get(type_id).and_then(|entry| entry.minimal)
    }

    fn dependencies(
        &self,
        type_ids: &[TypeIdentifier],
    ) -> Result<Vec<TypeIdentifierWithSize>, DependencyError> {
        crate::trace_fn!("InMemoryTypeRegistry::dependencies");
        let types = self.types.read();

        let mut visited: HashSet<TypeIdentifier> = HashSet::new();
        let mut queue: VecDeque<TypeIdentifier> = VecDeque::new();
        for type_id in type_ids {
            if !type_id.is_direct_hash() {
                return Err(DependencyError::NotADirectHash(*type_id));
            }
            let entry = types
                .get(type_id)
                .ok_or(DependencyError::UnknownIdentifier(*type_id))?;
            visited.insert(*type_id);
            queue.extend(entry.dependencies.iter().copied());
        }

        let mut out = Vec::new();
        while let Some(type_id) = queue.pop_front() {
            // Primitives and strings have no type object.
            if !type_id.is_direct_hash() || !visited.insert(type_id) {
                continue;
            }
            let entry = types
                .get(&type_id)
                .ok_or(DependencyError::UnknownIdentifier(type_id))?;
            out.push(TypeIdentifierWithSize {
                type_id,
                typeobject_serialized_size: serialized_size(&entry.object),
            });
            queue.extend(entry.dependencies.iter().copied());
        }
        Ok(out)
    }
}

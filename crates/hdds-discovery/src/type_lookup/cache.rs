// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dependency result cache for paginated `getTypeDependencies` replies.
//!
//! Keyed by the exact requested identifier sequence. An entry is computed
//! once under the cache lock and evicted when its last page is served, so
//! the cache only holds sets that are still being paged out.

use super::registry::DependencyError;
use super::types::{TypeIdentifier, TypeIdentifierWithSize};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Entries per dependency reply.
pub const DEPENDENCY_PAGE_SIZE: usize = 255;

/// One reply worth of dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPage {
    pub entries: Vec<TypeIdentifierWithSize>,
    /// Cursor to send back for the next page; zero once the set is exhausted.
    pub continuation_point: u32,
}

#[derive(Default)]
pub struct DependencyCache {
    entries: Mutex<HashMap<Vec<TypeIdentifier>, Vec<TypeIdentifierWithSize>>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page `cursor` of the dependency set for `type_ids`.
    ///
    /// `resolve` runs at most once per outstanding set. A failed resolution
    /// leaves no entry behind.
    ///
    /// When a page both fills up and reaches the end of the set, the end
    /// wins: the entry is evicted and the returned cursor is zero.
    pub fn page<F>(
        &self,
        type_ids: &[TypeIdentifier],
        cursor: u32,
        resolve: F,
    ) -> Result<DependencyPage, DependencyError>
    where
        F: FnOnce() -> Result<Vec<TypeIdentifierWithSize>, DependencyError>,
    {
        let mut entries = self.entries.lock();
        if !entries.contains_key(type_ids) {
            let resolved = resolve()?;
            entries.insert(type_ids.to_vec(), resolved);
        }
        let Some(set) = entries.get(type_ids) else {
            return Ok(DependencyPage {
                entries: Vec::new(),
                continuation_point: 0,
            });
        };

        let start = (cursor as usize).saturating_mul(DEPENDENCY_PAGE_SIZE);
        if start >= set.len() {
            entries.remove(type_ids);
            return Ok(DependencyPage {
                entries: Vec::new(),
                continuation_point: 0,
            });
        }
        let end = (start + DEPENDENCY_PAGE_SIZE).min(set.len());
        let page = set[start..end].to_vec();
        let last = end == set.len();
        if last {
            entries.remove(type_ids);
        }
        Ok(DependencyPage {
            entries: page,
            continuation_point: if last { 0 } else { cursor + 1 },
        })
    }

    pub fn contains(&self, type_ids: &[TypeIdentifier]) -> bool {
        self.entries.lock().contains_key(type_ids)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

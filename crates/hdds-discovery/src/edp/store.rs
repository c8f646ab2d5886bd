// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote endpoint proxy store (one per endpoint kind).

use crate::config::AllocationLimits;
use crate::error::PoolError;
use crate::guid::{Guid, GuidPrefix};
use crate::proxy::{EndpointProxyData, PoolHandle, ProxyPool};
use parking_lot::RwLock;
use std::collections::HashMap;

pub(crate) struct EndpointStore {
    index: RwLock<HashMap<Guid, PoolHandle>>,
    pool: ProxyPool<EndpointProxyData>,
}

impl EndpointStore {
    pub fn new(name: &'static str, limits: AllocationLimits) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            pool: ProxyPool::new(name, limits),
        }
    }

    /// Insert or replace. Returns `true` when the endpoint is new.
    pub fn upsert(&self, data: &EndpointProxyData) -> Result<bool, PoolError> {
        let mut index = self.index.write();
        if let Some(handle) = index.get(&data.guid) {
            self.pool.with_mut(*handle, |proxy| *proxy = data.clone())?;
            return Ok(false);
        }
        let handle = self.pool.acquire()?;
        if let Err(err) = self.pool.with_mut(handle, |proxy| *proxy = data.clone()) {
            if let Err(release_err) = self.pool.release(handle) {
                log::error!("[EDP] releasing {} slot: {}", self.pool.name(), release_err);
            }
            return Err(err);
        }
        index.insert(data.guid, handle);
        Ok(true)
    }

    pub fn remove(&self, guid: &Guid) -> Option<EndpointProxyData> {
        let handle = self.index.write().remove(guid)?;
        let data = self.pool.with(handle, Clone::clone).ok();
        if let Err(err) = self.pool.release(handle) {
            log::error!("[EDP] releasing {} slot: {}", self.pool.name(), err);
        }
        data
    }

    /// GUIDs of every endpoint owned by `prefix`.
    pub fn owned_by(&self, prefix: &GuidPrefix) -> Vec<Guid> {
        self.index
            .read()
            .keys()
            .filter(|guid| guid.prefix == *prefix)
            .copied()
            .collect()
    }

    pub fn get(&self, guid: &Guid) -> Option<EndpointProxyData> {
        let index = self.index.read();
        let handle = index.get(guid)?;
        self.pool.with(*handle, Clone::clone).ok()
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.index.read().contains_key(guid)
    }

    pub fn snapshot(&self) -> Vec<EndpointProxyData> {
        let index = self.index.read();
        index
            .values()
            .filter_map(|handle| self.pool.with(*handle, Clone::clone).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }
}

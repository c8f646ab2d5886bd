// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded, growable pool of proxy slots.
//!
//! Slots are pre-allocated up to `initial` and grow on demand up to
//! `maximum`. Free slot indices live in a lock-free freelist; slot contents
//! are behind per-slot mutexes so readers of one proxy never contend with
//! writers of another.
//!
//! Slots are reset on acquisition, so data from a released proxy can never
//! be observed by the next owner of that slot.

use crate::config::AllocationLimits;
use crate::error::PoolError;
use crossbeam::queue::ArrayQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Proxy data that can live in a [`ProxyPool`].
pub trait Poolable: Default + Send {
    /// Return the value to its freshly constructed state.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Handle to an acquired slot. Identity lookups go through the owning
/// registry, never through the handle value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(usize);

impl PoolHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

struct Slot<T> {
    in_use: AtomicBool,
    value: Mutex<T>,
}

/// Pool of proxy slots.
///
/// # Design
/// - **Freelist:** crossbeam `ArrayQueue` sized to the maximum capacity
/// - **Growth:** new slots are appended under a write lock, existing slots
///   are never moved (each one is an `Arc`)
/// - **Metrics:** exhaustion events are counted for diagnostics
pub struct ProxyPool<T: Poolable> {
    name: &'static str,
    slots: RwLock<Vec<Arc<Slot<T>>>>,
    freelist: ArrayQueue<usize>,
    maximum: usize,
    exhausted_count: AtomicU64,
}

impl<T: Poolable> ProxyPool<T> {
    /// Create a pool with `limits.initial` slots ready and room for
    /// `limits.maximum`.
    pub fn new(name: &'static str, limits: AllocationLimits) -> Self {
        let maximum = limits.maximum.max(1);
        let initial = limits.initial.min(maximum);

        let freelist = ArrayQueue::new(maximum);
        let mut slots = Vec::with_capacity(initial);
        for index in 0..initial {
            slots.push(Arc::new(Slot {
                in_use: AtomicBool::new(false),
                value: Mutex::new(T::default()),
            }));
            // Capacity is `maximum >= initial`, push cannot fail.
            let _ = freelist.push(index);
        }

        Self {
            name,
            slots: RwLock::new(slots),
            freelist,
            maximum,
            exhausted_count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Slots allocated so far (in use or free).
    pub fn allocated(&self) -> usize {
        self.slots.read().len()
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    /// Slots currently handed out.
    pub fn in_use(&self) -> usize {
        self.allocated() - self.freelist.len()
    }

    pub fn exhausted_count(&self) -> u64 {
        self.exhausted_count.load(Ordering::Relaxed)
    }

    /// Acquire a reset slot, growing the pool if needed.
    pub fn acquire(&self) -> Result<PoolHandle, PoolError> {
        let index = match self.freelist.pop() {
            Some(index) => index,
            None => self.grow()?,
        };

        let slot = self.slot(index)?;
        slot.value.lock().reset();
        slot.in_use.store(true, Ordering::Release);
        Ok(PoolHandle(index))
    }

    fn grow(&self) -> Result<usize, PoolError> {
        let mut slots = self.slots.write();
        if slots.len() >= self.maximum {
            drop(slots);
            self.exhausted_count.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "[pool] {} pool exhausted ({} slots in use)",
                self.name,
                self.maximum
            );
            return Err(PoolError::Exhausted {
                pool: self.name,
                maximum: self.maximum,
            });
        }
        let index = slots.len();
        slots.push(Arc::new(Slot {
            in_use: AtomicBool::new(false),
            value: Mutex::new(T::default()),
        }));
        log::debug!("[pool] {} pool grew to {} slots", self.name, index + 1);
        Ok(index)
    }

    /// Return a slot to the freelist.
    pub fn release(&self, handle: PoolHandle) -> Result<(), PoolError> {
        let slot = self.slot(handle.0)?;
        if !slot.in_use.swap(false, Ordering::AcqRel) {
            return Err(self.stale(handle.0));
        }
        self.freelist
            .push(handle.0)
            .map_err(|_| self.stale(handle.0))
    }

    /// Read access to an acquired slot.
    pub fn with<R>(&self, handle: PoolHandle, f: impl FnOnce(&T) -> R) -> Result<R, PoolError> {
        let slot = self.live_slot(handle)?;
        let guard = slot.value.lock();
        Ok(f(&guard))
    }

    /// Write access to an acquired slot.
    pub fn with_mut<R>(
        &self,
        handle: PoolHandle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, PoolError> {
        let slot = self.live_slot(handle)?;
        let mut guard = slot.value.lock();
        Ok(f(&mut guard))
    }

    fn live_slot(&self, handle: PoolHandle) -> Result<Arc<Slot<T>>, PoolError> {
        let slot = self.slot(handle.0)?;
        if !slot.in_use.load(Ordering::Acquire) {
            return Err(self.stale(handle.0));
        }
        Ok(slot)
    }

    fn slot(&self, index: usize) -> Result<Arc<Slot<T>>, PoolError> {
        self.slots
            .read()
            .get(index)
            .cloned()
            .ok_or_else(|| self.stale(index))
    }

    fn stale(&self, index: usize) -> PoolError {
        PoolError::StaleHandle {
            pool: self.name,
            index,
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Proxy data store: value objects for remote entities and their pools.

mod endpoint;
mod participant;
mod pool;

pub use endpoint::EndpointProxyData;
pub use participant::{ParticipantProxyData, ProtocolVersion, VENDOR_ID_HDDS};
pub use pool::{PoolHandle, Poolable, ProxyPool};

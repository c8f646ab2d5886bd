// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging helpers for the discovery subsystem.
//!
//! All diagnostics go through the `log` facade with a bracketed component tag
//! (`[PDP]`, `[EDP]`, `[TypeLookup]`, ...). The application picks the backend.
//!
//! `trace_fn!` marks function entry. It expands to nothing unless the crate is
//! built with the `trace` feature, so hot paths pay nothing for it.

/// Function-entry trace (enabled with the `trace` feature).
///
/// # Example
/// ```ignore
/// crate::trace_fn!("ParticipantDiscovery::on_change_available");
/// ```
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        log::trace!("[trace] -> {}", $fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}

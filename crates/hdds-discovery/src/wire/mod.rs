// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire encoding for discovery payloads.
//!
//! - `cdr`: endian-aware primitive cursors
//! - `encapsulation`: 4-byte payload envelope
//! - `parameter_list`: PL_CDR framing and shared PID value codecs
//! - `spdp` / `sedp`: participant and endpoint data

pub mod cdr;
pub mod encapsulation;
pub mod parameter_list;
pub mod sedp;
pub mod spdp;

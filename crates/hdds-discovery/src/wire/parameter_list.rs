// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS parameter list (PL_CDR) framing.
//!
//! Each parameter is `pid: u16, length: u16, value[length]` with the value
//! padded to a 4-byte boundary. The list ends with PID_SENTINEL.

use super::cdr::{CdrReader, CdrWriter, Endianness};
use super::encapsulation;
use crate::error::ParseError;
use crate::guid::Guid;
use crate::locator::Locator;
use std::time::Duration;

pub const PID_PAD: u16 = 0x0000;
pub const PID_SENTINEL: u16 = 0x0001;
pub const PID_PARTICIPANT_LEASE_DURATION: u16 = 0x0002;
pub const PID_TOPIC_NAME: u16 = 0x0005;
pub const PID_TYPE_NAME: u16 = 0x0007;
pub const PID_PROTOCOL_VERSION: u16 = 0x0015;
pub const PID_VENDOR_ID: u16 = 0x0016;
pub const PID_RELIABILITY: u16 = 0x001A;
pub const PID_LIVELINESS: u16 = 0x001B;
pub const PID_DURABILITY: u16 = 0x001D;
pub const PID_UNICAST_LOCATOR: u16 = 0x002F;
pub const PID_MULTICAST_LOCATOR: u16 = 0x0030;
pub const PID_METATRAFFIC_UNICAST_LOCATOR: u16 = 0x0032;
pub const PID_METATRAFFIC_MULTICAST_LOCATOR: u16 = 0x0033;
pub const PID_PARTICIPANT_GUID: u16 = 0x0050;
pub const PID_BUILTIN_ENDPOINT_SET: u16 = 0x0058;
pub const PID_PROPERTY_LIST: u16 = 0x0059;
pub const PID_ENDPOINT_GUID: u16 = 0x005A;
pub const PID_ENTITY_NAME: u16 = 0x0062;
pub const PID_TYPE_IDV1: u16 = 0x0069;

/// Duration_t seconds value meaning "infinite".
const DURATION_INFINITE_SEC: i32 = 0x7FFF_FFFF;
const DURATION_INFINITE_FRAC: u32 = 0xFFFF_FFFF;

/// Builder for a sealed parameter list payload.
pub struct ParameterListWriter {
    w: CdrWriter,
}

impl ParameterListWriter {
    pub fn new(endianness: Endianness) -> Self {
        Self {
            w: CdrWriter::new(endianness),
        }
    }

    /// Append one parameter; `encode` writes the value.
    pub fn param(&mut self, pid: u16, encode: impl FnOnce(&mut CdrWriter)) {
        let mut value = CdrWriter::new(self.w.endianness());
        encode(&mut value);
        value.align(4);
        let value = value.into_inner();

        self.w.write_u16(pid);
        self.w.write_u16(value.len() as u16);
        self.w.write_bytes(&value);
    }

    /// Terminate with PID_SENTINEL and prefix the encapsulation header.
    pub fn finish(mut self) -> Vec<u8> {
        self.w.write_u16(PID_SENTINEL);
        self.w.write_u16(0);
        encapsulation::seal(self.w)
    }
}

/// One parameter borrowed from a payload.
#[derive(Debug, Clone, Copy)]
pub struct Parameter<'a> {
    pub pid: u16,
    pub value: &'a [u8],
}

/// Validate the envelope and split the parameter list.
///
/// Stops at PID_SENTINEL. A list that runs off the end without a sentinel is
/// accepted as long as every parameter is complete.
pub fn parse(payload: &[u8]) -> Result<(Endianness, Vec<Parameter<'_>>), ParseError> {
    let (endianness, body) = encapsulation::read_envelope(payload)?;
    let mut r = CdrReader::new(body, endianness);
    let mut params = Vec::new();

    while r.remaining() >= 4 {
        let pid = r.read_u16()?;
        let len = r.read_u16()? as usize;
        if pid == PID_SENTINEL {
            break;
        }
        let value = r.read_bytes(len)?;
        if pid != PID_PAD {
            params.push(Parameter { pid, value });
        }
    }
    Ok((endianness, params))
}

pub fn find<'a>(params: &[Parameter<'a>], pid: u16) -> Option<&'a [u8]> {
    params.iter().find(|p| p.pid == pid).map(|p| p.value)
}

pub fn write_guid(w: &mut CdrWriter, guid: &Guid) {
    w.write_bytes(&guid.as_bytes());
}

pub fn read_guid(r: &mut CdrReader<'_>) -> Result<Guid, ParseError> {
    Ok(Guid::from_bytes(r.read_array::<16>()?))
}

pub fn write_locator(w: &mut CdrWriter, locator: &Locator) {
    w.write_i32(locator.kind);
    w.write_u32(locator.port);
    w.write_bytes(&locator.address);
}

pub fn read_locator(r: &mut CdrReader<'_>) -> Result<Locator, ParseError> {
    Ok(Locator {
        kind: r.read_i32()?,
        port: r.read_u32()?,
        address: r.read_array::<16>()?,
    })
}

/// Duration_t: seconds + 2^-32 fractions. `None` encodes as infinite.
pub fn write_duration(w: &mut CdrWriter, duration: Option<Duration>) {
    match duration {
        None => {
            w.write_i32(DURATION_INFINITE_SEC);
            w.write_u32(DURATION_INFINITE_FRAC);
        }
        Some(d) => {
            let seconds = d.as_secs().min(DURATION_INFINITE_SEC as u64 - 1) as i32;
            let fraction = ((u64::from(d.subsec_nanos()) << 32) / 1_000_000_000) as u32;
            w.write_i32(seconds);
            w.write_u32(fraction);
        }
    }
}

pub fn read_duration(r: &mut CdrReader<'_>) -> Result<Option<Duration>, ParseError> {
    let seconds = r.read_i32()?;
    let fraction = r.read_u32()?;
    if seconds == DURATION_INFINITE_SEC {
        return Ok(None);
    }
    if seconds < 0 {
        return Err(ParseError::InvalidValue(format!(
            "negative duration ({} s)",
            seconds
        )));
    }
    let nanos = ((u64::from(fraction) * 1_000_000_000) >> 32) as u32;
    Ok(Some(Duration::new(seconds as u64, nanos)))
}

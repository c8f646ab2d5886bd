// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SPDP participant announcement codec.

use super::cdr::{CdrReader, Endianness};
use super::parameter_list::{self as pl, ParameterListWriter};
use crate::builtin::BuiltinEndpointSet;
use crate::error::ParseError;
use crate::guid::Guid;
use crate::proxy::{ParticipantProxyData, ProtocolVersion};
use std::time::Duration;

/// Lease used when an announcement omits PID_PARTICIPANT_LEASE_DURATION.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(100);

/// Encode a participant announcement (PL_CDR_LE).
pub fn encode_participant(data: &ParticipantProxyData) -> Vec<u8> {
    let mut out = ParameterListWriter::new(Endianness::Little);

    out.param(pl::PID_PROTOCOL_VERSION, |w| {
        w.write_u8(data.protocol_version.major);
        w.write_u8(data.protocol_version.minor);
    });
    out.param(pl::PID_VENDOR_ID, |w| w.write_bytes(&data.vendor_id));
    out.param(pl::PID_PARTICIPANT_GUID, |w| pl::write_guid(w, &data.guid));
    out.param(pl::PID_BUILTIN_ENDPOINT_SET, |w| {
        w.write_u32(data.builtin_endpoints.bits())
    });
    out.param(pl::PID_PARTICIPANT_LEASE_DURATION, |w| {
        pl::write_duration(w, Some(data.lease_duration))
    });
    for locator in &data.metatraffic_unicast {
        out.param(pl::PID_METATRAFFIC_UNICAST_LOCATOR, |w| {
            pl::write_locator(w, locator)
        });
    }
    for locator in &data.metatraffic_multicast {
        out.param(pl::PID_METATRAFFIC_MULTICAST_LOCATOR, |w| {
            pl::write_locator(w, locator)
        });
    }
    if !data.participant_name.is_empty() {
        out.param(pl::PID_ENTITY_NAME, |w| w.write_string(&data.participant_name));
    }
    if !data.properties.is_empty() {
        out.param(pl::PID_PROPERTY_LIST, |w| {
            w.write_len(data.properties.len());
            for (name, value) in &data.properties {
                w.write_string(name);
                w.write_string(value);
            }
        });
    }

    out.finish()
}

/// Encode the key-only payload sent with a participant disposal.
pub fn encode_participant_key(guid: &Guid) -> Vec<u8> {
    let mut out = ParameterListWriter::new(Endianness::Little);
    out.param(pl::PID_PARTICIPANT_GUID, |w| pl::write_guid(w, guid));
    out.finish()
}

/// Decode the participant GUID from an announcement or disposal payload.
pub fn decode_participant_key(payload: &[u8]) -> Result<Guid, ParseError> {
    let (endianness, params) = pl::parse(payload)?;
    let value = pl::find(&params, pl::PID_PARTICIPANT_GUID)
        .ok_or(ParseError::MissingParameter(pl::PID_PARTICIPANT_GUID))?;
    pl::read_guid(&mut CdrReader::new(value, endianness))
}

/// Decode a participant announcement.
///
/// Unknown and vendor-specific parameters are skipped. A zero lease
/// duration is rejected.
pub fn decode_participant(payload: &[u8]) -> Result<ParticipantProxyData, ParseError> {
    let (endianness, params) = pl::parse(payload)?;
    let mut data = ParticipantProxyData {
        lease_duration: DEFAULT_LEASE_DURATION,
        ..Default::default()
    };
    let mut guid_seen = false;

    for param in &params {
        let mut r = CdrReader::new(param.value, endianness);
        match param.pid {
            pl::PID_PROTOCOL_VERSION => {
                data.protocol_version = ProtocolVersion {
                    major: r.read_u8()?,
                    minor: r.read_u8()?,
                };
            }
            pl::PID_VENDOR_ID => data.vendor_id = r.read_array::<2>()?,
            pl::PID_PARTICIPANT_GUID => {
                data.guid = pl::read_guid(&mut r)?;
                guid_seen = true;
            }
            pl::PID_BUILTIN_ENDPOINT_SET => {
                data.builtin_endpoints = BuiltinEndpointSet(r.read_u32()?);
            }
            pl::PID_PARTICIPANT_LEASE_DURATION => {
                // Infinite lease is clamped to the largest finite value.
                data.lease_duration = pl::read_duration(&mut r)?
                    .unwrap_or(Duration::from_secs(i32::MAX as u64));
            }
            pl::PID_METATRAFFIC_UNICAST_LOCATOR => {
                data.metatraffic_unicast.push(pl::read_locator(&mut r)?);
            }
            pl::PID_METATRAFFIC_MULTICAST_LOCATOR => {
                data.metatraffic_multicast.push(pl::read_locator(&mut r)?);
            }
            pl::PID_ENTITY_NAME => data.participant_name = r.read_string()?,
            pl::PID_PROPERTY_LIST => {
                let count = r.read_len(8)?;
                for _ in 0..count {
                    let name = r.read_string()?;
                    let value = r.read_string()?;
                    data.properties.push((name, value));
                }
            }
            _ => {}
        }
    }

    if !guid_seen {
        return Err(ParseError::MissingParameter(pl::PID_PARTICIPANT_GUID));
    }
    if data.lease_duration.is_zero() {
        return Err(ParseError::InvalidValue("lease duration must be > 0".into()));
    }
    Ok(data)
}

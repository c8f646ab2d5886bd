// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SEDP publication/subscription data codec.

use super::cdr::{CdrReader, Endianness};
use super::parameter_list::{self as pl, ParameterListWriter};
use crate::error::ParseError;
use crate::guid::{EndpointKind, Guid};
use crate::proxy::EndpointProxyData;
use crate::qos::{Durability, EndpointQos, Liveliness, LivelinessKind, Reliability};
use crate::type_lookup::types::TypeIdentifier;
use std::time::Duration;

/// Default max_blocking_time carried with PID_RELIABILITY.
const MAX_BLOCKING_TIME: Duration = Duration::from_millis(100);

/// Encode an endpoint description (PL_CDR_LE).
pub fn encode_endpoint(data: &EndpointProxyData) -> Vec<u8> {
    let mut out = ParameterListWriter::new(Endianness::Little);

    out.param(pl::PID_ENDPOINT_GUID, |w| pl::write_guid(w, &data.guid));
    out.param(pl::PID_PARTICIPANT_GUID, |w| {
        pl::write_guid(w, &data.participant_guid)
    });
    out.param(pl::PID_TOPIC_NAME, |w| w.write_string(&data.topic_name));
    out.param(pl::PID_TYPE_NAME, |w| w.write_string(&data.type_name));
    out.param(pl::PID_RELIABILITY, |w| {
        w.write_u32(data.qos.reliability.to_wire());
        pl::write_duration(w, Some(MAX_BLOCKING_TIME));
    });
    out.param(pl::PID_DURABILITY, |w| w.write_u32(data.qos.durability.to_wire()));
    out.param(pl::PID_LIVELINESS, |w| {
        w.write_u32(u32::from(data.qos.liveliness.kind.rank()));
        pl::write_duration(w, data.qos.liveliness.lease_duration);
    });
    for locator in &data.unicast_locators {
        out.param(pl::PID_UNICAST_LOCATOR, |w| pl::write_locator(w, locator));
    }
    for locator in &data.multicast_locators {
        out.param(pl::PID_MULTICAST_LOCATOR, |w| pl::write_locator(w, locator));
    }
    if let Some(type_id) = &data.type_id {
        out.param(pl::PID_TYPE_IDV1, |w| type_id.encode(w));
    }

    out.finish()
}

/// Encode the key-only payload sent when an endpoint is removed.
pub fn encode_endpoint_key(guid: &Guid) -> Vec<u8> {
    let mut out = ParameterListWriter::new(Endianness::Little);
    out.param(pl::PID_ENDPOINT_GUID, |w| pl::write_guid(w, guid));
    out.finish()
}

pub fn decode_endpoint_key(payload: &[u8]) -> Result<Guid, ParseError> {
    let (endianness, params) = pl::parse(payload)?;
    let value = pl::find(&params, pl::PID_ENDPOINT_GUID)
        .ok_or(ParseError::MissingParameter(pl::PID_ENDPOINT_GUID))?;
    pl::read_guid(&mut CdrReader::new(value, endianness))
}

/// Decode an endpoint description.
///
/// The endpoint kind comes from the entity kind octet of the GUID. Missing
/// QoS parameters take the RTPS defaults (writers reliable, readers best
/// effort, volatile, automatic liveliness).
pub fn decode_endpoint(payload: &[u8]) -> Result<EndpointProxyData, ParseError> {
    let (endianness, params) = pl::parse(payload)?;

    let guid_value = pl::find(&params, pl::PID_ENDPOINT_GUID)
        .ok_or(ParseError::MissingParameter(pl::PID_ENDPOINT_GUID))?;
    let guid = pl::read_guid(&mut CdrReader::new(guid_value, endianness))?;
    let kind = guid.entity_id.endpoint_kind().ok_or_else(|| {
        ParseError::InvalidValue(format!("entity {:?} is not an endpoint", guid.entity_id))
    })?;

    let default_reliability = match kind {
        EndpointKind::Writer => Reliability::Reliable,
        EndpointKind::Reader => Reliability::BestEffort,
    };
    let mut data = EndpointProxyData {
        guid,
        participant_guid: Guid::participant(guid.prefix),
        kind,
        qos: EndpointQos {
            reliability: default_reliability,
            durability: Durability::Volatile,
            liveliness: Liveliness::default(),
        },
        ..Default::default()
    };
    let mut topic_seen = false;
    let mut type_seen = false;

    for param in &params {
        let mut r = CdrReader::new(param.value, endianness);
        match param.pid {
            pl::PID_PARTICIPANT_GUID => data.participant_guid = pl::read_guid(&mut r)?,
            pl::PID_TOPIC_NAME => {
                data.topic_name = r.read_string()?;
                topic_seen = true;
            }
            pl::PID_TYPE_NAME => {
                data.type_name = r.read_string()?;
                type_seen = true;
            }
            pl::PID_RELIABILITY => {
                let raw = r.read_u32()?;
                data.qos.reliability = Reliability::from_wire(raw).ok_or_else(|| {
                    ParseError::InvalidValue(format!("reliability kind {}", raw))
                })?;
            }
            pl::PID_DURABILITY => {
                let raw = r.read_u32()?;
                data.qos.durability = Durability::from_wire(raw).ok_or_else(|| {
                    ParseError::InvalidValue(format!("durability kind {}", raw))
                })?;
            }
            pl::PID_LIVELINESS => {
                let raw = r.read_u32()?;
                data.qos.liveliness = Liveliness {
                    kind: LivelinessKind::from_wire(raw).ok_or_else(|| {
                        ParseError::InvalidValue(format!("liveliness kind {}", raw))
                    })?,
                    lease_duration: pl::read_duration(&mut r)?,
                };
            }
            pl::PID_UNICAST_LOCATOR => data.unicast_locators.push(pl::read_locator(&mut r)?),
            pl::PID_MULTICAST_LOCATOR => {
                data.multicast_locators.push(pl::read_locator(&mut r)?);
            }
            pl::PID_TYPE_IDV1 => data.type_id = Some(TypeIdentifier::decode(&mut r)?),
            _ => {}
        }
    }

    if !topic_seen {
        return Err(ParseError::MissingParameter(pl::PID_TOPIC_NAME));
    }
    if !type_seen {
        return Err(ParseError::MissingParameter(pl::PID_TYPE_NAME));
    }
    Ok(data)
}

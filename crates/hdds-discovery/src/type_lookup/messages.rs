// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type lookup request/reply messages (XTypes 7.6.3.3, DDS-RPC framing).
//!
//! ```text
//! request : envelope | request id | instance name | op hash | body
//! reply   : envelope | related request id | op hash | return code | body?
//! ```
//!
//! The body of a reply is present only when the return code is `Ok`.

use super::types::{
    TypeIdentifier, TypeIdentifierPair, TypeIdentifierTypeObjectPair, TypeIdentifierWithSize,
    TypeObject,
};
use crate::error::ParseError;
use crate::guid::Guid;
use crate::history::SequenceNumber;
use crate::wire::cdr::{CdrReader, CdrResult, CdrWriter, Endianness};
use crate::wire::encapsulation;
use crate::wire::parameter_list::{read_guid, write_guid};
use std::fmt;

/// Operation hash of `getTypes`.
pub const GET_TYPES_HASH: u32 = 0x0182_52d3;
/// Operation hash of `getTypeDependencies`.
pub const GET_DEPENDENCIES_HASH: u32 = 0x05aa_fb31;

/// Smallest possible encoded TypeIdentifier (primitive discriminator).
const MIN_TYPE_ID_SIZE: usize = 1;

/// Identity of one request: writer that sent it plus its sequence number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SampleIdentity {
    pub writer_guid: Guid,
    pub sequence_number: SequenceNumber,
}

impl SampleIdentity {
    pub const UNKNOWN: SampleIdentity = SampleIdentity {
        writer_guid: Guid::new(crate::guid::GuidPrefix::UNKNOWN, crate::guid::EntityId::UNKNOWN),
        sequence_number: 0,
    };

    pub const fn new(writer_guid: Guid, sequence_number: SequenceNumber) -> Self {
        Self {
            writer_guid,
            sequence_number,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.writer_guid.is_unknown() && self.sequence_number == 0
    }

    fn encode(&self, w: &mut CdrWriter) {
        write_guid(w, &self.writer_guid);
        // RTPS SequenceNumber_t: high i32, low u32
        w.write_i32((self.sequence_number >> 32) as i32);
        w.write_u32(self.sequence_number as u32);
    }

    fn decode(r: &mut CdrReader<'_>) -> CdrResult<Self> {
        let writer_guid = read_guid(r)?;
        let high = i64::from(r.read_i32()?);
        let low = i64::from(r.read_u32()?);
        Ok(Self::new(writer_guid, (high << 32) | low))
    }
}

impl fmt::Debug for SampleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SampleIdentity({}#{})", self.writer_guid, self.sequence_number)
    }
}

/// Remote call outcome carried in every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok,
    Error,
    BadParameter,
    NoData,
}

impl ReturnCode {
    pub const fn to_wire(self) -> i32 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::Error => 1,
            ReturnCode::BadParameter => 3,
            ReturnCode::NoData => 11,
        }
    }

    /// Codes we do not model collapse to `Error`.
    pub const fn from_wire(value: i32) -> Self {
        match value {
            0 => ReturnCode::Ok,
            3 => ReturnCode::BadParameter,
            11 => ReturnCode::NoData,
            _ => ReturnCode::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub request_id: SampleIdentity,
    pub instance_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub related_request_id: SampleIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTypesIn {
    pub type_ids: Vec<TypeIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetTypesOut {
    pub types: Vec<TypeIdentifierTypeObjectPair>,
    pub complete_to_minimal: Vec<TypeIdentifierPair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTypeDependenciesIn {
    pub type_ids: Vec<TypeIdentifier>,
    pub continuation_point: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetTypeDependenciesOut {
    pub dependent_typeids: Vec<TypeIdentifierWithSize>,
    /// Zero on the last page.
    pub continuation_point: i32,
}

/// Request body, discriminated by operation hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeLookupCall {
    GetTypes(GetTypesIn),
    GetDependencies(GetTypeDependenciesIn),
}

impl TypeLookupCall {
    pub const fn operation_hash(&self) -> u32 {
        match self {
            TypeLookupCall::GetTypes(_) => GET_TYPES_HASH,
            TypeLookupCall::GetDependencies(_) => GET_DEPENDENCIES_HASH,
        }
    }
}

/// Reply body, discriminated by operation hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeLookupReturn {
    GetTypes(Result<GetTypesOut, ReturnCode>),
    GetDependencies(Result<GetTypeDependenciesOut, ReturnCode>),
}

impl TypeLookupReturn {
    pub const fn operation_hash(&self) -> u32 {
        match self {
            TypeLookupReturn::GetTypes(_) => GET_TYPES_HASH,
            TypeLookupReturn::GetDependencies(_) => GET_DEPENDENCIES_HASH,
        }
    }

    pub fn return_code(&self) -> ReturnCode {
        match self {
            TypeLookupReturn::GetTypes(Ok(_)) | TypeLookupReturn::GetDependencies(Ok(_)) => {
                ReturnCode::Ok
            }
            TypeLookupReturn::GetTypes(Err(code))
            | TypeLookupReturn::GetDependencies(Err(code)) => *code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLookupRequest {
    pub header: RequestHeader,
    pub call: TypeLookupCall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLookupReply {
    pub header: ReplyHeader,
    pub result: TypeLookupReturn,
}

fn write_type_ids(w: &mut CdrWriter, ids: &[TypeIdentifier]) {
    w.write_len(ids.len());
    for id in ids {
        id.encode(w);
    }
}

fn read_type_ids(r: &mut CdrReader<'_>) -> CdrResult<Vec<TypeIdentifier>> {
    let len = r.read_len(MIN_TYPE_ID_SIZE)?;
    (0..len).map(|_| TypeIdentifier::decode(r)).collect()
}

fn unknown_operation(hash: u32) -> ParseError {
    ParseError::InvalidValue(format!("unknown type lookup operation 0x{:08x}", hash))
}

impl TypeLookupRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = CdrWriter::new(Endianness::Little);
        self.header.request_id.encode(&mut w);
        w.write_string(&self.header.instance_name);
        w.write_u32(self.call.operation_hash());
        match &self.call {
            TypeLookupCall::GetTypes(input) => write_type_ids(&mut w, &input.type_ids),
            TypeLookupCall::GetDependencies(input) => {
                write_type_ids(&mut w, &input.type_ids);
                w.write_i32(input.continuation_point);
            }
        }
        encapsulation::seal(w)
    }

    /// Decode a request; unknown envelopes are rejected.
    pub fn decode(payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = encapsulation::body_reader(payload)?;
        let request_id = SampleIdentity::decode(&mut r)?;
        let instance_name = r.read_string()?;
        let call = match r.read_u32()? {
            GET_TYPES_HASH => TypeLookupCall::GetTypes(GetTypesIn {
                type_ids: read_type_ids(&mut r)?,
            }),
            GET_DEPENDENCIES_HASH => TypeLookupCall::GetDependencies(GetTypeDependenciesIn {
                type_ids: read_type_ids(&mut r)?,
                continuation_point: r.read_i32()?,
            }),
            other => return Err(unknown_operation(other)),
        };
        Ok(Self {
            header: RequestHeader {
                request_id,
                instance_name,
            },
            call,
        })
    }
}

impl TypeLookupReply {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = CdrWriter::new(Endianness::Little);
        self.header.related_request_id.encode(&mut w);
        w.write_u32(self.result.operation_hash());
        w.write_i32(self.result.return_code().to_wire());
        match &self.result {
            TypeLookupReturn::GetTypes(Ok(out)) => {
                w.write_len(out.types.len());
                for pair in &out.types {
                    pair.type_identifier.encode(&mut w);
                    pair.type_object.encode(&mut w);
                }
                w.write_len(out.complete_to_minimal.len());
                for pair in &out.complete_to_minimal {
                    pair.type_identifier1.encode(&mut w);
                    pair.type_identifier2.encode(&mut w);
                }
            }
            TypeLookupReturn::GetDependencies(Ok(out)) => {
                w.write_len(out.dependent_typeids.len());
                for entry in &out.dependent_typeids {
                    entry.type_id.encode(&mut w);
                    w.write_u32(entry.typeobject_serialized_size);
                }
                w.write_i32(out.continuation_point);
            }
            TypeLookupReturn::GetTypes(Err(_)) | TypeLookupReturn::GetDependencies(Err(_)) => {}
        }
        encapsulation::seal(w)
    }

    /// Decode a reply; unknown envelopes are rejected.
    pub fn decode(payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = encapsulation::body_reader(payload)?;
        let related_request_id = SampleIdentity::decode(&mut r)?;
        let hash = r.read_u32()?;
        let code = ReturnCode::from_wire(r.read_i32()?);
        let result = match (hash, code) {
            (GET_TYPES_HASH, ReturnCode::Ok) => {
                TypeLookupReturn::GetTypes(Ok(decode_get_types_out(&mut r)?))
            }
            (GET_TYPES_HASH, code) => TypeLookupReturn::GetTypes(Err(code)),
            (GET_DEPENDENCIES_HASH, ReturnCode::Ok) => {
                TypeLookupReturn::GetDependencies(Ok(decode_dependencies_out(&mut r)?))
            }
            (GET_DEPENDENCIES_HASH, code) => TypeLookupReturn::GetDependencies(Err(code)),
            (other, _) => return Err(unknown_operation(other)),
        };
        Ok(Self {
            header: ReplyHeader { related_request_id },
            result,
        })
    }
}

fn decode_get_types_out(r: &mut CdrReader<'_>) -> CdrResult<GetTypesOut> {
    let count = r.read_len(MIN_TYPE_ID_SIZE)?;
    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        types.push(TypeIdentifierTypeObjectPair {
            type_identifier: TypeIdentifier::decode(r)?,
            type_object: TypeObject::decode(r)?,
        });
    }
    let count = r.read_len(MIN_TYPE_ID_SIZE * 2)?;
    let mut complete_to_minimal = Vec::with_capacity(count);
    for _ in 0..count {
        complete_to_minimal.push(TypeIdentifierPair {
            type_identifier1: TypeIdentifier::decode(r)?,
            type_identifier2: TypeIdentifier::decode(r)?,
        });
    }
    Ok(GetTypesOut {
        types,
        complete_to_minimal,
    })
}

fn decode_dependencies_out(r: &mut CdrReader<'_>) -> CdrResult<GetTypeDependenciesOut> {
    let count = r.read_len(MIN_TYPE_ID_SIZE)?;
    let mut dependent_typeids = Vec::with_capacity(count);
    for _ in 0..count {
        dependent_typeids.push(TypeIdentifierWithSize {
            type_id: TypeIdentifier::decode(r)?,
            typeobject_serialized_size: r.read_u32()?,
        });
    }
    Ok(GetTypeDependenciesOut {
        dependent_typeids,
        continuation_point: r.read_i32()?,
    })
}

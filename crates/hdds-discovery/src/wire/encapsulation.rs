// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! 4-byte serialized payload envelope.
//!
//! ```text
//! +----------+---------------+----------------------+
//! | reserved | encapsulation | options (2 octets)   |
//! +----------+---------------+----------------------+
//! ```
//!
//! Only the parameter-list schemes are accepted: 0x02 (PL_CDR_BE) and 0x03
//! (PL_CDR_LE). Anything else is rejected and the sample is dropped by the
//! caller.

use super::cdr::{CdrReader, CdrWriter, Endianness};
use crate::error::ParseError;

pub const PL_CDR_BE: u8 = 0x02;
pub const PL_CDR_LE: u8 = 0x03;

/// Scheme used for everything we send.
pub const PL_DEFAULT_ENCAPSULATION: u8 = PL_CDR_LE;

pub const ENCAPSULATION_HEADER_SIZE: usize = 4;

/// Encapsulation scheme octet for a byte order.
pub fn scheme_for(endianness: Endianness) -> u8 {
    match endianness {
        Endianness::Big => PL_CDR_BE,
        Endianness::Little => PL_CDR_LE,
    }
}

/// Validate the envelope and return the body byte order and the body.
pub fn read_envelope(payload: &[u8]) -> Result<(Endianness, &[u8]), ParseError> {
    if payload.len() < ENCAPSULATION_HEADER_SIZE {
        return Err(ParseError::Truncated {
            offset: 0,
            needed: ENCAPSULATION_HEADER_SIZE,
        });
    }
    let endianness = match payload[1] {
        PL_CDR_BE => Endianness::Big,
        PL_CDR_LE => Endianness::Little,
        other => return Err(ParseError::UnsupportedEncapsulation(other)),
    };
    Ok((endianness, &payload[ENCAPSULATION_HEADER_SIZE..]))
}

/// Reader positioned at the start of the body.
pub fn body_reader(payload: &[u8]) -> Result<CdrReader<'_>, ParseError> {
    let (endianness, body) = read_envelope(payload)?;
    Ok(CdrReader::new(body, endianness))
}

/// Prefix an encoded body with its envelope.
pub fn seal(body: CdrWriter) -> Vec<u8> {
    let scheme = scheme_for(body.endianness());
    let body = body.into_inner();
    let mut out = Vec::with_capacity(ENCAPSULATION_HEADER_SIZE + body.len());
    out.extend_from_slice(&[0x00, scheme, 0x00, 0x00]);
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_schemes() {
        let mut w = CdrWriter::new(Endianness::Big);
        w.write_u32(42);
        let sealed = seal(w);
        assert_eq!(&sealed[..4], &[0x00, PL_CDR_BE, 0x00, 0x00]);

        let mut r = body_reader(&sealed).expect("valid envelope");
        assert_eq!(r.read_u32().expect("u32"), 42);
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let payload = [0x00, 0x07, 0x00, 0x00, 1, 2, 3, 4];
        assert_eq!(
            read_envelope(&payload).err(),
            Some(ParseError::UnsupportedEncapsulation(0x07))
        );
        // Plain CDR (no parameter list) is not a discovery encapsulation.
        let payload = [0x00, 0x01, 0x00, 0x00];
        assert!(read_envelope(&payload).is_err());
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(matches!(
            read_envelope(&[0x00, 0x03]),
            Err(ParseError::Truncated { .. })
        ));
    }
}

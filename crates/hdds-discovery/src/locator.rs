// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS locator (transport address).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub const LOCATOR_KIND_UDPV4: i32 = 1;
pub const LOCATOR_KIND_UDPV6: i32 = 2;

/// Locator_t: kind + port + 16-byte address (IPv4 in the last 4 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub kind: i32,
    pub port: u32,
    pub address: [u8; 16],
}

impl Locator {
    pub fn udpv4(ip: [u8; 4], port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&ip);
        Self {
            kind: LOCATOR_KIND_UDPV4,
            port: u32::from(port),
            address,
        }
    }

    pub fn is_multicast(&self) -> bool {
        match self.kind {
            LOCATOR_KIND_UDPV4 => (224..=239).contains(&self.address[12]),
            LOCATOR_KIND_UDPV6 => self.address[0] == 0xFF,
            _ => false,
        }
    }

    /// Socket address, when the kind is a UDP flavour and the port fits.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        match self.kind {
            LOCATOR_KIND_UDPV4 => {
                let ip = Ipv4Addr::new(
                    self.address[12],
                    self.address[13],
                    self.address[14],
                    self.address[15],
                );
                Some(SocketAddr::new(IpAddr::V4(ip), port))
            }
            LOCATOR_KIND_UDPV6 => Some(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::from(self.address)),
                port,
            )),
            _ => None,
        }
    }
}

impl From<SocketAddr> for Locator {
    fn from(addr: SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(ip) => Locator::udpv4(ip.octets(), addr.port()),
            IpAddr::V6(ip) => Locator {
                kind: LOCATOR_KIND_UDPV6,
                port: u32::from(addr.port()),
                address: ip.octets(),
            },
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => write!(f, "Locator({})", addr),
            None => write!(f, "Locator(kind={}, port={})", self.kind, self.port),
        }
    }
}

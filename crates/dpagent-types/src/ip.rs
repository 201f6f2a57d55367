//! IPv4/IPv6 networks.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// An address with a prefix length, written `10.0.0.0/24` or `2001:db8::/32`.
///
/// Host bits are kept as given; `10.0.0.1/8` is not masked to `10.0.0.0/8`.
///
/// A bare address without a length parses as a host prefix (/32 or /128).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Fails if `prefix_len` is longer than the address (32 or 128 bits).
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let bits = max_prefix_len(&address);
        if prefix_len > bits {
            return Err(ParseError::InvalidIpPrefix(format!(
                "{address}/{prefix_len}: length is above {bits}"
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Creates a prefix from a 16-byte address buffer as carried by the
    /// engine, where IPv4 addresses occupy the first four bytes.
    pub fn from_octets(is_ipv6: bool, octets: [u8; 16], prefix_len: u8) -> Result<Self, ParseError> {
        let address = if is_ipv6 {
            IpAddr::V6(Ipv6Addr::from(octets))
        } else {
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
        };
        IpPrefix::new(address, prefix_len)
    }

    /// The unspecified network of the given family (0.0.0.0/0 or ::/0).
    pub fn any(is_ipv6: bool) -> Self {
        let address = if is_ipv6 {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        IpPrefix {
            address,
            prefix_len: 0,
        }
    }

    pub const fn address(&self) -> IpAddr {
        self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Returns the address in the engine's 16-byte layout.
    pub fn octets(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        match self.address {
            IpAddr::V4(v4) => buf[..4].copy_from_slice(&v4.octets()),
            IpAddr::V6(v6) => buf = v6.octets(),
        }
        buf
    }
}

fn max_prefix_len(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (addr, len) = match text.rsplit_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (text, None),
        };

        let address: IpAddr = addr
            .parse()
            .map_err(|_| ParseError::InvalidIpAddress(addr.to_string()))?;
        let prefix_len = match len {
            None => max_prefix_len(&address),
            Some(len) => len
                .parse()
                .map_err(|_| ParseError::InvalidIpPrefix(text.to_string()))?,
        };

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}

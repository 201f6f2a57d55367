//! Value types shared by the dataplane agent crates.
//!
//! - [`MacAddress`]: 48-bit Ethernet addresses, also used as match masks
//! - [`IpPrefix`]: IPv4/IPv6 networks in CIDR notation
//!
//! Both types serialize to and from their textual form, so they can be
//! embedded directly in desired-state documents.

mod ip;
mod mac;

pub use ip::IpPrefix;
pub use mac::MacAddress;

/// Error returned when address text cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}

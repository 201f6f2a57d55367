//! Ethernet addresses and masks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// A 48-bit Ethernet MAC address.
///
/// MAC match masks (e.g. `ff:ff:ff:00:00:00`) use the same type.
///
/// ```
/// use dpagent_types::MacAddress;
///
/// let mac: MacAddress = "11:44:0A:B8:4A:35".parse().unwrap();
/// assert_eq!(mac.to_string(), "11:44:0a:b8:4a:35");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// All zeros; as a mask it matches any address.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// All ones; as a mask it matches one exact address.
    pub const FULL_MASK: MacAddress = MacAddress([0xff; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

/// Accepts six hex octets separated by `:` or `-`.
impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(text.to_string());

        let mut octets = [0u8; 6];
        let mut fields = text.split([':', '-']);
        for slot in octets.iter_mut() {
            let field = fields.next().ok_or_else(invalid)?;
            if !(1..=2).contains(&field.len()) {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(field, 16).map_err(|_| invalid())?;
        }
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

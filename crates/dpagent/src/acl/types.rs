//! Access list model.
//!
//! An [`AccessList`] holds rules of exactly one family: address/port rules
//! ([`RuleMatch::Ip`]) or MAC+IP rules ([`RuleMatch::MacIp`]).

use std::net::IpAddr;

use dpagent_types::{IpPrefix, MacAddress};
use serde::{Deserialize, Serialize};

/// Rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    #[default]
    Deny,
    Permit,
    /// Permit and create reflexive session state
    Reflect,
}

impl AclAction {
    /// The engine's `is_permit` encoding.
    pub fn to_engine(self) -> u8 {
        match self {
            AclAction::Deny => 0,
            AclAction::Permit => 1,
            AclAction::Reflect => 2,
        }
    }

    pub fn from_engine(is_permit: u8) -> Option<Self> {
        match is_permit {
            0 => Some(AclAction::Deny),
            1 => Some(AclAction::Permit),
            2 => Some(AclAction::Reflect),
            _ => None,
        }
    }
}

/// Inclusive L4 port range. Absent ranges match every port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub lower_port: u16,
    pub upper_port: u16,
}

impl PortRange {
    pub const ANY: PortRange = PortRange {
        lower_port: 0,
        upper_port: u16::MAX,
    };

    pub const fn new(lower_port: u16, upper_port: u16) -> Self {
        Self {
            lower_port,
            upper_port,
        }
    }

    /// A range containing a single port.
    pub const fn port(port: u16) -> Self {
        Self::new(port, port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::ANY
    }
}

/// Inclusive ICMP type or code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IcmpRange {
    pub first: u8,
    pub last: u8,
}

impl IcmpRange {
    pub const ANY: IcmpRange = IcmpRange {
        first: 0,
        last: u8::MAX,
    };

    pub const fn new(first: u8, last: u8) -> Self {
        Self { first, last }
    }
}

impl Default for IcmpRange {
    fn default() -> Self {
        Self::ANY
    }
}

/// L4 part of an address/port rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum L4Match {
    Tcp {
        #[serde(default)]
        source_port_range: PortRange,
        #[serde(default)]
        destination_port_range: PortRange,
        #[serde(default)]
        flags_mask: u8,
        #[serde(default)]
        flags_value: u8,
    },
    Udp {
        #[serde(default)]
        source_port_range: PortRange,
        #[serde(default)]
        destination_port_range: PortRange,
    },
    Icmp {
        #[serde(default)]
        icmpv6: bool,
        #[serde(default)]
        type_range: IcmpRange,
        #[serde(default)]
        code_range: IcmpRange,
    },
}

/// Address/port (L3/L4) match.
///
/// Source and destination must be of the same address family when both
/// are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpRule {
    #[serde(default)]
    pub source_network: Option<IpPrefix>,
    #[serde(default)]
    pub destination_network: Option<IpPrefix>,
    #[serde(default)]
    pub l4: Option<L4Match>,
}

/// MAC+IP (L2) match on the source of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacIpRule {
    pub source_address: IpAddr,
    pub source_address_prefix: u8,
    pub source_mac_address: MacAddress,
    pub source_mac_address_mask: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleMatch {
    #[serde(rename = "ip_rule")]
    Ip(IpRule),
    #[serde(rename = "macip_rule")]
    MacIp(MacIpRule),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub action: AclAction,
    /// A rule without a match is dropped during validation
    #[serde(default, rename = "match")]
    pub rule_match: Option<RuleMatch>,
}

impl Rule {
    pub fn new(action: AclAction, rule_match: RuleMatch) -> Self {
        Self {
            action,
            rule_match: Some(rule_match),
        }
    }

    pub fn permit_ip(ip: IpRule) -> Self {
        Self::new(AclAction::Permit, RuleMatch::Ip(ip))
    }

    pub fn deny_ip(ip: IpRule) -> Self {
        Self::new(AclAction::Deny, RuleMatch::Ip(ip))
    }

    pub fn permit_macip(macip: MacIpRule) -> Self {
        Self::new(AclAction::Permit, RuleMatch::MacIp(macip))
    }

    pub fn deny_macip(macip: MacIpRule) -> Self {
        Self::new(AclAction::Deny, RuleMatch::MacIp(macip))
    }

    pub fn ip_rule(&self) -> Option<&IpRule> {
        match &self.rule_match {
            Some(RuleMatch::Ip(ip)) => Some(ip),
            _ => None,
        }
    }

    pub fn macip_rule(&self) -> Option<&MacIpRule> {
        match &self.rule_match {
            Some(RuleMatch::MacIp(macip)) => Some(macip),
            _ => None,
        }
    }
}

/// A named, ordered rule list and the interfaces it applies to.
///
/// Interface names are resolved when the list is attached, so they may
/// name interfaces that do not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Interfaces filtering inbound traffic (the only direction for MAC+IP)
    #[serde(default)]
    pub ingress: Vec<String>,
    /// Interfaces filtering outbound traffic (address/port lists only)
    #[serde(default)]
    pub egress: Vec<String>,
}

impl AccessList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_ingress(mut self, interfaces: &[&str]) -> Self {
        self.ingress = interfaces.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_egress(mut self, interfaces: &[&str]) -> Self {
        self.egress = interfaces.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Returns true if the list names `if_name` in either direction.
    pub fn references_interface(&self, if_name: &str) -> bool {
        self.ingress.iter().chain(self.egress.iter()).any(|i| i == if_name)
    }
}

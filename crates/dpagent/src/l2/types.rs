//! L2 value types stored as registry metadata.

use dpagent_types::MacAddress;
use serde::{Deserialize, Serialize};

/// An interface that is a member of a bridge domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BdInterface {
    pub name: String,
    /// True if this is the bridge domain's routed (BVI) interface
    #[serde(default)]
    pub bridged_virtual_interface: bool,
    #[serde(default)]
    pub split_horizon_group: u8,
}

impl BdInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bridged_virtual_interface: false,
            split_horizon_group: 0,
        }
    }
}

/// Desired configuration of a bridge domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDomain {
    pub name: String,
    #[serde(default)]
    pub flood: bool,
    #[serde(default)]
    pub unknown_unicast_flood: bool,
    #[serde(default)]
    pub forward: bool,
    #[serde(default)]
    pub learn: bool,
    #[serde(default)]
    pub arp_termination: bool,
    /// MAC aging time in minutes, 0 disables aging
    #[serde(default)]
    pub mac_age: u32,
    #[serde(default)]
    pub interfaces: Vec<BdInterface>,
}

impl BridgeDomain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flood: true,
            unknown_unicast_flood: true,
            forward: true,
            learn: true,
            arp_termination: false,
            mac_age: 0,
            interfaces: Vec::new(),
        }
    }

    pub fn with_interface(mut self, interface: BdInterface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Returns the member interface named `if_name`.
    pub fn interface(&self, if_name: &str) -> Option<&BdInterface> {
        self.interfaces.iter().find(|i| i.name == if_name)
    }
}

/// Bridge domain metadata kept in [`BdIndex`](super::BdIndex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BdMetadata {
    pub bridge_domain: BridgeDomain,
    /// Member interfaces already attached on the engine. Derived state, the
    /// bridge domain's interface list stays authoritative.
    pub configured_interfaces: Vec<String>,
}

impl BdMetadata {
    pub fn new(bridge_domain: BridgeDomain) -> Self {
        Self {
            bridge_domain,
            configured_interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FibAction {
    #[default]
    Forward,
    Drop,
}

/// A static L2 FIB entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FibEntry {
    pub phys_address: MacAddress,
    pub bridge_domain: String,
    pub outgoing_interface: String,
    #[serde(default)]
    pub action: FibAction,
    #[serde(default)]
    pub static_config: bool,
    #[serde(default)]
    pub bridged_virtual_interface: bool,
}

impl FibEntry {
    pub fn new(
        phys_address: MacAddress,
        bridge_domain: impl Into<String>,
        outgoing_interface: impl Into<String>,
    ) -> Self {
        Self {
            phys_address,
            bridge_domain: bridge_domain.into(),
            outgoing_interface: outgoing_interface.into(),
            action: FibAction::Forward,
            static_config: true,
            bridged_virtual_interface: false,
        }
    }
}

/// An L2 cross-connect from a receive interface to a transmit interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XConnectPair {
    pub receive_interface: String,
    pub transmit_interface: String,
}

impl XConnectPair {
    pub fn new(receive_interface: impl Into<String>, transmit_interface: impl Into<String>) -> Self {
        Self {
            receive_interface: receive_interface.into(),
            transmit_interface: transmit_interface.into(),
        }
    }
}

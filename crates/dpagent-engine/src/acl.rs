//! ACL plugin calls.
//!
//! [`AclEngine`] wraps a [`Channel`] and maps every ACL operation onto
//! exactly one request. Rules travel in the engine's flat record layout;
//! conversion from the agent's rule model lives in the configurator.

use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, Reply, Request};
use crate::error::{check_retval, EngineError, EngineResult};
use crate::types::{AclHandle, Direction, SwIfIndex};

/// Address/port rule in engine layout.
///
/// IPv4 addresses occupy the first four bytes of the 16-byte buffers. For
/// ICMP rules the port fields carry type and code ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpRuleRecord {
    /// 0 deny, 1 permit, 2 permit+reflect
    pub is_permit: u8,
    pub is_ipv6: bool,
    pub src_ip_addr: [u8; 16],
    pub src_ip_prefix_len: u8,
    pub dst_ip_addr: [u8; 16],
    pub dst_ip_prefix_len: u8,
    /// IP protocol number, 0 for any
    pub proto: u8,
    pub srcport_or_icmptype_first: u16,
    pub srcport_or_icmptype_last: u16,
    pub dstport_or_icmpcode_first: u16,
    pub dstport_or_icmpcode_last: u16,
    pub tcp_flags_mask: u8,
    pub tcp_flags_value: u8,
}

/// MAC+IP rule in engine layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacipRuleRecord {
    /// 0 deny, 1 permit
    pub is_permit: u8,
    pub is_ipv6: bool,
    pub src_mac: [u8; 6],
    pub src_mac_mask: [u8; 6],
    pub src_ip_addr: [u8; 16],
    pub src_ip_prefix_len: u8,
}

/// One address/port ACL as reported by a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRecord {
    pub acl_index: u32,
    pub tag: String,
    pub rules: Vec<IpRuleRecord>,
    /// Interfaces the ACL is attached to for inbound traffic
    pub ingress: Vec<SwIfIndex>,
    /// Interfaces the ACL is attached to for outbound traffic
    pub egress: Vec<SwIfIndex>,
}

/// One MAC+IP ACL as reported by a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacipAclRecord {
    pub acl_index: u32,
    pub tag: String,
    pub rules: Vec<MacipRuleRecord>,
    /// Interfaces the ACL is attached to (always inbound)
    pub interfaces: Vec<SwIfIndex>,
}

/// ACL operations on the engine.
#[derive(Clone)]
pub struct AclEngine {
    channel: Arc<dyn Channel>,
}

impl std::fmt::Debug for AclEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclEngine").finish_non_exhaustive()
    }
}

impl AclEngine {
    /// Creates an engine client over `channel`.
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    async fn call_status(&self, request: Request) -> EngineResult<()> {
        trace!("AclEngine: sending {}", request);
        match self.channel.send_request(request).await? {
            Reply::Status { retval } => check_retval(retval),
            other => Err(unexpected("status", &other)),
        }
    }

    async fn call_index(&self, request: Request) -> EngineResult<AclHandle> {
        trace!("AclEngine: sending {}", request);
        match self.channel.send_request(request).await? {
            Reply::AclIndex { retval, acl_index } => {
                check_retval(retval)?;
                Ok(AclHandle::new(acl_index))
            }
            other => Err(unexpected("acl_index", &other)),
        }
    }

    /// Creates an address/port ACL and returns the handle the engine chose.
    pub async fn add_ip_acl(&self, tag: &str, rules: Vec<IpRuleRecord>) -> EngineResult<AclHandle> {
        let handle = self
            .call_index(Request::AclAddReplace {
                acl_index: AclHandle::NEW,
                tag: tag.to_string(),
                rules,
            })
            .await?;
        debug!("AclEngine: created L3/L4 ACL {} with handle {}", tag, handle);
        Ok(handle)
    }

    /// Replaces the rules of an existing address/port ACL in place.
    pub async fn modify_ip_acl(
        &self,
        handle: AclHandle,
        tag: &str,
        rules: Vec<IpRuleRecord>,
    ) -> EngineResult<()> {
        self.call_index(Request::AclAddReplace {
            acl_index: handle.raw(),
            tag: tag.to_string(),
            rules,
        })
        .await
        .map(|_| ())
    }

    pub async fn delete_ip_acl(&self, handle: AclHandle) -> EngineResult<()> {
        self.call_status(Request::AclDel {
            acl_index: handle.raw(),
        })
        .await
    }

    /// Creates a MAC+IP ACL and returns the handle the engine chose.
    pub async fn add_macip_acl(&self, tag: &str, rules: Vec<MacipRuleRecord>) -> EngineResult<AclHandle> {
        let handle = self
            .call_index(Request::MacipAclAdd {
                tag: tag.to_string(),
                rules,
            })
            .await?;
        debug!("AclEngine: created L2 ACL {} with handle {}", tag, handle);
        Ok(handle)
    }

    /// Replaces the rules of an existing MAC+IP ACL in place.
    pub async fn modify_macip_acl(
        &self,
        handle: AclHandle,
        tag: &str,
        rules: Vec<MacipRuleRecord>,
    ) -> EngineResult<()> {
        self.call_index(Request::MacipAclAddReplace {
            acl_index: handle.raw(),
            tag: tag.to_string(),
            rules,
        })
        .await
        .map(|_| ())
    }

    pub async fn delete_macip_acl(&self, handle: AclHandle) -> EngineResult<()> {
        self.call_status(Request::MacipAclDel {
            acl_index: handle.raw(),
        })
        .await
    }

    /// Attaches an address/port ACL to one interface in one direction.
    pub async fn attach_ip_acl(
        &self,
        handle: AclHandle,
        sw_if_index: SwIfIndex,
        direction: Direction,
    ) -> EngineResult<()> {
        self.call_status(Request::AclInterfaceAddDel {
            is_add: true,
            is_input: direction.is_input(),
            sw_if_index,
            acl_index: handle.raw(),
        })
        .await
    }

    pub async fn detach_ip_acl(
        &self,
        handle: AclHandle,
        sw_if_index: SwIfIndex,
        direction: Direction,
    ) -> EngineResult<()> {
        self.call_status(Request::AclInterfaceAddDel {
            is_add: false,
            is_input: direction.is_input(),
            sw_if_index,
            acl_index: handle.raw(),
        })
        .await
    }

    /// Attaches a MAC+IP ACL to one interface. MAC+IP ACLs filter inbound
    /// traffic only.
    pub async fn attach_macip_acl(&self, handle: AclHandle, sw_if_index: SwIfIndex) -> EngineResult<()> {
        self.call_status(Request::MacipAclInterfaceAddDel {
            is_add: true,
            sw_if_index,
            acl_index: handle.raw(),
        })
        .await
    }

    pub async fn detach_macip_acl(&self, handle: AclHandle, sw_if_index: SwIfIndex) -> EngineResult<()> {
        self.call_status(Request::MacipAclInterfaceAddDel {
            is_add: false,
            sw_if_index,
            acl_index: handle.raw(),
        })
        .await
    }

    /// Lists every address/port ACL with its bindings.
    pub async fn dump_ip_acls(&self) -> EngineResult<Vec<AclRecord>> {
        let replies = self.channel.send_multi_request(Request::AclDump).await?;
        let mut records = Vec::with_capacity(replies.len());
        for reply in replies {
            match reply {
                Reply::AclDetails(record) => records.push(record),
                Reply::Status { retval } => check_retval(retval)?,
                other => return Err(unexpected("acl_details", &other)),
            }
        }
        debug!("AclEngine: dumped {} L3/L4 ACLs", records.len());
        Ok(records)
    }

    /// Lists every MAC+IP ACL with its bindings.
    pub async fn dump_macip_acls(&self) -> EngineResult<Vec<MacipAclRecord>> {
        let replies = self.channel.send_multi_request(Request::MacipAclDump).await?;
        let mut records = Vec::with_capacity(replies.len());
        for reply in replies {
            match reply {
                Reply::MacipAclDetails(record) => records.push(record),
                Reply::Status { retval } => check_retval(retval)?,
                other => return Err(unexpected("macip_acl_details", &other)),
            }
        }
        debug!("AclEngine: dumped {} L2 ACLs", records.len());
        Ok(records)
    }
}

fn unexpected(expected: &'static str, received: &Reply) -> EngineError {
    EngineError::UnexpectedReply {
        expected,
        received: received.name().to_string(),
    }
}

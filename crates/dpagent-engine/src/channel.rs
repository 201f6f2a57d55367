//! The request/reply seam to the engine.
//!
//! [`Channel`] is the only way the agent talks to the engine. Production
//! code plugs in a binary API transport; tests plug in
//! [`SimEngine`](crate::sim::SimEngine) or a recording wrapper around it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::acl::{AclRecord, IpRuleRecord, MacipAclRecord, MacipRuleRecord};
use crate::error::EngineResult;
use crate::types::SwIfIndex;

/// A request message understood by the engine's ACL plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Creates (`acl_index == AclHandle::NEW`) or replaces an address/port ACL.
    AclAddReplace {
        acl_index: u32,
        tag: String,
        rules: Vec<IpRuleRecord>,
    },
    AclDel {
        acl_index: u32,
    },
    MacipAclAdd {
        tag: String,
        rules: Vec<MacipRuleRecord>,
    },
    MacipAclAddReplace {
        acl_index: u32,
        tag: String,
        rules: Vec<MacipRuleRecord>,
    },
    MacipAclDel {
        acl_index: u32,
    },
    AclInterfaceAddDel {
        is_add: bool,
        is_input: bool,
        sw_if_index: SwIfIndex,
        acl_index: u32,
    },
    MacipAclInterfaceAddDel {
        is_add: bool,
        sw_if_index: SwIfIndex,
        acl_index: u32,
    },
    /// Streams every address/port ACL with its interface bindings.
    AclDump,
    /// Streams every MAC+IP ACL with its interface bindings.
    MacipAclDump,
}

impl Request {
    /// Short message name used in logs and error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Request::AclAddReplace { .. } => "acl_add_replace",
            Request::AclDel { .. } => "acl_del",
            Request::MacipAclAdd { .. } => "macip_acl_add",
            Request::MacipAclAddReplace { .. } => "macip_acl_add_replace",
            Request::MacipAclDel { .. } => "macip_acl_del",
            Request::AclInterfaceAddDel { .. } => "acl_interface_add_del",
            Request::MacipAclInterfaceAddDel { .. } => "macip_acl_interface_add_del",
            Request::AclDump => "acl_dump",
            Request::MacipAclDump => "macip_acl_dump",
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reply message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Generic status-only reply
    Status { retval: i32 },
    /// Reply to create/replace calls, carrying the ACL handle
    AclIndex { retval: i32, acl_index: u32 },
    /// One element of an [`Request::AclDump`] stream
    AclDetails(AclRecord),
    /// One element of a [`Request::MacipAclDump`] stream
    MacipAclDetails(MacipAclRecord),
}

impl Reply {
    /// Returns the reply status. Dump elements always report success.
    pub fn retval(&self) -> i32 {
        match self {
            Reply::Status { retval } | Reply::AclIndex { retval, .. } => *retval,
            Reply::AclDetails(_) | Reply::MacipAclDetails(_) => 0,
        }
    }

    /// Short message name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Reply::Status { .. } => "status",
            Reply::AclIndex { .. } => "acl_index",
            Reply::AclDetails(_) => "acl_details",
            Reply::MacipAclDetails(_) => "macip_acl_details",
        }
    }
}

/// Request/reply transport to the engine.
///
/// # Thread Safety
///
/// A channel is shared by every configurator, so implementations must be
/// `Send + Sync`. Each call is one round trip; callers never interleave the
/// replies of different requests.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Sends one request and waits for its single reply.
    async fn send_request(&self, request: Request) -> EngineResult<Reply>;

    /// Sends one request and collects the whole reply stream.
    async fn send_multi_request(&self, request: Request) -> EngineResult<Vec<Reply>>;
}

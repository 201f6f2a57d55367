//! ACL configuration - access lists applied to engine interfaces.
//!
//! [`AclConfigurator`] turns declared [`AccessList`]s into engine ACLs:
//!
//! - rules are validated and split by family ([`RuleFamily`])
//! - address/port lists may be attached ingress and egress
//! - MAC+IP lists may be attached ingress only
//! - attachments to interfaces that do not exist yet wait in a
//!   [`DependencyCache`](dpagent_idxmap::DependencyCache)
//!
//! # Architecture
//!
//! ```text
//! AccessList ──> AclConfigurator ──> AclEngine ──> engine channel
//!                    │
//!                    ├──> AclIndex (L2)
//!                    ├──> AclIndex (L3/L4)
//!                    └──> DependencyCache
//! ```

mod configurator;
pub mod convert;
mod error;
mod index;
mod resync;
mod types;
mod validate;

pub use configurator::{AclConfigurator, AclConfiguratorConfig, AclDetails};
pub use error::{AclError, Result};
pub use index::{AclEvent, AclIndex};
pub use types::{
    AccessList, AclAction, IcmpRange, IpRule, L4Match, MacIpRule, PortRange, Rule, RuleMatch,
};
pub use validate::{validate_rules, RuleFamily, ValidatedRules};

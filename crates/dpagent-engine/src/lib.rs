//! Access to the packet-processing engine over its binary RPC channel.
//!
//! The engine is reached only through request/reply messages. This crate
//! provides:
//!
//! - [`channel`]: The [`Channel`] seam and the message types exchanged on it
//! - [`error`]: Reply status translation into [`EngineError`]
//! - [`types`]: Engine handle types, including the registry offset of
//!   [`AclHandle`]
//! - [`acl`]: [`AclEngine`], one engine call per ACL operation
//! - `sim`: An in-memory engine for tests (`testing` feature)
//!
//! # Example
//!
//! ```ignore
//! use dpagent_engine::{AclEngine, Direction};
//!
//! let engine = AclEngine::new(channel);
//! let handle = engine.add_ip_acl("acl1", rules).await?;
//! engine.attach_ip_acl(handle, sw_if_index, Direction::Ingress).await?;
//! ```

pub mod acl;
pub mod channel;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod sim;
pub mod types;

pub use acl::{AclEngine, AclRecord, IpRuleRecord, MacipAclRecord, MacipRuleRecord};
pub use channel::{Channel, Reply, Request};
pub use error::{EngineError, EngineResult, EngineStatus};
pub use types::{AclHandle, Direction, SwIfIndex};

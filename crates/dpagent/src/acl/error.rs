//! ACL configurator errors.

use dpagent_engine::EngineError;
use thiserror::Error;

/// Error type for ACL configurator operations.
///
/// Every variant names the access list (or, for dumps, the index) and,
/// where it applies, the operation that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
    /// The access list is not registered in either index.
    #[error("cannot {op} ACL {name}: not found in the mapping")]
    NotFound { name: String, op: &'static str },

    /// No usable rules were supplied.
    #[error("failed to configure ACL {name}: no rules to set")]
    EmptyRuleSet { name: String },

    /// An engine call failed.
    #[error("failed to {op} ACL {name}: {source}")]
    Engine {
        name: String,
        op: &'static str,
        #[source]
        source: EngineError,
    },

    /// A rule cannot be expressed in the engine's rule layout.
    #[error("invalid rule in ACL {name}: {reason}")]
    InvalidRule { name: String, reason: String },
}

impl AclError {
    pub(crate) fn engine(name: &str, op: &'static str, source: EngineError) -> Self {
        AclError::Engine {
            name: name.to_string(),
            op,
            source,
        }
    }

    pub(crate) fn not_found(name: &str, op: &'static str) -> Self {
        AclError::NotFound {
            name: name.to_string(),
            op,
        }
    }

    /// Returns the name of the access list the error refers to.
    pub fn acl_name(&self) -> &str {
        match self {
            AclError::NotFound { name, .. }
            | AclError::EmptyRuleSet { name }
            | AclError::Engine { name, .. }
            | AclError::InvalidRule { name, .. } => name,
        }
    }
}

/// Result type alias for ACL configurator operations.
pub type Result<T> = std::result::Result<T, AclError>;

pub(crate) const OP_CONFIGURE: &str = "configure";
pub(crate) const OP_MODIFY: &str = "modify";
pub(crate) const OP_DELETE: &str = "delete";
pub(crate) const OP_DUMP: &str = "dump";
pub(crate) const OP_RESYNC: &str = "resync";
pub(crate) const OP_RESOLVE_CREATED: &str = "resolve-created-interface";

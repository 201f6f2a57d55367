//! ACL index: access list name to registry index, with the declared
//! [`AccessList`] as metadata.
//!
//! Registry indices are engine handles shifted by one; go through
//! [`AclIndex::register_acl`] and [`AclIndex::lookup_handle`] rather than
//! reading raw indices.

use std::ops::Deref;

use dpagent_engine::AclHandle;
use dpagent_idxmap::{Registry, RegistryEvent};

use super::types::AccessList;

pub type AclEvent = RegistryEvent<AccessList>;

#[derive(Debug)]
pub struct AclIndex {
    registry: Registry<AccessList>,
}

impl AclIndex {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(title),
        }
    }

    /// Registers `acl` under its name for the engine `handle`.
    pub fn register_acl(&self, handle: AclHandle, acl: AccessList) {
        let name = acl.name.clone();
        self.registry
            .register_name(name, handle.to_registry_index(), Some(acl));
    }

    /// Returns the engine handle and declared list registered as `name`.
    pub fn lookup_handle(&self, name: &str) -> Option<(AclHandle, Option<AccessList>)> {
        let (index, acl) = self.registry.lookup_idx(name)?;
        Some((AclHandle::from_registry_index(index)?, acl))
    }

    /// Returns the name registered for the engine `handle`.
    pub fn lookup_by_handle(&self, handle: AclHandle) -> Option<(String, Option<AccessList>)> {
        self.registry.lookup_name(handle.to_registry_index())
    }

    /// Names of all access lists declaring `if_name` as ingress or egress.
    pub fn lookup_by_interface(&self, if_name: &str) -> Vec<String> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(|e| {
                e.metadata
                    .as_ref()
                    .is_some_and(|acl| acl.references_interface(if_name))
            })
            .map(|e| e.name)
            .collect()
    }
}

impl Deref for AclIndex {
    type Target = Registry<AccessList>;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

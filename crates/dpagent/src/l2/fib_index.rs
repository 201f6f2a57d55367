//! L2 FIB index, keyed by MAC address.

use std::ops::Deref;

use dpagent_idxmap::{Registry, RegistryEvent};

use super::types::FibEntry;

pub type FibEvent = RegistryEvent<FibEntry>;

/// FIB entries by MAC address string. Indices are agent-assigned through
/// [`Registry::allocate_index`].
#[derive(Debug)]
pub struct FibIndex {
    registry: Registry<FibEntry>,
}

impl FibIndex {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(title),
        }
    }

    /// Registers `entry` under its MAC address with a freshly allocated
    /// index, or under its existing index if the MAC is already known.
    pub fn register_entry(&self, entry: FibEntry) -> u32 {
        let name = entry.phys_address.to_string();
        let index = match self.registry.lookup_idx(&name) {
            Some((index, _)) => index,
            None => self.registry.allocate_index(),
        };
        self.registry.register_name(name, index, Some(entry));
        index
    }

    /// MAC addresses of all entries in bridge domain `bd_name`.
    pub fn lookup_by_bridge_domain(&self, bd_name: &str) -> Vec<String> {
        self.filter_names(|entry| entry.bridge_domain == bd_name)
    }

    /// MAC addresses of all entries forwarding to `if_name`.
    pub fn lookup_by_interface(&self, if_name: &str) -> Vec<String> {
        self.filter_names(|entry| entry.outgoing_interface == if_name)
    }

    fn filter_names(&self, predicate: impl Fn(&FibEntry) -> bool) -> Vec<String> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(|e| e.metadata.as_ref().is_some_and(&predicate))
            .map(|e| e.name)
            .collect()
    }
}

impl Deref for FibIndex {
    type Target = Registry<FibEntry>;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

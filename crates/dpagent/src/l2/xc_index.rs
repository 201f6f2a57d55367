//! L2 cross-connect index, keyed by receive interface.

use std::ops::Deref;

use dpagent_idxmap::{Registry, RegistryEvent};

use super::types::XConnectPair;

pub type XcEvent = RegistryEvent<XConnectPair>;

#[derive(Debug)]
pub struct XcIndex {
    registry: Registry<XConnectPair>,
}

impl XcIndex {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(title),
        }
    }

    /// Registers `pair` under its receive interface. Returns the index.
    pub fn register_pair(&self, pair: XConnectPair) -> u32 {
        let name = pair.receive_interface.clone();
        let index = match self.registry.lookup_idx(&name) {
            Some((index, _)) => index,
            None => self.registry.allocate_index(),
        };
        self.registry.register_name(name, index, Some(pair));
        index
    }

    /// Returns the receive interface of the cross-connect transmitting to
    /// `if_name`.
    pub fn lookup_by_transmit_interface(&self, if_name: &str) -> Option<String> {
        self.registry.snapshot().into_iter().find_map(|entry| {
            let pair = entry.metadata?;
            (pair.transmit_interface == if_name).then_some(entry.name)
        })
    }
}

impl Deref for XcIndex {
    type Target = Registry<XConnectPair>;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

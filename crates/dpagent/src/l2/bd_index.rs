//! Bridge domain index.

use std::ops::Deref;

use dpagent_idxmap::{Registry, RegistryEvent};

use super::types::{BdInterface, BdMetadata, BridgeDomain};

/// Change notification of a [`BdIndex`].
pub type BdEvent = RegistryEvent<BdMetadata>;

/// Bridge domain name to engine bridge domain ID, with the desired
/// configuration and attached members as metadata.
///
/// All [`Registry`] operations are available through `Deref`.
#[derive(Debug)]
pub struct BdIndex {
    registry: Registry<BdMetadata>,
}

impl BdIndex {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(title),
        }
    }

    /// Registers a bridge domain with no members attached yet.
    pub fn register_bd(&self, index: u32, bridge_domain: BridgeDomain) {
        let name = bridge_domain.name.clone();
        self.registry
            .register_name(name, index, Some(BdMetadata::new(bridge_domain)));
    }

    /// Finds the first bridge domain listing `if_name` as a member.
    ///
    /// Scans every registered bridge domain in name order.
    pub fn lookup_bd_for_interface(&self, if_name: &str) -> Option<(u32, BridgeDomain, BdInterface)> {
        self.registry.snapshot().into_iter().find_map(|entry| {
            let meta = entry.metadata?;
            let member = meta.bridge_domain.interface(if_name)?.clone();
            Some((entry.index, meta.bridge_domain, member))
        })
    }

    /// Returns true if `if_name` is recorded as attached to `bd_name`.
    pub fn lookup_configured_interface(&self, bd_name: &str, if_name: &str) -> bool {
        match self.registry.lookup_idx(bd_name) {
            Some((_, Some(meta))) => meta.configured_interfaces.iter().any(|i| i == if_name),
            _ => false,
        }
    }

    /// Records `if_name` as attached to `bd_name`.
    ///
    /// Returns false if the bridge domain is not registered.
    pub fn add_configured_interface(&self, bd_name: &str, if_name: &str) -> bool {
        let mut recorded = false;
        self.registry.modify_metadata(bd_name, |meta| {
            if let Some(meta) = meta {
                if !meta.configured_interfaces.iter().any(|i| i == if_name) {
                    meta.configured_interfaces.push(if_name.to_string());
                }
                recorded = true;
            }
        });
        recorded
    }

    /// Forgets that `if_name` is attached to `bd_name`.
    pub fn remove_configured_interface(&self, bd_name: &str, if_name: &str) -> bool {
        let mut found = false;
        self.registry.modify_metadata(bd_name, |meta| {
            if let Some(meta) = meta {
                meta.configured_interfaces.retain(|i| i != if_name);
                found = true;
            }
        });
        found
    }
}

impl Deref for BdIndex {
    type Target = Registry<BdMetadata>;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpagent_idxmap::ChangeKind;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn bd(name: &str, members: &[&str]) -> BridgeDomain {
        members
            .iter()
            .fold(BridgeDomain::new(name), |bd, m| bd.with_interface(BdInterface::new(*m)))
    }

    #[test]
    fn test_lookup_bd_for_interface() {
        let index = BdIndex::new("bd_indexes");
        index.register_bd(1, bd("bd1", &["if1", "if2"]));
        index.register_bd(2, bd("bd2", &["if3"]));

        let (idx, found, member) = index.lookup_bd_for_interface("if3").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(found.name, "bd2");
        assert_eq!(member, BdInterface::new("if3"));

        assert!(index.lookup_bd_for_interface("if9").is_none());
    }

    #[test]
    fn test_entry_without_metadata_is_skipped() {
        let index = BdIndex::new("bd_indexes");
        index.register_name("bare", 5, None);
        index.register_bd(6, bd("bd6", &["if1"]));

        let (idx, _, _) = index.lookup_bd_for_interface("if1").unwrap();
        assert_eq!(idx, 6);
    }

    #[test]
    fn test_configured_interfaces() {
        let index = BdIndex::new("bd_indexes");
        index.register_bd(1, bd("bd1", &["if1", "if2"]));
        assert!(!index.lookup_configured_interface("bd1", "if1"));

        assert!(index.add_configured_interface("bd1", "if1"));
        assert!(index.add_configured_interface("bd1", "if1"));
        assert!(index.lookup_configured_interface("bd1", "if1"));
        let (_, meta) = index.lookup_idx("bd1").unwrap();
        assert_eq!(meta.unwrap().configured_interfaces, vec!["if1".to_string()]);

        assert!(index.remove_configured_interface("bd1", "if1"));
        assert!(!index.lookup_configured_interface("bd1", "if1"));

        assert!(!index.add_configured_interface("bd9", "if1"));
    }

    #[test]
    fn test_concurrent_configured_interfaces_are_all_kept() {
        let index = BdIndex::new("bd_indexes");
        index.register_bd(1, bd("bd1", &[]));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let index = &index;
                scope.spawn(move || {
                    for i in 0..25 {
                        index.add_configured_interface("bd1", &format!("if{worker}-{i}"));
                    }
                });
            }
        });

        let (_, meta) = index.lookup_idx("bd1").unwrap();
        assert_eq!(meta.unwrap().configured_interfaces.len(), 200);
    }

    #[tokio::test]
    async fn test_watch_delivers_typed_events() {
        let index = BdIndex::new("bd_indexes");
        let (tx, mut rx) = mpsc::channel::<BdEvent>(8);
        index.watch("l2-test", tx).unwrap();

        index.register_bd(3, bd("bd3", &["if1"]));
        index.add_configured_interface("bd3", "if1");

        let added = rx.recv().await.unwrap();
        assert_eq!(added.kind, ChangeKind::Added);
        assert_eq!(added.registry_title, "bd_indexes");
        assert_eq!(added.metadata.unwrap().bridge_domain.name, "bd3");

        let updated = rx.recv().await.unwrap();
        assert_eq!(updated.kind, ChangeKind::Updated);
        assert_eq!(
            updated.metadata.unwrap().configured_interfaces,
            vec!["if1".to_string()]
        );
    }
}

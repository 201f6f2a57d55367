//! AclConfigurator - applies access lists to the engine.
//!
//! The configurator creates, modifies and removes ACLs through
//! [`AclEngine`] and keeps one [`AclIndex`] per rule family:
//!
//! - L3/L4 (address/port) ACLs can be attached ingress and egress
//! - L2 (MAC+IP) ACLs can be attached ingress only
//!
//! Interfaces named by an access list may not exist yet. Such attachments
//! are parked in a [`DependencyCache`] and replayed from
//! [`AclConfigurator::resolve_created_interface`] once the interface shows
//! up. When an interface disappears the engine drops its attachments on
//! its own, so [`AclConfigurator::resolve_deleted_interface`] only parks
//! them again.
//!
//! Calls for the same access list name must be serialized by the caller.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dpagent_engine::{AclEngine, AclHandle, Direction, EngineResult, SwIfIndex};
use dpagent_idxmap::{
    AttachRole, DependencyCache, HandlerError, InterfaceIndex, InterfaceLifecycleHandler,
    PendingAttachment,
};
use log::{debug, info, warn};
use serde::Deserialize;

use super::convert::{decode_ip_rule, decode_macip_rule, encode_ip_rules, encode_macip_rules};
use super::error::{
    AclError, Result, OP_CONFIGURE, OP_DELETE, OP_DUMP, OP_MODIFY, OP_RESOLVE_CREATED,
};
use super::index::AclIndex;
use super::types::AccessList;
use super::validate::{validate_rules, RuleFamily};

/// Configuration for AclConfigurator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AclConfiguratorConfig {
    /// Title of the MAC+IP ACL index
    pub l2_index_title: String,
    /// Title of the address/port ACL index
    pub l3l4_index_title: String,
}

impl Default for AclConfiguratorConfig {
    fn default() -> Self {
        Self {
            l2_index_title: "acl_l2_indexes".to_string(),
            l3l4_index_title: "acl_l3_l4_indexes".to_string(),
        }
    }
}

/// An ACL as found on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclDetails {
    pub handle: AclHandle,
    pub acl: AccessList,
}

pub struct AclConfigurator {
    pub(super) engine: AclEngine,
    interfaces: Arc<dyn InterfaceIndex>,
    pub(super) l2_index: AclIndex,
    pub(super) l3l4_index: AclIndex,
    cache: DependencyCache,
}

impl std::fmt::Debug for AclConfigurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclConfigurator")
            .field("l2_acls", &self.l2_index.len())
            .field("l3l4_acls", &self.l3l4_index.len())
            .field("pending", &self.cache.len())
            .finish()
    }
}

impl AclConfigurator {
    /// Creates a configurator with empty indices.
    pub fn new(
        config: AclConfiguratorConfig,
        engine: AclEngine,
        interfaces: Arc<dyn InterfaceIndex>,
        cache: DependencyCache,
    ) -> Self {
        Self {
            engine,
            interfaces,
            l2_index: AclIndex::new(config.l2_index_title),
            l3l4_index: AclIndex::new(config.l3l4_index_title),
            cache,
        }
    }

    /// Index of MAC+IP ACLs.
    pub fn get_l2_index(&self) -> &AclIndex {
        &self.l2_index
    }

    /// Index of address/port ACLs.
    pub fn get_l3l4_index(&self) -> &AclIndex {
        &self.l3l4_index
    }

    /// Attachments waiting for their interface, in insertion order.
    pub fn pending_attachments(&self) -> Vec<PendingAttachment> {
        self.cache.snapshot()
    }

    /// Forgets all local state. The engine is not touched.
    pub(crate) fn clear_mapping(&self) {
        self.cache.clear();
        self.l2_index.clear();
        self.l3l4_index.clear();
    }

    fn index_for(&self, family: RuleFamily) -> &AclIndex {
        match family {
            RuleFamily::L2 => &self.l2_index,
            RuleFamily::L3L4 => &self.l3l4_index,
        }
    }

    /// Creates `acl` on the engine and attaches it to its interfaces.
    ///
    /// Interfaces that do not exist yet are cached, not reported as errors.
    pub async fn configure(&self, acl: &AccessList) -> Result<()> {
        if acl.rules.is_empty() {
            return Err(AclError::EmptyRuleSet {
                name: acl.name.clone(),
            });
        }
        let validated = validate_rules(&acl.name, &acl.rules);
        if validated.rules.is_empty() {
            return Err(AclError::EmptyRuleSet {
                name: acl.name.clone(),
            });
        }
        let other = match validated.family {
            RuleFamily::L2 => &self.l3l4_index,
            RuleFamily::L3L4 => &self.l2_index,
        };
        if let Some((_, previous)) = other.lookup_handle(&acl.name) {
            info!(
                "AclConfigurator: ACL {} changes rule family to {}, removing the old one",
                acl.name, validated.family
            );
            let previous = previous.unwrap_or_else(|| AccessList::new(acl.name.as_str()));
            self.delete(&previous).await?;
        } else if self.index_for(validated.family).lookup_idx(&acl.name).is_some() {
            warn!(
                "AclConfigurator: ACL {} is already configured, registering it again",
                acl.name
            );
        }

        let handle = match validated.family {
            RuleFamily::L2 => {
                let rules = encode_macip_rules(&acl.name, &validated.rules)?;
                let handle = self
                    .engine
                    .add_macip_acl(&acl.name, rules)
                    .await
                    .map_err(|e| AclError::engine(&acl.name, OP_CONFIGURE, e))?;
                self.l2_index.register_acl(handle, acl.clone());

                if !acl.egress.is_empty() {
                    warn!(
                        "AclConfigurator: L2 ACL {} cannot be attached as egress, ignoring {:?}",
                        acl.name, acl.egress
                    );
                }
                self.attach_or_cache(&acl.name, handle, AttachRole::L2, &acl.ingress, OP_CONFIGURE)
                    .await?;
                handle
            }
            RuleFamily::L3L4 => {
                let rules = encode_ip_rules(&acl.name, &validated.rules)?;
                let handle = self
                    .engine
                    .add_ip_acl(&acl.name, rules)
                    .await
                    .map_err(|e| AclError::engine(&acl.name, OP_CONFIGURE, e))?;
                self.l3l4_index.register_acl(handle, acl.clone());

                self.attach_or_cache(&acl.name, handle, AttachRole::Ingress, &acl.ingress, OP_CONFIGURE)
                    .await?;
                self.attach_or_cache(&acl.name, handle, AttachRole::Egress, &acl.egress, OP_CONFIGURE)
                    .await?;
                handle
            }
        };

        info!(
            "AclConfigurator: configured {} ACL {} with {} rules (handle {})",
            validated.family,
            acl.name,
            validated.rules.len(),
            handle
        );
        Ok(())
    }

    /// Replaces the rules of `old` with those of `new` in place and
    /// reconciles interface attachments.
    ///
    /// L3/L4 attachments are updated by delta. L2 attachments are all
    /// detached and attached again. A change of rule family recreates the
    /// ACL under a new handle.
    pub async fn modify(&self, old: &AccessList, new: &AccessList) -> Result<()> {
        let validated = validate_rules(&new.name, &new.rules);
        if validated.rules.is_empty() {
            return Err(AclError::EmptyRuleSet {
                name: new.name.clone(),
            });
        }

        let index = self.index_for(validated.family);
        let handle = match index.lookup_handle(&old.name) {
            Some((handle, _)) => handle,
            None if self.l2_index.lookup_idx(&old.name).is_some()
                || self.l3l4_index.lookup_idx(&old.name).is_some() =>
            {
                info!(
                    "AclConfigurator: ACL {} changes rule family to {}, recreating it",
                    old.name, validated.family
                );
                self.delete(old).await?;
                return self.configure(new).await;
            }
            None => return Err(AclError::not_found(&old.name, OP_MODIFY)),
        };

        match validated.family {
            RuleFamily::L2 => {
                let rules = encode_macip_rules(&new.name, &validated.rules)?;
                self.engine
                    .modify_macip_acl(handle, &new.name, rules)
                    .await
                    .map_err(|e| AclError::engine(&new.name, OP_MODIFY, e))?;

                self.detach_existing(&old.name, handle, AttachRole::L2, &old.ingress, OP_MODIFY)
                    .await?;
                self.attach_or_cache(&new.name, handle, AttachRole::L2, &new.ingress, OP_MODIFY)
                    .await?;
            }
            RuleFamily::L3L4 => {
                let rules = encode_ip_rules(&new.name, &validated.rules)?;
                self.engine
                    .modify_ip_acl(handle, &new.name, rules)
                    .await
                    .map_err(|e| AclError::engine(&new.name, OP_MODIFY, e))?;

                let (added_in, removed_in) = diff_interfaces(&old.ingress, &new.ingress);
                let (added_out, removed_out) = diff_interfaces(&old.egress, &new.egress);
                self.detach_existing(&old.name, handle, AttachRole::Ingress, &removed_in, OP_MODIFY)
                    .await?;
                self.detach_existing(&old.name, handle, AttachRole::Egress, &removed_out, OP_MODIFY)
                    .await?;
                self.attach_or_cache(&new.name, handle, AttachRole::Ingress, &added_in, OP_MODIFY)
                    .await?;
                self.attach_or_cache(&new.name, handle, AttachRole::Egress, &added_out, OP_MODIFY)
                    .await?;
            }
        }

        if new.name == old.name {
            index.update_metadata(&old.name, Some(new.clone()));
        } else {
            index.unregister_name(&old.name);
            index.register_acl(handle, new.clone());
        }

        info!(
            "AclConfigurator: modified {} ACL {} (handle {})",
            validated.family, new.name, handle
        );
        Ok(())
    }

    /// Detaches `acl` from its interfaces, removes it from the engine and
    /// unregisters it.
    pub async fn delete(&self, acl: &AccessList) -> Result<()> {
        if let Some((handle, _)) = self.l3l4_index.lookup_handle(&acl.name) {
            self.detach_existing(&acl.name, handle, AttachRole::Ingress, &acl.ingress, OP_DELETE)
                .await?;
            self.detach_existing(&acl.name, handle, AttachRole::Egress, &acl.egress, OP_DELETE)
                .await?;
            self.engine
                .delete_ip_acl(handle)
                .await
                .map_err(|e| AclError::engine(&acl.name, OP_DELETE, e))?;

            self.cache.remove_owned_by(handle.raw(), AttachRole::Ingress);
            self.cache.remove_owned_by(handle.raw(), AttachRole::Egress);
            self.l3l4_index.unregister_name(&acl.name);
            info!("AclConfigurator: removed L3/L4 ACL {} (handle {})", acl.name, handle);
            return Ok(());
        }

        if let Some((handle, _)) = self.l2_index.lookup_handle(&acl.name) {
            self.detach_existing(&acl.name, handle, AttachRole::L2, &acl.ingress, OP_DELETE)
                .await?;
            self.engine
                .delete_macip_acl(handle)
                .await
                .map_err(|e| AclError::engine(&acl.name, OP_DELETE, e))?;

            self.cache.remove_owned_by(handle.raw(), AttachRole::L2);
            self.l2_index.unregister_name(&acl.name);
            info!("AclConfigurator: removed L2 ACL {} (handle {})", acl.name, handle);
            return Ok(());
        }

        Err(AclError::not_found(&acl.name, OP_DELETE))
    }

    /// Reads every address/port ACL from the engine.
    pub async fn dump_ip_acls(&self) -> Result<Vec<AclDetails>> {
        let records = self
            .engine
            .dump_ip_acls()
            .await
            .map_err(|e| AclError::engine(self.l3l4_index.title(), OP_DUMP, e))?;

        Ok(records
            .into_iter()
            .map(|record| {
                let handle = AclHandle::new(record.acl_index);
                let name = self.dumped_name(&self.l3l4_index, handle, record.tag);
                let rules = record
                    .rules
                    .iter()
                    .filter_map(|r| {
                        let rule = decode_ip_rule(r);
                        if rule.is_none() {
                            warn!("AclConfigurator: ACL {} has an undecodable rule, skipping it", name);
                        }
                        rule
                    })
                    .collect();
                let ingress = self.interface_names(&name, &record.ingress);
                let egress = self.interface_names(&name, &record.egress);
                AclDetails {
                    handle,
                    acl: AccessList {
                        name,
                        rules,
                        ingress,
                        egress,
                    },
                }
            })
            .collect())
    }

    /// Reads every MAC+IP ACL from the engine.
    pub async fn dump_macip_acls(&self) -> Result<Vec<AclDetails>> {
        let records = self
            .engine
            .dump_macip_acls()
            .await
            .map_err(|e| AclError::engine(self.l2_index.title(), OP_DUMP, e))?;

        Ok(records
            .into_iter()
            .map(|record| {
                let handle = AclHandle::new(record.acl_index);
                let name = self.dumped_name(&self.l2_index, handle, record.tag);
                let rules = record
                    .rules
                    .iter()
                    .filter_map(|r| {
                        let rule = decode_macip_rule(r);
                        if rule.is_none() {
                            warn!("AclConfigurator: ACL {} has an undecodable rule, skipping it", name);
                        }
                        rule
                    })
                    .collect();
                let ingress = self.interface_names(&name, &record.interfaces);
                AclDetails {
                    handle,
                    acl: AccessList {
                        name,
                        rules,
                        ingress,
                        egress: Vec::new(),
                    },
                }
            })
            .collect())
    }

    /// Replays every attachment cached for `if_name` using `if_index`.
    ///
    /// Stops at the first failing attachment; it and the ones after it stay
    /// cached.
    pub async fn resolve_created_interface(&self, if_name: &str, if_index: u32) -> Result<()> {
        for entry in self.cache.pending_for(if_name) {
            let handle = AclHandle::new(entry.owner_handle);
            if let Err(e) = self.attach(handle, entry.role, if_index).await {
                return Err(AclError::engine(&self.name_for(&entry), OP_RESOLVE_CREATED, e));
            }
            self.cache.remove(&entry);
            debug!(
                "AclConfigurator: interface {} ({}) configured for ACL {}, removed from cache",
                if_name, entry.role, handle
            );
        }
        Ok(())
    }

    /// Caches an attachment for every registered ACL declaring `if_name`.
    ///
    /// The engine has already dropped the attachments of a removed
    /// interface, so nothing is detached here.
    pub async fn resolve_deleted_interface(&self, if_name: &str, _if_index: u32) -> Result<()> {
        let mut cached = 0;
        for (index, family) in [
            (&self.l3l4_index, RuleFamily::L3L4),
            (&self.l2_index, RuleFamily::L2),
        ] {
            for entry in index.snapshot() {
                let (Some(acl), Some(handle)) =
                    (entry.metadata, AclHandle::from_registry_index(entry.index))
                else {
                    continue;
                };
                let mut roles = Vec::new();
                match family {
                    RuleFamily::L3L4 => {
                        roles.extend(acl.ingress.iter().filter(|i| *i == if_name).map(|_| AttachRole::Ingress));
                        roles.extend(acl.egress.iter().filter(|i| *i == if_name).map(|_| AttachRole::Egress));
                    }
                    RuleFamily::L2 => {
                        roles.extend(acl.ingress.iter().filter(|i| *i == if_name).map(|_| AttachRole::L2));
                    }
                }
                for role in roles {
                    if self.cache.add(PendingAttachment::new(if_name, handle.raw(), role)) {
                        cached += 1;
                    }
                }
            }
        }
        debug!(
            "AclConfigurator: interface {} removed, {} attachments cached",
            if_name, cached
        );
        Ok(())
    }

    async fn attach(&self, handle: AclHandle, role: AttachRole, sw_if_index: SwIfIndex) -> EngineResult<()> {
        match role {
            AttachRole::Ingress => {
                self.engine
                    .attach_ip_acl(handle, sw_if_index, Direction::Ingress)
                    .await
            }
            AttachRole::Egress => {
                self.engine
                    .attach_ip_acl(handle, sw_if_index, Direction::Egress)
                    .await
            }
            AttachRole::L2 => self.engine.attach_macip_acl(handle, sw_if_index).await,
        }
    }

    async fn detach(&self, handle: AclHandle, role: AttachRole, sw_if_index: SwIfIndex) -> EngineResult<()> {
        match role {
            AttachRole::Ingress => {
                self.engine
                    .detach_ip_acl(handle, sw_if_index, Direction::Ingress)
                    .await
            }
            AttachRole::Egress => {
                self.engine
                    .detach_ip_acl(handle, sw_if_index, Direction::Egress)
                    .await
            }
            AttachRole::L2 => self.engine.detach_macip_acl(handle, sw_if_index).await,
        }
    }

    /// Attaches to every interface that exists and caches the others.
    async fn attach_or_cache(
        &self,
        acl_name: &str,
        handle: AclHandle,
        role: AttachRole,
        interfaces: &[String],
        op: &'static str,
    ) -> Result<()> {
        for if_name in interfaces {
            match self.interfaces.lookup_by_name(if_name) {
                Some(sw_if_index) => self
                    .attach(handle, role, sw_if_index)
                    .await
                    .map_err(|e| AclError::engine(acl_name, op, e))?,
                None => {
                    debug!(
                        "AclConfigurator: interface {} ({}) not found for ACL {}, moving to cache",
                        if_name, role, acl_name
                    );
                    self.cache
                        .add(PendingAttachment::new(if_name.as_str(), handle.raw(), role));
                }
            }
        }
        Ok(())
    }

    /// Detaches from every interface that exists. Attachments still waiting
    /// in the cache were never made on the engine; they are dropped instead.
    async fn detach_existing(
        &self,
        acl_name: &str,
        handle: AclHandle,
        role: AttachRole,
        interfaces: &[String],
        op: &'static str,
    ) -> Result<()> {
        for if_name in interfaces {
            let entry = PendingAttachment::new(if_name.as_str(), handle.raw(), role);
            let mut was_pending = false;
            while self.cache.remove(&entry) {
                was_pending = true;
            }
            if was_pending {
                debug!(
                    "AclConfigurator: interface {} ({}) of ACL {} was never attached, removed from cache",
                    if_name, role, acl_name
                );
                continue;
            }
            if let Some(sw_if_index) = self.interfaces.lookup_by_name(if_name) {
                self.detach(handle, role, sw_if_index)
                    .await
                    .map_err(|e| AclError::engine(acl_name, op, e))?;
            }
        }
        Ok(())
    }

    fn interface_names(&self, acl_name: &str, indices: &[SwIfIndex]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|idx| {
                let name = self.interfaces.lookup_by_handle(*idx);
                if name.is_none() {
                    warn!(
                        "AclConfigurator: ACL {} is attached to unknown interface index {}, skipping it",
                        acl_name, idx
                    );
                }
                name
            })
            .collect()
    }

    fn dumped_name(&self, index: &AclIndex, handle: AclHandle, tag: String) -> String {
        if !tag.is_empty() {
            return tag;
        }
        index
            .lookup_by_handle(handle)
            .map(|(name, _)| name)
            .unwrap_or_else(|| format!("#{}", handle))
    }

    fn name_for(&self, entry: &PendingAttachment) -> String {
        let index = match entry.role {
            AttachRole::L2 => &self.l2_index,
            AttachRole::Ingress | AttachRole::Egress => &self.l3l4_index,
        };
        index
            .lookup_by_handle(AclHandle::new(entry.owner_handle))
            .map(|(name, _)| name)
            .unwrap_or_else(|| format!("#{}", entry.owner_handle))
    }
}

/// Returns `(added, removed)` between two interface lists, compared as
/// sets. Order follows the input lists.
pub(crate) fn diff_interfaces(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set: HashSet<&String> = old.iter().collect();
    let new_set: HashSet<&String> = new.iter().collect();

    let mut seen = HashSet::new();
    let added = new
        .iter()
        .filter(|i| !old_set.contains(i) && seen.insert(*i))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let removed = old
        .iter()
        .filter(|i| !new_set.contains(i) && seen.insert(*i))
        .cloned()
        .collect();

    (added, removed)
}

#[async_trait]
impl InterfaceLifecycleHandler for AclConfigurator {
    fn name(&self) -> &str {
        "AclConfigurator"
    }

    async fn resolve_created_interface(&self, if_name: &str, if_index: u32) -> std::result::Result<(), HandlerError> {
        AclConfigurator::resolve_created_interface(self, if_name, if_index)
            .await
            .map_err(Into::into)
    }

    async fn resolve_deleted_interface(&self, if_name: &str, if_index: u32) -> std::result::Result<(), HandlerError> {
        AclConfigurator::resolve_deleted_interface(self, if_name, if_index)
            .await
            .map_err(Into::into)
    }
}

//! Full resynchronization of ACLs against the engine.

use log::info;

use super::configurator::AclConfigurator;
use super::error::{AclError, Result, OP_RESYNC};
use super::types::AccessList;

impl AclConfigurator {
    /// Replaces everything on the engine with `desired`.
    ///
    /// Local state is cleared, every ACL found on the engine is deleted and
    /// each desired list is configured in order. Stops at the first error;
    /// the engine may then hold a subset of `desired`.
    pub async fn resync(&self, desired: &[AccessList]) -> Result<()> {
        self.clear_mapping();

        let ip_acls = self.dump_ip_acls().await?;
        let macip_acls = self.dump_macip_acls().await?;

        for details in &ip_acls {
            self.engine
                .delete_ip_acl(details.handle)
                .await
                .map_err(|e| AclError::engine(&details.acl.name, OP_RESYNC, e))?;
            self.l3l4_index.unregister_name(&details.acl.name);
        }
        for details in &macip_acls {
            self.engine
                .delete_macip_acl(details.handle)
                .await
                .map_err(|e| AclError::engine(&details.acl.name, OP_RESYNC, e))?;
            self.l2_index.unregister_name(&details.acl.name);
        }

        for acl in desired {
            self.configure(acl).await?;
        }

        info!(
            "AclConfigurator: resync removed {} L3/L4 and {} L2 ACLs, configured {}",
            ip_acls.len(),
            macip_acls.len(),
            desired.len()
        );
        Ok(())
    }
}

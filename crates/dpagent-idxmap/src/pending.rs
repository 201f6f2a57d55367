//! Dependency cache for attachments waiting on an interface.
//!
//! Configuration may reference an interface before the interface exists.
//! Such attachments are parked here as [`PendingAttachment`]s and replayed
//! when the interface is reported as created.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

/// How an owning object is attached to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachRole {
    /// Address/port ACL in the ingress direction
    Ingress,
    /// Address/port ACL in the egress direction
    Egress,
    /// MAC+IP ACL (ingress only)
    L2,
}

impl fmt::Display for AttachRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttachRole::Ingress => "ingress",
            AttachRole::Egress => "egress",
            AttachRole::L2 => "l2",
        };
        f.write_str(s)
    }
}

/// An attachment deferred until `interface_name` appears.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingAttachment {
    /// The interface the owner must be attached to
    pub interface_name: String,
    /// Engine handle of the owning object
    pub owner_handle: u32,
    /// Attachment role
    pub role: AttachRole,
}

impl PendingAttachment {
    /// Creates a new pending attachment.
    pub fn new(interface_name: impl Into<String>, owner_handle: u32, role: AttachRole) -> Self {
        Self {
            interface_name: interface_name.into(),
            owner_handle,
            role,
        }
    }
}

impl fmt::Display for PendingAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.interface_name, self.owner_handle, self.role)
    }
}

/// Ordered list of pending attachments.
///
/// The list is guarded by its own mutex; no method holds the lock beyond
/// its own body, so callers can issue engine calls between operations.
#[derive(Debug)]
pub struct DependencyCache {
    entries: Mutex<Vec<PendingAttachment>>,
    dedup: bool,
}

impl DependencyCache {
    /// Creates an empty cache.
    ///
    /// With `dedup` set, adding an entry equal to one already cached is a
    /// no-op.
    pub fn new(dedup: bool) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            dedup,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingAttachment>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an entry. Returns false if it was dropped as a duplicate.
    pub fn add(&self, entry: PendingAttachment) -> bool {
        let mut entries = self.lock();
        if self.dedup && entries.contains(&entry) {
            debug!("DependencyCache: {} already pending", entry);
            return false;
        }
        debug!("DependencyCache: caching {}", entry);
        entries.push(entry);
        true
    }

    /// Returns the entries waiting for `interface_name`, in insertion order.
    pub fn pending_for(&self, interface_name: &str) -> Vec<PendingAttachment> {
        self.lock()
            .iter()
            .filter(|e| e.interface_name == interface_name)
            .cloned()
            .collect()
    }

    /// Removes the first entry equal to `entry`.
    pub fn remove(&self, entry: &PendingAttachment) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|e| e == entry) {
            Some(pos) => {
                entries.remove(pos);
                debug!("DependencyCache: resolved {}", entry);
                true
            }
            None => false,
        }
    }

    /// Drops every entry owned by `owner_handle` in `role`. Returns how many
    /// were dropped.
    pub fn remove_owned_by(&self, owner_handle: u32, role: AttachRole) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| !(e.owner_handle == owner_handle && e.role == role));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(
                "DependencyCache: dropped {} {} entries of handle {}",
                removed, role, owner_handle
            );
        }
        removed
    }

    /// Returns true if an entry equal to `entry` is cached.
    pub fn contains(&self, entry: &PendingAttachment) -> bool {
        self.lock().contains(entry)
    }

    /// Returns a copy of all entries in insertion order.
    pub fn snapshot(&self) -> Vec<PendingAttachment> {
        self.lock().clone()
    }

    /// Returns the number of pending entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for DependencyCache {
    fn default() -> Self {
        Self::new(true)
    }
}

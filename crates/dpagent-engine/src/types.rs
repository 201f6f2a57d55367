//! Engine-side identifiers.

use std::fmt;

/// Engine interface index (`sw_if_index`).
pub type SwIfIndex = u32;

/// Handle the engine assigned to an ACL when it was created.
///
/// Engine handles start at 0. Registries reserve index 0 for "not
/// registered", so the registry stores `handle + 1`; use
/// [`AclHandle::to_registry_index`] and [`AclHandle::from_registry_index`]
/// for every crossing between the two numberings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AclHandle(u32);

impl AclHandle {
    /// Value the engine interprets as "allocate a new ACL" in add/replace.
    pub const NEW: u32 = u32::MAX;

    /// Wraps a handle reported by the engine.
    pub const fn new(raw: u32) -> Self {
        AclHandle(raw)
    }

    /// Returns the engine's numeric handle.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Returns the value stored in a registry for this handle.
    pub const fn to_registry_index(&self) -> u32 {
        self.0 + 1
    }

    /// Recovers the engine handle from a registry index.
    ///
    /// Returns `None` for 0, the "not registered" sentinel.
    pub const fn from_registry_index(index: u32) -> Option<Self> {
        match index.checked_sub(1) {
            Some(raw) => Some(AclHandle(raw)),
            None => None,
        }
    }
}

impl fmt::Debug for AclHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AclHandle({})", self.0)
    }
}

impl fmt::Display for AclHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traffic direction of an address/port ACL attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    /// Returns true for the ingress direction (the engine's `is_input`).
    pub fn is_input(&self) -> bool {
        matches!(self, Direction::Ingress)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => f.write_str("ingress"),
            Direction::Egress => f.write_str("egress"),
        }
    }
}

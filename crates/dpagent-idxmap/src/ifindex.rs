//! Read-only view of the interface registry.

use crate::Registry;

/// Resolves interface names to engine interface indices and back.
///
/// Configurators hold this trait rather than the interface registry itself,
/// so the dependency points one way only.
pub trait InterfaceIndex: Send + Sync {
    /// Returns the engine index of the named interface, if it exists.
    fn lookup_by_name(&self, name: &str) -> Option<u32>;

    /// Returns the name of the interface with the given engine index.
    fn lookup_by_handle(&self, handle: u32) -> Option<String>;
}

impl<M> InterfaceIndex for Registry<M>
where
    M: Clone + Send + 'static,
{
    fn lookup_by_name(&self, name: &str) -> Option<u32> {
        self.lookup_idx(name).map(|(index, _)| index)
    }

    fn lookup_by_handle(&self, handle: u32) -> Option<String> {
        self.lookup_name(handle).map(|(name, _)| name)
    }
}

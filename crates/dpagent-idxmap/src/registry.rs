//! Concurrency-safe name↔index registry with a change feed.
//!
//! A [`Registry`] maps unique names to numeric indices and carries typed
//! metadata per entry. Every mutation is serialized on a single mutex, so
//! the registry can be shared between northbound reconciliation and
//! southbound lifecycle handling without further locking.
//!
//! # Change feed
//!
//! [`Registry::watch`] hands each subscriber its own forwarding task. The
//! mutator only pushes into an unbounded per-subscriber queue while holding
//! the lock; the forwarding task moves events into the subscriber's bounded
//! channel and is the only party that waits when the subscriber lags. Events
//! reach each subscriber in mutation order.
//!
//! The per-subscriber queue has no capacity limit: a subscriber that stops
//! receiving makes its queue grow until it is dropped or
//! [`Registry::unwatch`]ed. Bounding it would make mutators wait on the
//! slowest subscriber while holding the registry lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Error type for registry subscription management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("subscriber {0} is already watching this registry")]
    SubscriberExists(String),

    #[error("subscriber {0} is not watching this registry")]
    SubscriberNotFound(String),
}

/// Kind of mutation carried by a [`RegistryEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Entry registered (or re-registered under the same name)
    Added,
    /// Metadata replaced through [`Registry::update_metadata`]
    Updated,
    /// Entry unregistered
    Deleted,
}

/// A change notification delivered to registry subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEvent<M> {
    /// Title of the registry that produced the event
    pub registry_title: String,
    /// Name of the affected entry
    pub name: String,
    /// Index of the affected entry
    pub index: u32,
    /// Metadata after the change (or the removed metadata for deletions)
    pub metadata: Option<M>,
    /// What happened
    pub kind: ChangeKind,
}

impl<M> RegistryEvent<M> {
    /// Returns true if this event reports a removal.
    pub fn is_deleted(&self) -> bool {
        self.kind == ChangeKind::Deleted
    }
}

/// A snapshot of one registered entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry<M> {
    pub name: String,
    pub index: u32,
    pub metadata: Option<M>,
}

#[derive(Debug)]
struct Slot<M> {
    index: u32,
    metadata: Option<M>,
}

#[derive(Debug)]
struct Subscriber<M> {
    queue: mpsc::UnboundedSender<RegistryEvent<M>>,
    forwarder: JoinHandle<()>,
}

#[derive(Debug)]
struct Inner<M> {
    by_name: BTreeMap<String, Slot<M>>,
    by_index: HashMap<u32, String>,
    next_index: u32,
    subscribers: HashMap<String, Subscriber<M>>,
}

/// A name↔index map with typed metadata and change notification.
///
/// Names are unique among registered entries and so are indices: registering
/// an index that is held by another name evicts that name first.
#[derive(Debug)]
pub struct Registry<M> {
    title: String,
    inner: Mutex<Inner<M>>,
}

impl<M> Registry<M>
where
    M: Clone + Send + 'static,
{
    /// Creates an empty registry. The title is reported in every event.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            inner: Mutex::new(Inner {
                by_name: BTreeMap::new(),
                by_index: HashMap::new(),
                next_index: 1,
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Returns the registry title.
    pub fn title(&self) -> &str {
        &self.title
    }

    fn lock(&self) -> MutexGuard<'_, Inner<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `name` under `index`, replacing any previous entry with the
    /// same name. Last write wins.
    pub fn register_name(&self, name: impl Into<String>, index: u32, metadata: Option<M>) {
        let name = name.into();
        let mut inner = self.lock();

        if let Some(old) = inner.by_name.remove(&name) {
            inner.by_index.remove(&old.index);
        }
        if let Some(holder) = inner.by_index.remove(&index) {
            if let Some(evicted) = inner.by_name.remove(&holder) {
                debug!(
                    "Registry {}: index {} moved from {} to {}",
                    self.title, index, holder, name
                );
                let event = self.event(&holder, index, evicted.metadata, ChangeKind::Deleted);
                publish(&mut inner, event);
            }
        }

        inner.by_index.insert(index, name.clone());
        inner.by_name.insert(
            name.clone(),
            Slot {
                index,
                metadata: metadata.clone(),
            },
        );
        if index >= inner.next_index {
            inner.next_index = index.saturating_add(1);
        }

        let event = self.event(&name, index, metadata, ChangeKind::Added);
        publish(&mut inner, event);
    }

    /// Removes `name`, returning its index and metadata if it was registered.
    pub fn unregister_name(&self, name: &str) -> Option<(u32, Option<M>)> {
        let mut inner = self.lock();
        let slot = inner.by_name.remove(name)?;
        inner.by_index.remove(&slot.index);

        let event = self.event(name, slot.index, slot.metadata.clone(), ChangeKind::Deleted);
        publish(&mut inner, event);

        Some((slot.index, slot.metadata))
    }

    /// Looks up the index and metadata registered under `name`.
    pub fn lookup_idx(&self, name: &str) -> Option<(u32, Option<M>)> {
        let inner = self.lock();
        inner
            .by_name
            .get(name)
            .map(|slot| (slot.index, slot.metadata.clone()))
    }

    /// Looks up the name and metadata registered under `index`.
    pub fn lookup_name(&self, index: u32) -> Option<(String, Option<M>)> {
        let inner = self.lock();
        let name = inner.by_index.get(&index)?;
        let slot = inner.by_name.get(name)?;
        Some((name.clone(), slot.metadata.clone()))
    }

    /// Replaces the metadata of a registered entry.
    ///
    /// Returns false (and changes nothing) if `name` is not registered.
    pub fn update_metadata(&self, name: &str, metadata: Option<M>) -> bool {
        let mut inner = self.lock();
        let index = match inner.by_name.get_mut(name) {
            Some(slot) => {
                slot.metadata = metadata.clone();
                slot.index
            }
            None => return false,
        };

        let event = self.event(name, index, metadata, ChangeKind::Updated);
        publish(&mut inner, event);
        true
    }

    /// Edits the metadata of a registered entry in place under the registry
    /// lock and emits an update event.
    ///
    /// Returns false (and calls nothing) if `name` is not registered.
    pub fn modify_metadata(&self, name: &str, edit: impl FnOnce(&mut Option<M>)) -> bool {
        let mut inner = self.lock();
        let (index, metadata) = match inner.by_name.get_mut(name) {
            Some(slot) => {
                edit(&mut slot.metadata);
                (slot.index, slot.metadata.clone())
            }
            None => return false,
        };

        let event = self.event(name, index, metadata, ChangeKind::Updated);
        publish(&mut inner, event);
        true
    }

    /// Removes all entries and resets index allocation.
    ///
    /// No per-entry events are emitted; callers performing a resync clear the
    /// registry before re-registering.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.by_name.clear();
        inner.by_index.clear();
        inner.next_index = 1;
    }

    /// Returns the next free index, starting at 1, for registries whose
    /// indices are assigned by the agent rather than by the engine.
    pub fn allocate_index(&self) -> u32 {
        let mut inner = self.lock();
        while inner.by_index.contains_key(&inner.next_index) {
            inner.next_index = inner.next_index.saturating_add(1);
        }
        let index = inner.next_index;
        inner.next_index = index.saturating_add(1);
        index
    }

    /// Returns all registered names in sorted order.
    pub fn list_names(&self) -> Vec<String> {
        self.lock().by_name.keys().cloned().collect()
    }

    /// Returns a snapshot of all entries in name order.
    pub fn snapshot(&self) -> Vec<RegistryEntry<M>> {
        self.lock()
            .by_name
            .iter()
            .map(|(name, slot)| RegistryEntry {
                name: name.clone(),
                index: slot.index,
                metadata: slot.metadata.clone(),
            })
            .collect()
    }

    /// Returns the number of registered entries.
    pub fn len(&self) -> usize {
        self.lock().by_name.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().by_name.is_empty()
    }

    /// Subscribes `subscriber` to every mutation made from now on.
    ///
    /// Events are forwarded into `channel` by a dedicated task, so this must
    /// be called from within a Tokio runtime. The subscription lasts until
    /// [`Registry::unwatch`] is called or the receiver is dropped. Dropping
    /// the registry ends the subscription once queued events are forwarded.
    pub fn watch(
        &self,
        subscriber: impl Into<String>,
        channel: mpsc::Sender<RegistryEvent<M>>,
    ) -> Result<(), RegistryError> {
        let subscriber = subscriber.into();
        let mut inner = self.lock();
        if let Some(existing) = inner.subscribers.get(&subscriber) {
            if !existing.queue.is_closed() {
                return Err(RegistryError::SubscriberExists(subscriber));
            }
        }

        let (queue, mut pending) = mpsc::unbounded_channel::<RegistryEvent<M>>();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = pending.recv().await {
                if channel.send(event).await.is_err() {
                    break;
                }
            }
        });

        debug!("Registry {}: {} is watching", self.title, subscriber);
        inner
            .subscribers
            .insert(subscriber, Subscriber { queue, forwarder });
        Ok(())
    }

    /// Cancels a subscription. Events not yet forwarded are discarded.
    pub fn unwatch(&self, subscriber: &str) -> Result<(), RegistryError> {
        let removed = self.lock().subscribers.remove(subscriber);
        match removed {
            Some(sub) => {
                sub.forwarder.abort();
                debug!("Registry {}: {} stopped watching", self.title, subscriber);
                Ok(())
            }
            None => Err(RegistryError::SubscriberNotFound(subscriber.to_string())),
        }
    }

    fn event(&self, name: &str, index: u32, metadata: Option<M>, kind: ChangeKind) -> RegistryEvent<M> {
        RegistryEvent {
            registry_title: self.title.clone(),
            name: name.to_string(),
            index,
            metadata,
            kind,
        }
    }
}

/// Queues `event` for every live subscriber and forgets the ones whose
/// forwarding task has ended.
fn publish<M: Clone>(inner: &mut Inner<M>, event: RegistryEvent<M>) {
    inner
        .subscribers
        .retain(|_, sub| sub.queue.send(event.clone()).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    struct Meta(&'static str);

    async fn next_event(rx: &mut mpsc::Receiver<RegistryEvent<Meta>>) -> RegistryEvent<Meta> {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event not delivered")
            .expect("channel closed")
    }

    #[test]
    fn test_register_lookup_both_directions() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("bd1", 7, Some(Meta("a")));

        assert_eq!(reg.lookup_idx("bd1"), Some((7, Some(Meta("a")))));
        assert_eq!(reg.lookup_name(7), Some(("bd1".to_string(), Some(Meta("a")))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_without_metadata() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("if0", 0, None);
        assert_eq!(reg.lookup_idx("if0"), Some((0, None)));
    }

    #[test]
    fn test_unregister_removes_both_directions() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("bd1", 7, Some(Meta("a")));

        assert_eq!(reg.unregister_name("bd1"), Some((7, Some(Meta("a")))));
        assert!(reg.lookup_idx("bd1").is_none());
        assert!(reg.lookup_name(7).is_none());
        assert!(reg.unregister_name("bd1").is_none());
    }

    #[test]
    fn test_reregister_replaces_index() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("acl", 1, None);
        reg.register_name("acl", 5, None);

        assert_eq!(reg.lookup_idx("acl"), Some((5, None)));
        assert!(reg.lookup_name(1).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_index_collision_evicts_previous_holder() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("old", 3, None);
        reg.register_name("new", 3, None);

        assert!(reg.lookup_idx("old").is_none());
        assert_eq!(reg.lookup_name(3), Some(("new".to_string(), None)));
    }

    #[test]
    fn test_update_metadata_requires_registration() {
        let reg: Registry<Meta> = Registry::new("test");
        assert!(!reg.update_metadata("missing", Some(Meta("x"))));
        assert!(reg.lookup_idx("missing").is_none());

        reg.register_name("bd", 1, Some(Meta("a")));
        assert!(reg.update_metadata("bd", Some(Meta("b"))));
        assert_eq!(reg.lookup_idx("bd"), Some((1, Some(Meta("b")))));
    }

    #[test]
    fn test_clear_resets_allocation() {
        let reg: Registry<Meta> = Registry::new("test");
        assert_eq!(reg.allocate_index(), 1);
        assert_eq!(reg.allocate_index(), 2);
        reg.register_name("a", 10, None);
        assert_eq!(reg.allocate_index(), 11);

        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.allocate_index(), 1);
    }

    #[test]
    fn test_modify_metadata_in_place() {
        let reg: Registry<Meta> = Registry::new("test");
        assert!(!reg.modify_metadata("missing", |_| panic!("not registered")));

        reg.register_name("bd1", 1, None);
        assert!(reg.modify_metadata("bd1", |meta| *meta = Some(Meta("set"))));
        assert_eq!(reg.lookup_idx("bd1"), Some((1, Some(Meta("set")))));
    }

    #[test]
    fn test_concurrent_modify_metadata_keeps_every_edit() {
        let reg: Registry<Vec<u32>> = Registry::new("test");
        reg.register_name("bd1", 1, Some(Vec::new()));

        std::thread::scope(|scope| {
            for worker in 0..8u32 {
                let reg = &reg;
                scope.spawn(move || {
                    for i in 0..50 {
                        reg.modify_metadata("bd1", |meta| {
                            meta.get_or_insert_with(Vec::new).push(worker * 100 + i)
                        });
                    }
                });
            }
        });

        let (_, meta) = reg.lookup_idx("bd1").unwrap();
        assert_eq!(meta.unwrap().len(), 400);
    }

    #[test]
    fn test_allocate_skips_used_indices() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("a", 1, None);
        reg.register_name("b", 2, None);
        assert_eq!(reg.allocate_index(), 3);
    }

    #[test]
    fn test_list_names_sorted() {
        let reg: Registry<Meta> = Registry::new("test");
        reg.register_name("c", 3, None);
        reg.register_name("a", 1, None);
        reg.register_name("b", 2, None);
        assert_eq!(reg.list_names(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_watch_delivers_in_mutation_order() {
        let reg: Registry<Meta> = Registry::new("bd_indexes");
        let (tx, mut rx) = mpsc::channel(2);
        reg.watch("l2", tx).unwrap();

        reg.register_name("bd1", 1, Some(Meta("a")));
        reg.update_metadata("bd1", Some(Meta("b")));
        reg.register_name("bd2", 2, None);
        reg.unregister_name("bd1");

        let first = next_event(&mut rx).await;
        assert_eq!(first.registry_title, "bd_indexes");
        assert_eq!(first.kind, ChangeKind::Added);
        assert_eq!(first.metadata, Some(Meta("a")));

        let second = next_event(&mut rx).await;
        assert_eq!(second.kind, ChangeKind::Updated);
        assert_eq!(second.metadata, Some(Meta("b")));

        let third = next_event(&mut rx).await;
        assert_eq!(third.name, "bd2");

        let fourth = next_event(&mut rx).await;
        assert!(fourth.is_deleted());
        assert_eq!(fourth.name, "bd1");
        assert_eq!(fourth.index, 1);
    }

    #[tokio::test]
    async fn test_clear_is_silent() {
        let reg: Registry<Meta> = Registry::new("test");
        let (tx, mut rx) = mpsc::channel(8);
        reg.watch("sub", tx).unwrap();

        reg.register_name("a", 1, None);
        reg.clear();
        reg.register_name("b", 1, None);

        assert_eq!(next_event(&mut rx).await.name, "a");
        assert_eq!(next_event(&mut rx).await.name, "b");
    }

    #[tokio::test]
    async fn test_duplicate_subscriber_rejected() {
        let reg: Registry<Meta> = Registry::new("test");
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);

        reg.watch("sub", tx1).unwrap();
        assert_eq!(
            reg.watch("sub", tx2),
            Err(RegistryError::SubscriberExists("sub".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unwatch_stops_delivery() {
        let reg: Registry<Meta> = Registry::new("test");
        let (tx, mut rx) = mpsc::channel(8);
        reg.watch("sub", tx).unwrap();
        reg.unwatch("sub").unwrap();

        reg.register_name("a", 1, None);
        let received = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(received.is_none());

        assert_eq!(
            reg.unwatch("sub"),
            Err(RegistryError::SubscriberNotFound("sub".to_string()))
        );
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_mutator() {
        let reg: Registry<Meta> = Registry::new("test");
        let (tx, mut rx) = mpsc::channel(1);
        reg.watch("slow", tx).unwrap();

        for i in 0..64 {
            reg.register_name(format!("e{}", i), i, None);
        }

        for i in 0..64 {
            assert_eq!(next_event(&mut rx).await.index, i);
        }
    }
}

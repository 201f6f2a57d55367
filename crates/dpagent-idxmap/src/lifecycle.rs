//! Interface lifecycle dispatch.
//!
//! The interface subsystem reports interfaces appearing and disappearing.
//! Configurators that defer work on missing interfaces implement
//! [`InterfaceLifecycleHandler`]; the [`LifecycleNotifier`] consumes the
//! event stream and calls every registered handler in registration order.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::{ChangeKind, RegistryEvent};

/// Error returned by lifecycle handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// An interface was created or destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceEvent {
    /// Interface name
    pub name: String,
    /// Engine interface index
    pub index: u32,
    /// True for creation, false for removal
    pub created: bool,
}

impl InterfaceEvent {
    /// Creates a "created" event.
    pub fn created(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            created: true,
        }
    }

    /// Creates a "deleted" event.
    pub fn deleted(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            created: false,
        }
    }

    /// Translates an interface registry event.
    ///
    /// Metadata updates do not change interface existence and yield `None`.
    pub fn from_registry_event<M>(event: &RegistryEvent<M>) -> Option<Self> {
        match event.kind {
            ChangeKind::Added => Some(Self::created(event.name.clone(), event.index)),
            ChangeKind::Deleted => Some(Self::deleted(event.name.clone(), event.index)),
            ChangeKind::Updated => None,
        }
    }
}

/// Consumer of interface lifecycle events.
///
/// # Thread Safety
///
/// Handlers are shared between the notifier task and northbound callers,
/// so implementations must be `Send + Sync` and synchronize internally.
#[async_trait]
pub trait InterfaceLifecycleHandler: Send + Sync {
    /// Returns the handler name (for logging).
    fn name(&self) -> &str;

    /// Called after `if_name` was created with engine index `if_index`.
    async fn resolve_created_interface(&self, if_name: &str, if_index: u32)
        -> Result<(), HandlerError>;

    /// Called after `if_name` was removed from the engine.
    async fn resolve_deleted_interface(&self, if_name: &str, if_index: u32)
        -> Result<(), HandlerError>;
}

/// Dispatches interface lifecycle events to registered handlers.
#[derive(Clone, Default)]
pub struct LifecycleNotifier {
    handlers: Vec<Arc<dyn InterfaceLifecycleHandler>>,
}

impl std::fmt::Debug for LifecycleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("LifecycleNotifier")
            .field("handlers", &names)
            .finish()
    }
}

impl LifecycleNotifier {
    /// Creates a notifier with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. Handlers are called in registration order.
    pub fn register(&mut self, handler: Arc<dyn InterfaceLifecycleHandler>) {
        debug!("LifecycleNotifier: registered handler {}", handler.name());
        self.handlers.push(handler);
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Delivers one event to every handler.
    ///
    /// A failing handler is logged and does not prevent delivery to the
    /// others. Returns the number of handlers that failed.
    pub async fn notify(&self, event: &InterfaceEvent) -> usize {
        let mut failures = 0;
        for handler in &self.handlers {
            let result = if event.created {
                handler
                    .resolve_created_interface(&event.name, event.index)
                    .await
            } else {
                handler
                    .resolve_deleted_interface(&event.name, event.index)
                    .await
            };
            if let Err(e) = result {
                failures += 1;
                warn!(
                    "LifecycleNotifier: handler {} failed for interface {} ({}): {}",
                    handler.name(),
                    event.name,
                    if event.created { "created" } else { "deleted" },
                    e
                );
            }
        }
        failures
    }

    /// Consumes `events` until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<InterfaceEvent>) {
        while let Some(event) = events.recv().await {
            self.notify(&event).await;
        }
        debug!("LifecycleNotifier: event source closed");
    }

    /// Spawns [`LifecycleNotifier::run`] on the current runtime.
    pub fn spawn(self, events: mpsc::Receiver<InterfaceEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Spawns a task consuming an interface registry watch feed directly.
    pub fn spawn_from_registry<M>(self, mut events: mpsc::Receiver<RegistryEvent<M>>) -> JoinHandle<()>
    where
        M: Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(event) = InterfaceEvent::from_registry_event(&event) {
                    self.notify(&event).await;
                }
            }
            debug!("LifecycleNotifier: registry feed closed");
        })
    }
}

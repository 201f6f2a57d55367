//! Dataplane agent: reconciles declarative ACL and L2 configuration with
//! the packet-processing engine.
//!
//! - [`acl`]: access lists, their engine ACLs and interface attachments
//! - [`l2`]: bridge domain, FIB and cross-connect indices
//! - [`config`]: agent settings
//!
//! [`watch_interfaces`] wires a configurator to the interface registry so
//! cached attachments are replayed when interfaces come and go.

pub mod acl;
pub mod config;
pub mod l2;

use std::sync::Arc;

use dpagent_idxmap::{InterfaceLifecycleHandler, LifecycleNotifier, Registry, RegistryError};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AgentConfig;

/// Subscribes `handlers` to interface additions and removals in
/// `interfaces` and dispatches them from a spawned task.
///
/// The task ends when the subscription named `subscriber` is removed with
/// [`Registry::unwatch`].
pub fn watch_interfaces<M>(
    config: &AgentConfig,
    interfaces: &Registry<M>,
    subscriber: &str,
    handlers: Vec<Arc<dyn InterfaceLifecycleHandler>>,
) -> Result<JoinHandle<()>, RegistryError>
where
    M: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.watch_channel_capacity);
    interfaces.watch(subscriber, tx)?;

    let mut notifier = LifecycleNotifier::new();
    for handler in handlers {
        notifier.register(handler);
    }
    info!(
        "dpagent: {} watching {} with {} handlers",
        subscriber,
        interfaces.title(),
        notifier.handler_count()
    );
    Ok(notifier.spawn_from_registry(rx))
}

//! Name-to-index bookkeeping shared by every dataplane configurator.
//!
//! This crate provides the in-memory state that configurators keep next to
//! the packet-processing engine:
//!
//! - [`Registry`]: Concurrency-safe name↔index map with typed metadata and
//!   a subscribable change feed
//! - [`DependencyCache`]: Attachments waiting for an interface to appear
//! - [`InterfaceIndex`]: Read-only view of the interface registry
//! - [`LifecycleNotifier`]: Dispatches interface created/deleted events to
//!   configurators
//!
//! # Architecture
//!
//! ```text
//! desired state ──> Configurator ──> engine RPC
//!                    │   ▲
//!         Registry <─┘   │ resolve_created/deleted_interface
//!                        │
//!   interface Registry ──watch──> LifecycleNotifier
//! ```
//!
//! Configurators hold a read-only [`InterfaceIndex`] and expose lifecycle
//! handlers; the interface registry never references configurators.

mod ifindex;
mod lifecycle;
mod pending;
mod registry;

pub use ifindex::InterfaceIndex;
pub use lifecycle::{HandlerError, InterfaceEvent, InterfaceLifecycleHandler, LifecycleNotifier};
pub use pending::{AttachRole, DependencyCache, PendingAttachment};
pub use registry::{ChangeKind, Registry, RegistryEntry, RegistryError, RegistryEvent};

//! L2 indices: bridge domains, static FIB entries and cross-connects.
//!
//! Each index is a typed [`Registry`](dpagent_idxmap::Registry) with
//! lookups the L2 configurators need, e.g. finding the bridge domain an
//! interface belongs to.

mod bd_index;
mod fib_index;
mod types;
mod xc_index;

pub use bd_index::{BdEvent, BdIndex};
pub use fib_index::{FibEvent, FibIndex};
pub use types::{BdInterface, BdMetadata, BridgeDomain, FibAction, FibEntry, XConnectPair};
pub use xc_index::{XcEvent, XcIndex};

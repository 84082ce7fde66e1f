//! Reactive primitives for Filament.
//!
//! A fine-grained reactive graph of writable signals, lazily recomputed
//! memos, and effects, with version-based invalidation: a write pushes a
//! cheap dirty walk downstream, and reads pull recomputation only through
//! the nodes whose inputs actually changed.

#![warn(missing_docs)]

mod effect;
mod flush;
mod maybe_dyn;
mod memo;
mod node;
mod runtime;
mod signal;
mod utils;

pub use effect::*;
pub use flush::*;
pub use maybe_dyn::*;
pub use memo::*;
pub use node::NodeHandle;
pub use runtime::{
    batch, create_child_scope, create_root, on_cleanup, untrack, use_current_scope,
    use_global_scope, RootHandle,
};
pub use signal::*;
pub use utils::*;

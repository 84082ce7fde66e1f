//! # Filament API Documentation
//!
//! Filament is a **reactive** state-management core: a dependency-tracking
//! signal graph, a slice composition layer over external stores, and async
//! resources bound into the graph.
//!
//! ## Feature Flags
//!
//! - `futures` (_default_) - Enables the async layer: resources, async flush
//!   strategies, and the `load` boundary helper.
//!
//! - `serde` - Enables serializing and deserializing `Signal`s using `serde`.
//!
//! - `trace` - Enables `tracing` instrumentation of the propagation paths.

#![warn(missing_docs)]
#![deny(missing_debug_implementations)]

/// Reactive primitives.
///
/// Re-export of the [`filament_reactive`] crate.
pub mod reactive {
    pub use filament_reactive::*;
}

/// Store adapters and slices.
///
/// Re-export of the [`filament_store`] crate.
pub mod store {
    pub use filament_store::*;
}

/// Utilities for working with async.
///
/// Re-export of the [`filament_futures`] crate.
#[cfg(feature = "futures")]
pub mod futures {
    pub use filament_futures::*;
}

/// The Filament prelude.
///
/// In most cases, it is idiomatic to use a glob import at the beginning of
/// your Rust source file.
///
/// ```rust
/// use filament::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "futures")]
    pub use filament_futures::{
        create_resource, create_resource_with, load, load_with, provide_executor_scope,
        spawn_local_scoped, LoadPhase, RefSpec, Resource, ResourceOptions, ResourceState,
    };
    pub use filament_reactive::{
        batch, create_child_scope, create_effect, create_effect_with, create_memo,
        create_memo_with, create_root, create_signal, create_signal_with, on, on_cleanup, untrack,
        EffectHandle, FlushStrategy, MaybeDyn, ReadSignal, RootHandle, Signal,
    };
    pub use filament_store::{
        compose, create_derived_slice, create_slice, select, select_with, Getter, Selectors,
        Setter, Slice, SliceMap, Store, StoreAdapter, Value,
    };
}

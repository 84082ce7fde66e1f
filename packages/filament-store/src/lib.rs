//! Store adapters and slice composition for Filament.
//!
//! A store is an external state container consumed through the
//! [`StoreAdapter`] contract. Slices are named two-phase projections over
//! it: a selector phase declares which top-level keys the slice reads, and a
//! body phase turns the resulting reactive getters (plus the store's setter)
//! into the slice's public tree of queries and actions. Slices are
//! derivations in the reactive graph, so their values participate in
//! batching and glitch-free evaluation like any other signal.

#![warn(missing_docs)]

mod adapter;
mod compose;
mod select;
mod slice;
mod value;

pub use adapter::{Setter, Store, StoreAdapter, StoreListener, Unsubscribe};
pub use compose::{compose, Composed, SliceMap};
pub use select::{select, select_with, SelectMarker};
pub use slice::{
    create_derived_slice, create_slice, DerivedSliceBody, Getter, Selectors, Slice, SliceBody,
};
pub use value::{Method, Value};

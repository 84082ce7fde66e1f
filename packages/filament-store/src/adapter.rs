//! The store adapter contract, consumed (not implemented) by slices.

use std::rc::Rc;

/// Tears down a subscription. Calling it more than once must be harmless for
/// adapters that hand the same function out twice; the one the crate creates
/// is only called once.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// A whole-store change listener, called with `(next, prev)` state.
pub type StoreListener<S> = Box<dyn Fn(&S, &S)>;

/// The contract an external state container has to satisfy for slices to be
/// defined over it.
///
/// The store's state is treated as one atomic value; slices introduce
/// per-key granularity above it. Implementations call their listeners
/// synchronously after every state change.
pub trait StoreAdapter: 'static {
    /// The full state value.
    type State: Clone + 'static;

    /// Returns the current state.
    fn get_state(&self) -> Self::State;

    /// Applies an updater to the state and notifies subscribers.
    fn set_state(&self, update: Box<dyn FnOnce(&mut Self::State)>);

    /// Subscribes to every state change. Returns an unsubscribe function.
    fn subscribe(&self, listener: StoreListener<Self::State>) -> Unsubscribe;

    /// Optional extension: subscribe to changes of the given top-level keys
    /// only. Returning `None` (the default) makes slices fall back to
    /// [`subscribe`](StoreAdapter::subscribe) and filter internally.
    fn subscribe_to_keys(
        &self,
        keys: &[&'static str],
        listener: Box<dyn Fn()>,
    ) -> Option<Unsubscribe> {
        let _ = (keys, listener);
        None
    }
}

/// A store: a shared handle over an adapter, from which slices are created.
pub struct Store<A: StoreAdapter> {
    adapter: Rc<A>,
}

impl<A: StoreAdapter> Store<A> {
    /// Wrap an adapter.
    pub fn new(adapter: A) -> Self {
        Self {
            adapter: Rc::new(adapter),
        }
    }

    /// The shared adapter handle.
    pub fn adapter(&self) -> Rc<A> {
        self.adapter.clone()
    }

    /// Read the full state.
    pub fn get(&self) -> A::State {
        self.adapter.get_state()
    }

    /// Apply an updater to the state.
    pub fn set(&self, update: impl FnOnce(&mut A::State) + 'static) {
        self.adapter.set_state(Box::new(update));
    }
}

impl<A: StoreAdapter> Clone for Store<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
        }
    }
}

/// The write half handed to slice bodies. Actions close over it; queries
/// never see one.
pub struct Setter<S: 'static> {
    set: Rc<dyn Fn(Box<dyn FnOnce(&mut S)>)>,
}

impl<S: 'static> Setter<S> {
    pub(crate) fn new<A: StoreAdapter<State = S>>(adapter: Rc<A>) -> Self {
        Self {
            set: Rc::new(move |update| adapter.set_state(update)),
        }
    }

    /// Apply an updater to the store's state.
    pub fn set(&self, update: impl FnOnce(&mut S) + 'static) {
        (self.set)(Box::new(update));
    }
}

impl<S: 'static> Clone for Setter<S> {
    fn clone(&self) -> Self {
        Self {
            set: self.set.clone(),
        }
    }
}

/// A minimal in-memory adapter used by the crate's tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    type Listener<S> = Rc<dyn Fn(&S, &S)>;

    pub struct MemoryStore<S: Clone + 'static> {
        state: RefCell<S>,
        listeners: Rc<RefCell<Vec<(u64, Listener<S>)>>>,
        next_id: Cell<u64>,
    }

    impl<S: Clone + 'static> MemoryStore<S> {
        pub fn new(state: S) -> Self {
            Self {
                state: RefCell::new(state),
                listeners: Rc::new(RefCell::new(Vec::new())),
                next_id: Cell::new(0),
            }
        }
    }

    impl<S: Clone + 'static> StoreAdapter for MemoryStore<S> {
        type State = S;

        fn get_state(&self) -> S {
            self.state.borrow().clone()
        }

        fn set_state(&self, update: Box<dyn FnOnce(&mut S)>) {
            let prev = self.state.borrow().clone();
            update(&mut self.state.borrow_mut());
            let next = self.state.borrow().clone();
            // Snapshot so a listener unsubscribing mid-round is safe.
            let listeners: Vec<_> = self.listeners.borrow().clone();
            for (_, listener) in listeners {
                listener(&next, &prev);
            }
        }

        fn subscribe(&self, listener: StoreListener<S>) -> Unsubscribe {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            self.listeners.borrow_mut().push((id, listener.into()));
            let listeners = self.listeners.clone();
            Box::new(move || {
                listeners.borrow_mut().retain(|(i, _)| *i != id);
            })
        }
    }
}

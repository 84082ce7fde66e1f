//! Reactive signals: the writable cells of the graph.

use std::any::Any;
use std::cell::{Ref, RefMut};
use std::fmt;
use std::fmt::Formatter;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{AddAssign, Deref, DivAssign, MulAssign, RemAssign, SubAssign};

use crate::create_effect;
use crate::memo::create_memo_with;
use crate::node::{NodeHandle, NodeId, NodeKind, ReactiveNode};
use crate::runtime::Runtime;

/// A read-only reactive value.
///
/// The underlying data is not immutable: it can be updated through the
/// corresponding [`Signal`] (which has write access) and the update shows up
/// in the `ReadSignal` as well. Memos are `ReadSignal`s with no writable
/// counterpart at all.
///
/// A `ReadSignal` is obtained by dereferencing a [`Signal`]; every [`Signal`]
/// is a `ReadSignal` with added write abilities.
///
/// # Example
/// ```
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let signal: Signal<i32> = create_signal(123);
/// let read_signal: ReadSignal<i32> = *signal;
/// assert_eq!(read_signal.get(), 123);
/// signal.set(456);
/// assert_eq!(read_signal.get(), 456);
/// # });
/// ```
pub struct ReadSignal<T: 'static> {
    pub(crate) id: NodeId,
    pub(crate) root: &'static Runtime,
    /// Keep track of where the signal was created for diagnostics.
    #[cfg(debug_assertions)]
    created_at: &'static std::panic::Location<'static>,
    _phantom: PhantomData<T>,
}

/// A reactive value that can be read and written to.
///
/// See [`create_signal`] for more information.
pub struct Signal<T: 'static>(pub(crate) ReadSignal<T>);

/// Create a new [`Signal`].
///
/// Signals are reactive atoms: pieces of state that can be read and written
/// and which automatically update anything depending on them.
///
/// Writing a value equal to the current one (per `PartialEq`) is a no-op: the
/// version does not advance and nothing downstream is notified. For types
/// without `PartialEq`, or for custom comparison semantics, use
/// [`create_signal_with`].
///
/// # Example
/// ```rust
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let signal = create_signal(1);
/// assert_eq!(signal.get(), 1);
/// signal.set(2);
/// assert_eq!(signal.get(), 2);
/// # });
/// ```
///
/// # Reactivity
/// Accessing a signal inside a tracking context (such as a
/// [`create_memo`](crate::create_memo) or [`create_effect`]) automatically
/// registers it as a dependency:
///
/// ```rust
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let signal = create_signal(1);
/// let double = create_memo(move || signal.get() * 2);
/// assert_eq!(double.get(), 2);
/// signal.set(2);
/// assert_eq!(double.get(), 4);
/// # });
/// ```
///
/// # Ownership
/// Signals are allocated on the current scope, which manages their memory.
/// What is returned is a `Copy` handle, so it can be moved into closures and
/// event handlers freely.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_signal<T: PartialEq + 'static>(value: T) -> Signal<T> {
    create_signal_with(value, PartialEq::eq)
}

/// Like [`create_signal`] but with an explicit comparator deciding whether a
/// written value equals the current one. `|_, _| false` makes every write
/// propagate.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_signal_with<T: 'static>(
    value: T,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> Signal<T> {
    let signal = create_node_signal(NodeKind::Cell);
    let mut node = signal.get_mut();
    node.value = Some(Box::new(value));
    node.version = 1;
    node.eq = Some(Box::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => eq(a, b),
            _ => false,
        }
    }));
    drop(node);
    signal
}

/// Create a [`Signal`] wrapper over a fresh, empty node of the given kind.
#[cfg_attr(debug_assertions, track_caller)]
pub(crate) fn create_node_signal<T>(kind: NodeKind) -> Signal<T> {
    let root = Runtime::global();
    let id = root.create_node(kind);
    Signal(ReadSignal {
        id,
        root,
        #[cfg(debug_assertions)]
        created_at: std::panic::Location::caller(),
        _phantom: PhantomData,
    })
}

impl<T> ReadSignal<T> {
    /// Get an immutable reference to the underlying node.
    #[cfg_attr(debug_assertions, track_caller)]
    pub(crate) fn get_ref(self) -> Ref<'static, ReactiveNode> {
        Ref::map(self.root.nodes.borrow(), |nodes| match nodes.get(self.id) {
            Some(node) => node,
            None => panic!("{}", self.get_disposed_panic_message()),
        })
    }

    /// Get a mutable reference to the underlying node.
    #[cfg_attr(debug_assertions, track_caller)]
    pub(crate) fn get_mut(self) -> RefMut<'static, ReactiveNode> {
        RefMut::map(self.root.nodes.borrow_mut(), |nodes| {
            match nodes.get_mut(self.id) {
                Some(node) => node,
                None => panic!("{}", self.get_disposed_panic_message()),
            }
        })
    }

    /// Returns `true` if the signal has not yet been disposed.
    pub fn is_alive(self) -> bool {
        self.root.nodes.borrow().get(self.id).is_some()
    }

    /// Disposes the signal, freeing the memory held on by it. Accessing a
    /// signal after it has been disposed causes a panic.
    pub fn dispose(self) {
        NodeHandle(self.id, self.root).dispose();
    }

    fn get_disposed_panic_message(self) -> String {
        #[cfg(not(debug_assertions))]
        return "signal was disposed".to_string();

        #[cfg(debug_assertions)]
        return format!("signal was disposed. Created at {}", self.created_at);
    }

    /// Get the value without tracking it. The type must implement [`Copy`];
    /// otherwise use [`ReadSignal::get_clone_untracked`] or
    /// [`ReadSignal::with_untracked`].
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get_untracked(self) -> T
    where
        T: Copy,
    {
        self.with_untracked(|value| *value)
    }

    /// Get the value without tracking it, cloning it in the process.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get_clone_untracked(self) -> T
    where
        T: Clone,
    {
        self.with_untracked(Clone::clone)
    }

    /// Get the value of the signal. The type must implement [`Copy`]; if not,
    /// use [`ReadSignal::get_clone`] or [`ReadSignal::with`] instead.
    ///
    /// When called inside a tracking context, the signal is automatically
    /// tracked.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get(self) -> T
    where
        T: Copy,
    {
        self.track();
        self.get_untracked()
    }

    /// Get the value of the signal, cloning it in the process.
    ///
    /// When called inside a tracking context, the signal is automatically
    /// tracked.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn get_clone(self) -> T
    where
        T: Clone,
    {
        self.track();
        self.get_clone_untracked()
    }

    /// Apply a function to the current value without tracking.
    ///
    /// For derived nodes this first brings the value up to date, so an
    /// untracked read still never observes a stale value.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn with_untracked<U>(self, f: impl FnOnce(&T) -> U) -> U {
        self.root.ensure_clean(self.id);
        let node = self.get_ref();
        let value = node.value.as_ref().expect("value is being updated");
        f(value.downcast_ref().expect("wrong signal type"))
    }

    /// Apply a function to the current value.
    ///
    /// When called inside a tracking context, the signal is automatically
    /// tracked.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn with<U>(self, f: impl FnOnce(&T) -> U) -> U {
        self.track();
        self.with_untracked(f)
    }

    /// Track the signal in the current tracking context. This is done
    /// automatically by [`ReadSignal::get`] and friends.
    ///
    /// The version recorded on the edge is the source's *clean* version, so a
    /// stale derived node is brought up to date before being observed.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn track(self) {
        if self.root.tracker.borrow().is_none() {
            return;
        }
        self.root.ensure_clean(self.id);
        let version = self.get_ref().version;
        self.root.record_access(self.id, version);
    }

    /// Attach a listener fired after every write that changed the value (at
    /// the end of the enclosing batch, at most once per flush). The listener
    /// does not fire for the current value.
    ///
    /// Returns an unsubscribe function. Unsubscribing is idempotent and safe
    /// to call from inside the listener.
    ///
    /// # Example
    /// ```
    /// # use filament_reactive::*;
    /// # let _ = create_root(|| {
    /// let state = create_signal(0);
    /// let seen = create_signal(-1);
    /// let unsubscribe = state.subscribe(move || seen.set(state.get_untracked()));
    /// state.set(1);
    /// assert_eq!(seen.get(), 1);
    /// unsubscribe();
    /// state.set(2);
    /// assert_eq!(seen.get(), 1);
    /// # });
    /// ```
    pub fn subscribe(self, mut f: impl FnMut() + 'static) -> impl Fn() {
        let mut first = true;
        let effect = create_effect(move || {
            self.track();
            if first {
                first = false;
            } else {
                // The listener itself is not a tracking context.
                crate::untrack(|| f());
            }
        });
        move || effect.dispose()
    }

    /// Create a memo projecting this signal through `f`.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn map<U: PartialEq + 'static>(self, mut f: impl FnMut(&T) -> U + 'static) -> ReadSignal<U> {
        create_memo_with(move || self.with(&mut f), PartialEq::eq)
    }
}

impl<T> Signal<T> {
    /// Set a new value and notify dependents, unless the comparator reports
    /// it equal to the current value, in which case nothing happens at all.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn set(self, new: T) {
        let changed = {
            let mut node = self.get_mut();
            let ReactiveNode { eq, value, version, .. } = &mut *node;
            let equal = match (&*eq, value.as_deref()) {
                (Some(eq), Some(old)) => eq(old, &new),
                _ => false,
            };
            if equal {
                false
            } else {
                *value = Some(Box::new(new));
                *version += 1;
                true
            }
        };
        if changed {
            self.0.root.propagate(self.0.id);
        }
    }

    /// Set a new value without notifying dependents. This easily leads to
    /// state inconsistencies and is generally not recommended.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn set_silent(self, new: T) {
        self.replace_silent(new);
    }

    /// Set a new value and return the previous one, notifying dependents if
    /// the two differ.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn replace(self, new: T) -> T {
        let (old, changed) = {
            let mut node = self.get_mut();
            let ReactiveNode { eq, value, version, .. } = &mut *node;
            let slot = value.as_mut().expect("value is being updated");
            let current: &mut T = slot.downcast_mut().expect("wrong signal type");
            let equal = match &*eq {
                Some(eq) => eq(&*current, &new),
                None => false,
            };
            let old = std::mem::replace(current, new);
            if !equal {
                *version += 1;
            }
            (old, !equal)
        };
        if changed {
            self.0.root.propagate(self.0.id);
        }
        old
    }

    /// Set a new value without notifying dependents, returning the previous
    /// value.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn replace_silent(self, new: T) -> T {
        self.update_silent(|val| std::mem::replace(val, new))
    }

    /// Replace the value with the default, returning the previous value.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn take(self) -> T
    where
        T: Default,
    {
        self.replace(T::default())
    }

    /// Like [`Signal::take`] but without notifying dependents.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn take_silent(self) -> T
    where
        T: Default,
    {
        self.replace_silent(T::default())
    }

    /// Mutate the value in place without notifying dependents.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn update_silent<U>(self, f: impl FnOnce(&mut T) -> U) -> U {
        let mut value = self.get_mut().value.take().expect("value is being updated");
        let ret = f(value.downcast_mut().expect("wrong signal type"));
        self.get_mut().value = Some(value);
        ret
    }

    /// Mutate the value in place and notify dependents. Since the mutation is
    /// opaque, dependents are always notified; use [`Signal::set`] to get the
    /// equal-value cut.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn update<U>(self, f: impl FnOnce(&mut T) -> U) -> U {
        let ret = self.update_silent(f);
        self.get_mut().version += 1;
        self.0.root.propagate(self.0.id);
        ret
    }

    /// Set the value from a function of the previous value.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn set_fn(self, f: impl FnOnce(&T) -> T) {
        let new = self.update_silent(|val| f(val));
        self.set(new);
    }

    /// Like [`Signal::set_fn`] but without notifying dependents.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn set_fn_silent(self, f: impl FnOnce(&T) -> T) {
        self.update_silent(move |val| *val = f(val));
    }

    /// Split the signal into a read half and a setter closure.
    pub fn split(self) -> (ReadSignal<T>, impl Fn(T) -> T) {
        (*self, move |value| self.replace(value))
    }
}

/// An alternative to [`create_signal`] that uses a reducer to compute the
/// next value from the previous one and a dispatched message.
///
/// # Example
/// ```
/// # use filament_reactive::*;
/// enum Msg {
///     Increment,
///     Decrement,
/// }
///
/// # let _ = create_root(|| {
/// let (state, dispatch) = create_reducer(0, |&state, msg: Msg| match msg {
///     Msg::Increment => state + 1,
///     Msg::Decrement => state - 1,
/// });
///
/// assert_eq!(state.get(), 0);
/// dispatch(Msg::Increment);
/// assert_eq!(state.get(), 1);
/// # });
/// ```
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_reducer<T: PartialEq, Msg>(
    initial: T,
    reduce: impl FnMut(&T, Msg) -> T,
) -> (ReadSignal<T>, impl Fn(Msg)) {
    let reduce = std::cell::RefCell::new(reduce);
    let signal = create_signal(initial);
    let dispatch = move |msg| {
        let new = signal.with_untracked(|value| reduce.borrow_mut()(value, msg));
        signal.set(new);
    };
    (*signal, dispatch)
}

/// We manually implement `Clone` + `Copy` so that we don't get extra bounds
/// on `T`.
impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ReadSignal<T> {}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Signal<T> {}

impl<T: Default + PartialEq> Default for ReadSignal<T> {
    fn default() -> Self {
        *create_signal(Default::default())
    }
}
impl<T: Default + PartialEq> Default for Signal<T> {
    fn default() -> Self {
        create_signal(Default::default())
    }
}

// Forward `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash` from the inner type.
impl<T: PartialEq> PartialEq for ReadSignal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.with(|value| other.with(|other| value == other))
    }
}
impl<T: Eq> Eq for ReadSignal<T> {}
impl<T: PartialOrd> PartialOrd for ReadSignal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.with(|value| other.with(|other| value.partial_cmp(other)))
    }
}
impl<T: Ord> Ord for ReadSignal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.with(|value| other.with(|other| value.cmp(other)))
    }
}
impl<T: Hash> Hash for ReadSignal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.with(|value| value.hash(state))
    }
}

impl<T: PartialEq> PartialEq for Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn eq(&self, other: &Self) -> bool {
        self.with(|value| other.with(|other| value == other))
    }
}
impl<T: Eq> Eq for Signal<T> {}
impl<T: PartialOrd> PartialOrd for Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.with(|value| other.with(|other| value.partial_cmp(other)))
    }
}
impl<T: Ord> Ord for Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.with(|value| other.with(|other| value.cmp(other)))
    }
}
impl<T: Hash> Hash for Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.with(|value| value.hash(state))
    }
}

impl<T> Deref for Signal<T> {
    type Target = ReadSignal<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadSignal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}
impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}

impl<T: fmt::Display> fmt::Display for ReadSignal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}
impl<T: fmt::Display> fmt::Display for Signal<T> {
    #[cfg_attr(debug_assertions, track_caller)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for ReadSignal<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with(|value| value.serialize(serializer))
    }
}
#[cfg(feature = "serde")]
impl<'de, T: serde::Deserialize<'de> + PartialEq> serde::Deserialize<'de> for ReadSignal<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(*create_signal(T::deserialize(deserializer)?))
    }
}
#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for Signal<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with(|value| value.serialize(serializer))
    }
}
#[cfg(feature = "serde")]
impl<'de, T: serde::Deserialize<'de> + PartialEq> serde::Deserialize<'de> for Signal<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(create_signal(T::deserialize(deserializer)?))
    }
}

impl<T: AddAssign<Rhs>, Rhs> AddAssign<Rhs> for Signal<T> {
    fn add_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this += rhs);
    }
}
impl<T: SubAssign<Rhs>, Rhs> SubAssign<Rhs> for Signal<T> {
    fn sub_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this -= rhs);
    }
}
impl<T: MulAssign<Rhs>, Rhs> MulAssign<Rhs> for Signal<T> {
    fn mul_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this *= rhs);
    }
}
impl<T: DivAssign<Rhs>, Rhs> DivAssign<Rhs> for Signal<T> {
    fn div_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this /= rhs);
    }
}
impl<T: RemAssign<Rhs>, Rhs> RemAssign<Rhs> for Signal<T> {
    fn rem_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this %= rhs);
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            assert_eq!(state.get(), 0);

            state.set(1);
            assert_eq!(state.get(), 1);

            state.set_fn(|n| *n + 1);
            assert_eq!(state.get(), 2);
        });
    }

    #[test]
    fn signal_composition() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = || state.get() * 2;

            assert_eq!(double(), 0);
            state.set(1);
            assert_eq!(double(), 2);
        });
    }

    #[test]
    fn set_silent_signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = state.map(|&x| x * 2);

            assert_eq!(double.get(), 0);
            state.set_silent(1);
            assert_eq!(double.get(), 0); // double value is unchanged.

            state.set_fn_silent(|n| n + 1);
            assert_eq!(double.get(), 0); // double value is unchanged.
        });
    }

    #[test]
    fn same_value_write_is_noop() {
        let _ = create_root(|| {
            let state = create_signal(7);
            let runs = create_signal(0);
            create_effect(move || {
                state.track();
                runs.set(runs.get_untracked() + 1);
            });
            assert_eq!(runs.get(), 1);

            state.set(7);
            state.set(7);
            assert_eq!(runs.get(), 1); // no version bump, no effect run

            state.set(8);
            assert_eq!(runs.get(), 2);
        });
    }

    #[test]
    fn version_monotonic_and_coupled_to_value() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let version_of = move || state.get_ref().version;

            let v1 = version_of();
            state.set(0); // equal write
            let v2 = version_of();
            assert_eq!(v1, v2);

            state.set(1);
            let v3 = version_of();
            assert!(v3 > v2);

            state.set(2);
            assert!(version_of() > v3);
        });
    }

    #[test]
    fn signal_with_custom_comparator() {
        let _ = create_root(|| {
            // Compare only the first tuple field.
            let state = create_signal_with((1, 1), |a: &(i32, i32), b: &(i32, i32)| a.0 == b.0);
            let runs = create_signal(0);
            create_effect(move || {
                state.track();
                runs.set(runs.get_untracked() + 1);
            });
            assert_eq!(runs.get(), 1);

            state.set((1, 99)); // equal per comparator
            assert_eq!(runs.get(), 1);

            state.set((2, 99));
            assert_eq!(runs.get(), 2);
        });
    }

    #[test]
    fn read_signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let readonly: ReadSignal<i32> = *state;

            assert_eq!(readonly.get(), 0);
            state.set(1);
            assert_eq!(readonly.get(), 1);
        });
    }

    #[test]
    fn map_signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = state.map(|&x| x * 2);

            assert_eq!(double.get(), 0);
            state.set(1);
            assert_eq!(double.get(), 2);
        });
    }

    #[test]
    fn take_signal() {
        let _ = create_root(|| {
            let state = create_signal(123);

            let x = state.take();
            assert_eq!(x, 123);
            assert_eq!(state.get(), 0);
        });
    }

    #[test]
    fn take_silent_signal() {
        let _ = create_root(|| {
            let state = create_signal(123);
            let double = state.map(|&x| x * 2);

            assert_eq!(double.get(), 246);

            // Do not trigger subscribers.
            state.take_silent();
            assert_eq!(state.get(), 0);
            assert_eq!(double.get(), 246);
        });
    }

    #[test]
    fn signal_split() {
        let _ = create_root(|| {
            let (state, set_state) = create_signal(0).split();
            assert_eq!(state.get(), 0);

            set_state(1);
            assert_eq!(state.get(), 1);
        });
    }

    #[test]
    fn signal_display() {
        let _ = create_root(|| {
            let signal = create_signal(0);
            assert_eq!(format!("{signal}"), "0");
            let read_signal: ReadSignal<_> = *signal;
            assert_eq!(format!("{read_signal}"), "0");
            let memo = create_memo(|| 0);
            assert_eq!(format!("{memo}"), "0");
        });
    }

    #[test]
    fn signal_debug() {
        let _ = create_root(|| {
            let signal = create_signal(0);
            assert_eq!(format!("{signal:?}"), "0");
        });
    }

    #[test]
    fn signal_add_assign_update() {
        let _ = create_root(|| {
            let mut signal = create_signal(0);
            let counter = create_signal(0);
            create_effect(move || {
                signal.track();
                counter.set(counter.get_untracked() + 1);
            });
            signal += 1;
            signal -= 1;
            signal *= 1;
            signal /= 1;
            // `update` always notifies, even for a value that round-trips.
            assert_eq!(counter.get(), 5);
        });
    }

    #[test]
    fn signal_update() {
        let _ = create_root(|| {
            let signal = create_signal("Hello ".to_string());
            let counter = create_signal(0);
            create_effect(move || {
                signal.track();
                counter.set(counter.get_untracked() + 1);
            });
            signal.update(|value| value.push_str("World!"));
            assert_eq!(signal.get_clone(), "Hello World!");
            assert_eq!(counter.get(), 2);
        });
    }

    #[test]
    fn subscribe_fires_on_change_only() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let log = create_signal(Vec::new());
            let _unsub = state.subscribe(move || {
                log.update(|l| l.push(state.get_untracked()));
            });
            // No initial firing.
            assert_eq!(log.with(Vec::len), 0);

            state.set(1);
            state.set(1); // same value: no firing
            state.set(2);
            assert_eq!(log.get_clone(), vec![1, 2]);
        });
    }

    #[test]
    fn subscribe_coalesces_in_batch() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let fired = create_signal(0);
            let _unsub = state.subscribe(move || fired.set(fired.get_untracked() + 1));

            batch(|| {
                state.set(1);
                state.set(2);
                state.set(3);
            });
            assert_eq!(fired.get(), 1);
            assert_eq!(state.get(), 3);
        });
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let fired = create_signal(0);
            let unsub = state.subscribe(move || fired.set(fired.get_untracked() + 1));

            state.set(1);
            assert_eq!(fired.get(), 1);

            unsub();
            unsub();
            state.set(2);
            assert_eq!(fired.get(), 1);
        });
    }

    #[test]
    fn unsubscribe_from_inside_listener() {
        let _ = create_root(|| {
            use std::cell::RefCell;
            use std::rc::Rc;

            let state = create_signal(0);
            let fired = create_signal(0);
            let unsub_slot: Rc<RefCell<Option<Box<dyn Fn()>>>> = Rc::new(RefCell::new(None));
            let slot = unsub_slot.clone();
            let unsub = state.subscribe(move || {
                fired.set(fired.get_untracked() + 1);
                if let Some(unsub) = slot.borrow_mut().take() {
                    unsub();
                }
            });
            *unsub_slot.borrow_mut() = Some(Box::new(unsub));

            state.set(1); // fires, then unsubscribes itself
            state.set(2); // no longer subscribed
            assert_eq!(fired.get(), 1);
        });
    }

    #[test]
    fn reducer() {
        let _ = create_root(|| {
            enum Msg {
                Increment,
                Decrement,
            }

            let (state, dispatch) = create_reducer(0, |state, msg: Msg| match msg {
                Msg::Increment => *state + 1,
                Msg::Decrement => *state - 1,
            });

            assert_eq!(state.get(), 0);
            dispatch(Msg::Increment);
            assert_eq!(state.get(), 1);
            dispatch(Msg::Decrement);
            assert_eq!(state.get(), 0);
            dispatch(Msg::Increment);
            dispatch(Msg::Increment);
            assert_eq!(state.get(), 2);
        });
    }

    #[test]
    #[should_panic(expected = "signal was disposed")]
    fn read_after_dispose_panics() {
        let _ = create_root(|| {
            let state = create_signal(0);
            state.dispose();
            let _ = state.get();
        });
    }
}

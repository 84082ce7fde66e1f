//! Slices: named two-phase projections over a store.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use filament_reactive::{create_memo, create_signal, on_cleanup, ReadSignal, Signal};

use crate::adapter::{Setter, Store, StoreAdapter};
use crate::select::resolve_tree;
use crate::value::Value;

type ChangeDetector<S> = Box<dyn Fn(&S, &S) -> bool>;

struct Recorded<S> {
    keys: Vec<&'static str>,
    detectors: Vec<ChangeDetector<S>>,
}

impl<S> Default for Recorded<S> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            detectors: Vec::new(),
        }
    }
}

/// The selector-phase handle: declares which top-level keys of the store a
/// slice reads and hands back reactive getters for them.
pub struct Selectors<A: StoreAdapter> {
    adapter: Rc<A>,
    trigger: ReadSignal<u64>,
    recorded: Rc<RefCell<Recorded<A::State>>>,
}

impl<A: StoreAdapter> Selectors<A> {
    /// Declare a dependency on the top-level key `key`, extracted from the
    /// state by `extract`, and return a reactive getter for it.
    ///
    /// Reading the getter inside a tracking context subscribes the consumer
    /// to changes of this key.
    pub fn field<T: PartialEq + 'static>(
        &self,
        key: &'static str,
        extract: impl Fn(&A::State) -> T + 'static,
    ) -> Getter<T> {
        let extract = Rc::new(extract);
        {
            let mut recorded = self.recorded.borrow_mut();
            if !recorded.keys.contains(&key) {
                recorded.keys.push(key);
            }
            let extract = extract.clone();
            recorded
                .detectors
                .push(Box::new(move |prev, next| extract(prev) != extract(next)));
        }
        let adapter = self.adapter.clone();
        let trigger = self.trigger;
        Getter {
            read: Rc::new(move || {
                trigger.track();
                extract(&adapter.get_state())
            }),
        }
    }
}

/// A reactive getter for one declared store key.
pub struct Getter<T: 'static> {
    read: Rc<dyn Fn() -> T>,
}

impl<T> Getter<T> {
    /// Read the current value of the key, tracking it in the current
    /// tracking context.
    pub fn get(&self) -> T {
        (self.read)()
    }
}

impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
        }
    }
}

/// The body phase of a writable slice: turns the selected getters and the
/// store's setter into the slice's public tree of methods.
///
/// Implemented for plain closures `Fn(&G, &Setter<S>) -> Value`;
/// [`compose`](crate::compose) builds implementations that also receive other
/// slices by name and declare their dependency keys.
pub trait SliceBody<G, S: 'static>: 'static {
    /// Additional dependency keys declared by the body, beyond the ones the
    /// selector phase recorded.
    fn dep_keys(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Produce the slice's value tree.
    fn run(&self, getters: &G, set: &Setter<S>) -> Value;
}

impl<G, S: 'static, F> SliceBody<G, S> for F
where
    F: Fn(&G, &Setter<S>) -> Value + 'static,
{
    fn run(&self, getters: &G, set: &Setter<S>) -> Value {
        self(getters, set)
    }
}

/// The body phase of a read-only slice: no setter, so mutation is
/// unrepresentable.
pub trait DerivedSliceBody<G>: 'static {
    /// Additional dependency keys declared by the body.
    fn dep_keys(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Produce the slice's value tree.
    fn run(&self, getters: &G) -> Value;
}

impl<G, F> DerivedSliceBody<G> for F
where
    F: Fn(&G) -> Value + 'static,
{
    fn run(&self, getters: &G) -> Value {
        self(getters)
    }
}

/// A named projection over a store.
///
/// A slice's value is a derivation over its body: reading it re-runs the body
/// only when a declared store key (or a composed slice) actually changed.
/// Select markers in the tree resolve on [`read`](Slice::read).
#[derive(Clone)]
pub struct Slice {
    keys: Rc<[&'static str]>,
    value: ReadSignal<Value>,
    read_only: bool,
}

impl Slice {
    /// The slice's declared dependency keys, in declaration order.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    /// Whether the slice was created without a setter.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The raw value signal, markers unresolved.
    pub fn value_signal(&self) -> ReadSignal<Value> {
        self.value
    }

    /// Read the slice's tree with every select marker resolved.
    pub fn read(&self) -> Value {
        resolve_tree(&self.value.get_clone())
    }

    /// Look up a member of the resolved tree.
    pub fn try_get(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    /// Look up a member of the resolved tree.
    ///
    /// # Panics
    /// Panics if the slice has no member with that name.
    #[track_caller]
    pub fn get(&self, name: &str) -> Value {
        self.try_get(name)
            .unwrap_or_else(|| panic!("slice has no member named `{name}`"))
    }

    /// Invoke a method member by name.
    ///
    /// # Panics
    /// Panics if there is no such member or it is not callable.
    #[track_caller]
    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        self.get(name).call(args)
    }

    /// Attach a listener fired whenever any of the slice's dependencies
    /// changes its value. Returns an unsubscribe function.
    pub fn subscribe(&self, f: impl FnMut() + 'static) -> impl Fn() {
        self.value.subscribe(f)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("keys", &self.keys)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Create a slice over `store`.
///
/// The selector phase runs once, at construction: every
/// [`field`](Selectors::field) access declares a dependency key and yields a
/// reactive getter. The body phase receives the getters and the store's
/// [`Setter`] and returns the slice's public tree (queries, actions, data,
/// select markers). The body re-runs, as a derivation, when a declared key
/// changes.
///
/// A panicking adapter `subscribe` propagates to this call.
///
/// # Example
/// ```ignore
/// let counter = create_slice(
///     &store,
///     |selectors| selectors.field("count", |s: &AppState| s.count),
///     |count: &Getter<i64>, set: &Setter<AppState>| {
///         let set = set.clone();
///         Value::map([
///             ("value", Value::Int(count.get())),
///             ("increment", Value::action(move || set.set(|s| s.count += 1))),
///         ])
///     },
/// );
/// ```
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_slice<A, Sel, G, B>(store: &Store<A>, selector: Sel, body: B) -> Slice
where
    A: StoreAdapter,
    Sel: FnOnce(&Selectors<A>) -> G,
    G: 'static,
    B: SliceBody<G, A::State>,
{
    let setter = Setter::new(store.adapter());
    let extra_keys = body.dep_keys();
    let body = Rc::new(body);
    build_slice(
        store,
        selector,
        extra_keys,
        Rc::new(move |getters: &G| body.run(getters, &setter)),
        false,
    )
}

/// Create a read-only slice: the body receives no setter, so its members can
/// only be queries.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_derived_slice<A, Sel, G, B>(store: &Store<A>, selector: Sel, body: B) -> Slice
where
    A: StoreAdapter,
    Sel: FnOnce(&Selectors<A>) -> G,
    G: 'static,
    B: DerivedSliceBody<G>,
{
    let extra_keys = body.dep_keys();
    let body = Rc::new(body);
    build_slice(
        store,
        selector,
        extra_keys,
        Rc::new(move |getters: &G| body.run(getters)),
        true,
    )
}

fn build_slice<A, Sel, G>(
    store: &Store<A>,
    selector: Sel,
    extra_keys: Vec<&'static str>,
    body: Rc<dyn Fn(&G) -> Value>,
    read_only: bool,
) -> Slice
where
    A: StoreAdapter,
    Sel: FnOnce(&Selectors<A>) -> G,
    G: 'static,
{
    let adapter = store.adapter();
    let trigger: Signal<u64> = create_signal(0);
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let selectors = Selectors {
        adapter: adapter.clone(),
        trigger: *trigger,
        recorded: recorded.clone(),
    };
    let getters = Rc::new(selector(&selectors));

    let Recorded { mut keys, detectors } = recorded.take();
    for key in extra_keys {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    let keys: Rc<[&'static str]> = keys.into();

    #[cfg(feature = "trace")]
    tracing::trace!("slice keys: {:?}", keys);

    let fine = adapter.subscribe_to_keys(
        &keys,
        Box::new(move || trigger.set_fn(|v| v.wrapping_add(1))),
    );
    let unsubscribe = match fine {
        Some(unsubscribe) => unsubscribe,
        None => {
            // Whole-store fallback: filter with the per-key change detectors
            // recorded in the selector phase.
            adapter.subscribe(Box::new(move |next, prev| {
                if detectors.iter().any(|changed| changed(prev, next)) {
                    trigger.set_fn(|v| v.wrapping_add(1));
                }
            }))
        }
    };
    on_cleanup(move || unsubscribe());

    let value = create_memo(move || body(&getters));
    Slice {
        keys,
        value,
        read_only,
    }
}

//! The reactive runtime: node arena, dependency tracking, invalidation.
//!
//! Invalidation is push–pull. A cell write pushes a cheap depth-first walk
//! that marks downstream nodes dirty and enqueues effects; no recomputation
//! happens during the push. Reads pull: a dirty derived node first makes its
//! dependencies clean, then compares edge versions, and only recomputes when
//! an input actually changed. An unchanged recompute keeps its version, which
//! stops the walk from reaching anything further downstream.

use std::cell::{Cell, RefCell};
use std::mem;

use slotmap::{Key, SlotMap};
use smallvec::SmallVec;

use crate::node::{ComputeFn, Edge, NodeHandle, NodeId, NodeKind, ReactiveNode};

/// The struct managing the state of one reactive graph. Only one should be
/// created per running app, although independent graphs are supported: each
/// owns its tracking state and [`RootHandle::run_in`] switches between them.
///
/// The `Runtime` is leaked to obtain a `&'static Runtime`, but it is also
/// `dispose`-able: disposing releases every node allocated in it, so nothing
/// but the struct itself outlives the [`RootHandle`].
pub(crate) struct Runtime {
    /// All the nodes created in this runtime.
    pub nodes: RefCell<SlotMap<NodeId, ReactiveNode>>,
    /// If this is `Some`, we are tracking reads into it.
    pub tracker: RefCell<Option<DependencyTracker>>,
    /// The node that owns everything currently being created, or the null
    /// key at the top level.
    pub current_owner: Cell<NodeId>,
    /// The root scope node of the graph.
    pub root_node: Cell<NodeId>,
    /// Nesting depth of `batch` calls. Effects flush at depth zero.
    pub batch_depth: Cell<u32>,
    /// Effects awaiting a run, in first-enqueue order.
    pub effect_queue: RefCell<Vec<NodeId>>,
    /// Set while the effect queue is draining, to keep re-entrant writes
    /// from starting a nested drain.
    pub flushing: Cell<bool>,
    /// Generation counter for duplicate suppression in the dirty walk.
    pub visit_gen: Cell<u64>,
}

thread_local! {
    /// The current reactive runtime.
    static GLOBAL_RUNTIME: Cell<Option<&'static Runtime>> = const { Cell::new(None) };
}

impl Runtime {
    /// Get the current runtime. Panics if no root has been created.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn global() -> &'static Runtime {
        Self::try_global().expect("no reactive root found")
    }

    /// Get the current runtime, or `None` outside a reactive root.
    pub fn try_global() -> Option<&'static Runtime> {
        GLOBAL_RUNTIME.with(|rt| rt.get())
    }

    /// Set the current runtime, returning the previous one.
    pub fn set_global(rt: Option<&'static Runtime>) -> Option<&'static Runtime> {
        GLOBAL_RUNTIME.with(|cell| cell.replace(rt))
    }

    /// Create a new leaked runtime with a fresh root scope node.
    pub fn new_static() -> &'static Self {
        let this = Self {
            nodes: RefCell::new(SlotMap::default()),
            tracker: RefCell::new(None),
            current_owner: Cell::new(NodeId::null()),
            root_node: Cell::new(NodeId::null()),
            batch_depth: Cell::new(0),
            effect_queue: RefCell::new(Vec::new()),
            flushing: Cell::new(false),
            visit_gen: Cell::new(0),
        };
        let leaked = Box::leak(Box::new(this));

        #[cfg(not(target_arch = "wasm32"))]
        {
            /// An unsafe wrapper around a raw pointer which we promise to
            /// never touch, effectively making it thread-safe.
            #[allow(dead_code)]
            struct UnsafeSendPtr<T>(*const T);
            unsafe impl<T> Send for UnsafeSendPtr<T> {}

            /// Keeps holding the allocated `Runtime`s so that Miri and
            /// Valgrind do not report them as leaked.
            static KEEP_ALIVE: std::sync::Mutex<Vec<UnsafeSendPtr<Runtime>>> =
                std::sync::Mutex::new(Vec::new());
            KEEP_ALIVE
                .lock()
                .unwrap()
                .push(UnsafeSendPtr(leaked as *const Runtime));
        }

        leaked.reinit();
        leaked
    }

    /// Dispose everything held by this runtime and reset it to a fresh state.
    pub fn reinit(&'static self) {
        NodeHandle(self.root_node.get(), self).dispose();

        let _ = self.tracker.take();
        let _ = self.effect_queue.take();
        let _ = self.nodes.take();
        self.current_owner.set(NodeId::null());
        self.batch_depth.set(0);
        self.flushing.set(false);

        let root = self
            .nodes
            .borrow_mut()
            .insert(ReactiveNode::new(NodeKind::Cell, NodeId::null()));
        self.root_node.set(root);
    }

    /// Insert a new node owned by the current owner.
    pub fn create_node(&'static self, kind: NodeKind) -> NodeId {
        let parent = self.current_owner.get();
        let id = self
            .nodes
            .borrow_mut()
            .insert(ReactiveNode::new(kind, parent));
        if !parent.is_null() {
            if let Some(owner) = self.nodes.borrow_mut().get_mut(parent) {
                owner.children.push(id);
            }
        }
        id
    }

    /// Record a read of `id` (observed at `version`) into the active tracker,
    /// if any.
    pub fn record_access(&self, id: NodeId, version: u64) {
        if let Some(tracker) = self.tracker.borrow_mut().as_mut() {
            tracker.record(id, version);
        }
    }

    /// Make a derived node clean: recompute it if one of its inputs actually
    /// changed since it was last observed, or clear a false-alarm dirty mark.
    ///
    /// Panics if the node is currently computing, since that means its value
    /// was read from inside its own update.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn ensure_clean(&'static self, id: NodeId) {
        let (kind, computing, version, dirty) = {
            let nodes = self.nodes.borrow();
            match nodes.get(id) {
                Some(node) => (node.kind, node.computing, node.version, node.dirty),
                None => return,
            }
        };
        if kind != NodeKind::Derived {
            return;
        }
        if computing {
            panic!("cycle detected: derived value read during its own update");
        }
        if version == 0 {
            // Never computed; the first read materializes the value.
            self.recompute(id);
            return;
        }
        if !dirty {
            return;
        }
        if self.needs_update(id) {
            self.recompute(id);
        } else if let Some(node) = self.nodes.borrow_mut().get_mut(id) {
            // Every input recomputed to an equal value upstream.
            node.dirty = false;
        }
    }

    /// Whether any dependency of `id` changed since `id` last observed it.
    /// Pulls dependencies clean first, short-circuiting on the first
    /// mismatch. Disposed dependencies count as unchanged.
    fn needs_update(&'static self, id: NodeId) -> bool {
        let dependencies = match self.nodes.borrow().get(id) {
            Some(node) => node.dependencies.clone(),
            None => return false,
        };
        for edge in dependencies {
            self.ensure_clean(edge.source);
            let current = match self.nodes.borrow().get(edge.source) {
                Some(source) => source.version,
                None => continue,
            };
            if current != edge.seen_version {
                return true;
            }
        }
        false
    }

    /// Run the node's compute callback, re-linking the dependencies observed
    /// during the run and bumping the version if the value changed.
    #[cfg_attr(
        feature = "trace",
        tracing::instrument(level = "trace", skip(self), fields(id = ?id))
    )]
    pub(crate) fn recompute(&'static self, id: NodeId) {
        let (compute, value) = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(node) = nodes.get_mut(id) else { return };
            let Some(compute) = node.compute.take() else {
                return;
            };
            node.computing = true;
            // Cleared up front so a write from inside the run re-dirties the
            // node and schedules another round.
            node.dirty = false;
            (compute, node.value.take())
        };

        // Anything created during the previous run is owned by this node and
        // gets torn down before the new run, cleanups first.
        NodeHandle(id, self).dispose_children();

        let mut guard = UpdateGuard {
            rt: self,
            id,
            compute: Some(compute),
            value,
            prev_owner: self.current_owner.replace(id),
            prev_tracker: self.tracker.replace(Some(DependencyTracker::default())),
        };
        let changed = (guard.compute.as_mut().unwrap())(&mut guard.value);
        let tracker = self
            .tracker
            .replace(None)
            .expect("tracker is taken only by the update that installed it");
        // Restores owner and outer tracker, puts the callback and value back,
        // and clears the computing flag. On unwind this also runs, leaving
        // the node subscribed with the edges of its last completed run.
        drop(guard);

        tracker.link(self, id);
        if changed {
            if let Some(node) = self.nodes.borrow_mut().get_mut(id) {
                node.version += 1;
            }
        }
    }

    /// Push phase: after `start`'s version was bumped, walk its dependents
    /// depth-first, marking derived nodes dirty transitively and enqueueing
    /// effects. Nothing recomputes here. Flushes unless batching or already
    /// inside a flush.
    #[cfg_attr(
        feature = "trace",
        tracing::instrument(level = "trace", skip(self), fields(id = ?start))
    )]
    pub fn propagate(&'static self, start: NodeId) {
        self.mark_dependents(start);
        if self.batch_depth.get() == 0 && !self.flushing.get() {
            let prev = Runtime::set_global(Some(self));
            self.flush_effects();
            Runtime::set_global(prev);
        }
    }

    fn mark_dependents(&self, start: NodeId) {
        let generation = self.visit_gen.get().wrapping_add(1);
        self.visit_gen.set(generation);

        let mut nodes = self.nodes.borrow_mut();
        let mut queue = self.effect_queue.borrow_mut();
        let mut stack: SmallVec<[NodeId; 16]> = match nodes.get(start) {
            Some(node) => node.dependents.iter().rev().copied().collect(),
            None => return,
        };
        while let Some(id) = stack.pop() {
            let Some(node) = nodes.get_mut(id) else { continue };
            if node.visited == generation {
                continue;
            }
            node.visited = generation;
            node.dirty = true;
            match node.kind {
                NodeKind::Effect => {
                    if !node.queued {
                        node.queued = true;
                        queue.push(id);
                    }
                }
                _ => {
                    stack.extend(node.dependents.iter().rev().copied());
                }
            }
        }
        #[cfg(feature = "trace")]
        tracing::trace!("pending effects: {}", queue.len());
    }

    /// Drain the pending-effect queue in first-enqueue order. Each effect
    /// re-verifies its staleness before its runner is invoked, so an
    /// equal-value recompute upstream suppresses the run entirely.
    pub fn flush_effects(&'static self) {
        if self.flushing.get() {
            return;
        }
        self.flushing.set(true);
        let guard = FlushGuard(self);

        let mut index = 0;
        loop {
            let next = self.effect_queue.borrow().get(index).copied();
            let Some(id) = next else { break };
            index += 1;
            let runner = {
                let mut nodes = self.nodes.borrow_mut();
                match nodes.get_mut(id) {
                    Some(node) => {
                        node.queued = false;
                        node.dirty.then(|| node.runner.clone()).flatten()
                    }
                    None => None,
                }
            };
            if let Some(runner) = runner {
                runner();
            }
        }
        drop(guard);
    }

    /// Entry point for flush-strategy runners. Re-checks that the effect is
    /// still alive and actually stale, which makes coalesced and late
    /// (asynchronous) runs safe.
    pub(crate) fn run_scheduled_effect(&'static self, id: NodeId) {
        let prev = Runtime::set_global(Some(self));
        let stale = {
            let nodes = self.nodes.borrow();
            matches!(
                nodes.get(id),
                Some(node) if node.dirty && !node.computing
            )
        };
        if stale {
            if self.needs_update(id) {
                self.recompute(id);
            } else if let Some(node) = self.nodes.borrow_mut().get_mut(id) {
                node.dirty = false;
            }
        }
        Runtime::set_global(prev);
    }
}

/// Restores the runtime's bookkeeping when a compute run ends, normally or by
/// unwinding.
struct UpdateGuard {
    rt: &'static Runtime,
    id: NodeId,
    compute: Option<ComputeFn>,
    value: Option<Box<dyn std::any::Any>>,
    prev_owner: NodeId,
    prev_tracker: Option<DependencyTracker>,
}

impl Drop for UpdateGuard {
    fn drop(&mut self) {
        self.rt.current_owner.set(self.prev_owner);
        self.rt.tracker.replace(self.prev_tracker.take());
        if let Some(node) = self.rt.nodes.borrow_mut().get_mut(self.id) {
            node.compute = self.compute.take();
            node.value = self.value.take();
            node.computing = false;
        }
    }
}

/// Clears the effect queue and the flushing flag when a drain ends. On
/// unwind, queued flags are reset so the next invalidation can re-enqueue.
struct FlushGuard(&'static Runtime);

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let queue = mem::take(&mut *self.0.effect_queue.borrow_mut());
        let mut nodes = self.0.nodes.borrow_mut();
        for id in queue {
            if let Some(node) = nodes.get_mut(id) {
                node.queued = false;
            }
        }
        self.0.flushing.set(false);
    }
}

/// Tracks the nodes read during one compute run.
#[derive(Default)]
pub(crate) struct DependencyTracker {
    /// Edges in first-read order. Repeat reads refresh the observed version
    /// instead of adding a duplicate.
    pub dependencies: SmallVec<[Edge; 4]>,
}

impl DependencyTracker {
    pub fn record(&mut self, source: NodeId, version: u64) {
        if let Some(edge) = self.dependencies.iter_mut().find(|e| e.source == source) {
            edge.seen_version = version;
        } else {
            self.dependencies.push(Edge {
                source,
                seen_version: version,
            });
        }
    }

    /// Swap the dependent's edge set for the freshly tracked one, updating
    /// `dependents` lists only where membership actually changed so stable
    /// dependency sets reuse their edges.
    pub fn link(self, rt: &Runtime, dependent: NodeId) {
        let mut nodes = rt.nodes.borrow_mut();
        if nodes.get(dependent).is_none() {
            // Disposed during its own run.
            return;
        }
        let old = mem::take(&mut nodes[dependent].dependencies);
        for edge in &old {
            if self.dependencies.iter().any(|e| e.source == edge.source) {
                continue;
            }
            if let Some(source) = nodes.get_mut(edge.source) {
                source.dependents.retain(|&d| d != dependent);
            }
        }
        for edge in &self.dependencies {
            if old.iter().any(|e| e.source == edge.source) {
                continue;
            }
            if let Some(source) = nodes.get_mut(edge.source) {
                source.dependents.push(dependent);
            }
        }
        nodes[dependent].dependencies = self.dependencies;
    }
}

/// A handle to a reactive root. Disposing it releases every node created in
/// the root.
///
/// This is obtained from [`create_root`].
#[derive(Clone, Copy)]
pub struct RootHandle {
    rt: &'static Runtime,
}

impl RootHandle {
    /// Destroy everything that was created in this root.
    pub fn dispose(&self) {
        self.rt.reinit();
    }

    /// Run the closure with this root as the current runtime, owned by the
    /// root scope. This is how a graph is re-entered from outside, e.g. from
    /// a spawned task.
    pub fn run_in<T>(&self, f: impl FnOnce() -> T) -> T {
        let prev = Runtime::set_global(Some(self.rt));
        let prev_owner = self.rt.current_owner.replace(self.rt.root_node.get());
        let ret = f();
        self.rt.current_owner.set(prev_owner);
        Runtime::set_global(prev);
        ret
    }
}

impl std::fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RootHandle")
    }
}

/// Creates a new reactive root. Everything reactive happens inside one.
///
/// The returned [`RootHandle`] can be used to [`dispose`](RootHandle::dispose)
/// the root or to re-enter it later with [`run_in`](RootHandle::run_in).
///
/// # Example
/// ```rust
/// # use filament_reactive::*;
/// let root = create_root(|| {
///     let signal = create_signal(123);
///     assert_eq!(signal.get(), 123);
/// });
/// root.dispose();
/// ```
#[must_use = "root should be disposed"]
pub fn create_root(f: impl FnOnce()) -> RootHandle {
    let rt = Runtime::new_static();
    let handle = RootHandle { rt };
    handle.run_in(f);
    handle
}

/// Create a child scope: a node owning everything created inside `f`.
///
/// Returns the scope's [`NodeHandle`], which can be used to dispose it before
/// its parent goes away.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_child_scope(f: impl FnOnce()) -> NodeHandle {
    let rt = Runtime::global();
    let id = rt.create_node(NodeKind::Cell);
    let prev = rt.current_owner.replace(id);
    f();
    rt.current_owner.set(prev);
    NodeHandle(id, rt)
}

/// Adds a callback run when the current scope is disposed, and before every
/// re-run when called inside an effect or memo body.
///
/// # Example
/// ```rust
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let scope = create_child_scope(|| {
///     on_cleanup(|| println!("scope is going away"));
/// });
/// scope.dispose(); // Runs the callback.
/// # });
/// ```
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    let rt = Runtime::global();
    let owner = rt.current_owner.get();
    if !owner.is_null() {
        if let Some(node) = rt.nodes.borrow_mut().get_mut(owner) {
            node.cleanups.push(Box::new(f));
        }
    }
}

/// Get a handle to the current scope.
pub fn use_current_scope() -> NodeHandle {
    let rt = Runtime::global();
    NodeHandle(rt.current_owner.get(), rt)
}

/// Get a handle to the root scope of the current runtime.
pub fn use_global_scope() -> NodeHandle {
    let rt = Runtime::global();
    NodeHandle(rt.root_node.get(), rt)
}

/// Batch writes together: effects and subscribers are deferred until the
/// outermost batch exits, so any number of writes produces at most one run
/// per effect. Reads inside the batch observe intermediate values.
///
/// # Example
/// ```
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let state = create_signal(1);
/// let double = create_memo(move || state.get() * 2);
/// batch(move || {
///     state.set(2);
///     assert_eq!(double.get(), 4);
/// });
/// # });
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    let rt = Runtime::global();
    rt.batch_depth.set(rt.batch_depth.get() + 1);
    let _guard = BatchGuard(rt);
    f()
}

struct BatchGuard(&'static Runtime);

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let rt = self.0;
        rt.batch_depth.set(rt.batch_depth.get() - 1);
        if rt.batch_depth.get() == 0 && !std::thread::panicking() {
            let prev = Runtime::set_global(Some(rt));
            rt.flush_effects();
            Runtime::set_global(prev);
        }
    }
}

/// Run the closure with dependency tracking suppressed.
///
/// # Example
/// ```
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let state = create_signal(1);
/// let double = create_memo(move || untrack(|| state.get() * 2));
/// assert_eq!(double.get(), 2);
///
/// state.set(2);
/// // Still the old value: the read was untracked.
/// assert_eq!(double.get(), 2);
/// # });
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    match Runtime::try_global() {
        Some(rt) => untrack_in(rt, f),
        // Outside a root nothing tracks, so there is nothing to suppress.
        None => f(),
    }
}

/// Same as [`untrack`] but for a specific runtime.
pub(crate) fn untrack_in<T>(rt: &Runtime, f: impl FnOnce() -> T) -> T {
    let prev = rt.tracker.replace(None);
    let ret = f();
    rt.tracker.replace(prev);
    ret
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn cleanup() {
        let _ = create_root(|| {
            let cleanup_called = create_signal(false);
            let scope = create_child_scope(|| {
                on_cleanup(move || {
                    cleanup_called.set(true);
                });
            });
            assert!(!cleanup_called.get());
            scope.dispose();
            assert!(cleanup_called.get());
        });
    }

    #[test]
    fn cleanup_in_effect() {
        let _ = create_root(|| {
            let trigger = create_signal(());
            let counter = create_signal(0);

            create_effect(move || {
                trigger.track();

                on_cleanup(move || {
                    counter.set(counter.get() + 1);
                });
            });

            assert_eq!(counter.get(), 0);

            trigger.set(());
            assert_eq!(counter.get(), 1);

            trigger.set(());
            assert_eq!(counter.get(), 2);
        });
    }

    #[test]
    fn cleanup_is_untracked() {
        let _ = create_root(|| {
            let trigger = create_signal(());
            let counter = create_signal(0);

            create_effect(move || {
                counter.set(counter.get_untracked() + 1);

                on_cleanup(move || {
                    trigger.track(); // trigger should not be tracked
                });
            });

            assert_eq!(counter.get(), 1);

            trigger.set(());
            assert_eq!(counter.get(), 1);
        });
    }

    #[test]
    fn batch_memo() {
        let _ = create_root(|| {
            let state = create_signal(1);
            let double = create_memo(move || state.get() * 2);
            batch(move || {
                state.set(2);
                assert_eq!(double.get(), 4);
            });
            assert_eq!(double.get(), 4);
        });
    }

    #[test]
    fn batch_defers_effects_until_exit() {
        let _ = create_root(|| {
            let state1 = create_signal(1);
            let state2 = create_signal(2);
            let counter = create_signal(0);
            create_effect(move || {
                counter.set(counter.get_untracked() + 1);
                let _ = state1.get() + state2.get();
            });
            assert_eq!(counter.get(), 1);
            state1.set(2);
            state2.set(3);
            assert_eq!(counter.get(), 3);
            batch(move || {
                state1.set(3);
                assert_eq!(counter.get(), 3);
                state2.set(4);
                assert_eq!(counter.get(), 3);
            });
            assert_eq!(counter.get(), 4);
        });
    }

    #[test]
    fn nested_batch_flushes_once_at_outermost_exit() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let counter = create_signal(0);
            create_effect(move || {
                state.track();
                counter.set(counter.get_untracked() + 1);
            });
            assert_eq!(counter.get(), 1);

            batch(|| {
                state.set(1);
                batch(|| {
                    state.set(2);
                });
                // Inner exit must not flush.
                assert_eq!(counter.get(), 1);
                state.set(3);
            });
            assert_eq!(counter.get(), 2);
        });
    }

    #[test]
    fn coalesced_writes_in_batch() {
        let _ = create_root(|| {
            let x = create_signal(0);
            let y = create_signal(0);
            let runs = create_signal(0);
            let seen = create_signal(-1);
            create_effect(move || {
                seen.set(x.get() + y.get());
                runs.set(runs.get_untracked() + 1);
            });
            assert_eq!(seen.get(), 0);
            assert_eq!(runs.get(), 1);

            batch(|| {
                x.set(1);
                y.set(2);
                x.set(10);
            });
            assert_eq!(seen.get(), 12);
            assert_eq!(runs.get(), 2);
        });
    }

    #[test]
    fn scope_containment_after_dispose() {
        let _ = create_root(|| {
            let trigger = create_signal(());
            let counter = create_signal(0);

            let scope = create_child_scope(|| {
                create_effect(move || {
                    trigger.track();
                    counter.set(counter.get_untracked() + 1);
                });
                let _memo = create_memo(move || {
                    trigger.track();
                });
            });
            assert_eq!(counter.get(), 1);

            scope.dispose();
            trigger.set(());
            trigger.set(());
            assert_eq!(counter.get(), 1); // nothing in the scope runs again
        });
    }

    #[test]
    fn run_in_reenters_root() {
        let root = create_root(|| {});
        let out = root.run_in(|| {
            let signal = create_signal(5);
            signal.get()
        });
        assert_eq!(out, 5);
        root.dispose();
    }

    #[test]
    #[should_panic(expected = "cycle detected")]
    fn cycle_panics() {
        let _ = create_root(|| {
            let memo = create_memo_recursive();
            let _ = memo.get();
        });
    }

    fn create_memo_recursive() -> ReadSignal<i32> {
        // A memo that reads itself through a once-cell of its own handle.
        use std::cell::OnceCell;
        use std::rc::Rc;
        let slot: Rc<OnceCell<ReadSignal<i32>>> = Rc::new(OnceCell::new());
        let inner = slot.clone();
        let memo = create_memo(move || match inner.get() {
            Some(me) => me.get() + 1,
            None => 0,
        });
        slot.set(memo).unwrap();
        // Memos are lazy, so the handle is already in the cell by the time
        // the first read runs the body, which then reads itself.
        memo
    }
}

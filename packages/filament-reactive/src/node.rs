//! Reactive graph nodes.

use std::any::Any;
use std::mem;
use std::rc::Rc;

use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::runtime::{untrack_in, Runtime};

new_key_type! {
    pub(crate) struct NodeId;
}

/// The callback that recomputes a derived node in place.
///
/// The slot is `None` until the first evaluation. Returns whether the stored
/// value changed, as decided by the comparator captured in the closure.
pub(crate) type ComputeFn = Box<dyn FnMut(&mut Option<Box<dyn Any>>) -> bool>;

/// Type-erased comparator used for the same-value write cut.
pub(crate) type EqFn = Box<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// A dependency edge. `seen_version` is the source's version at the time the
/// dependent last observed it, which makes staleness a single integer compare.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
    pub source: NodeId,
    pub seen_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Cell,
    Derived,
    Effect,
}

/// A node inside the reactive graph. Every cell, memo, effect, and scope
/// anchor is one of these, stored in the runtime's slotmap arena.
pub(crate) struct ReactiveNode {
    /// Current value. `None` for derived nodes that have not yet computed.
    pub value: Option<Box<dyn Any>>,
    /// Recompute callback for derived and effect nodes.
    pub compute: Option<ComputeFn>,
    /// Comparator for cell writes. Derived nodes compare inside `compute`.
    pub eq: Option<EqFn>,
    pub kind: NodeKind,
    /// Monotonic version, bumped on every value change. Cells start at 1;
    /// derived nodes start at 0, meaning "never computed".
    pub version: u64,
    /// Value may be stale; verified against edge versions on the next read.
    pub dirty: bool,
    /// Set while the node's compute callback is on the stack.
    pub computing: bool,
    /// Effect only: already sitting in the pending-effect queue.
    pub queued: bool,
    /// Effect only: the flush-strategy-wrapped re-run entry point.
    pub runner: Option<Rc<dyn Fn()>>,
    /// The owning node, or the null key at the top level.
    pub parent: NodeId,
    /// Nodes owned by this node, disposed before each re-run and on dispose.
    pub children: Vec<NodeId>,
    /// Incoming edges, in first-read order, deduplicated.
    pub dependencies: SmallVec<[Edge; 4]>,
    /// Outgoing edges: nodes that depend on this node.
    pub dependents: Vec<NodeId>,
    /// Callbacks run (untracked) before each re-run and on dispose.
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    /// Generation mark for duplicate suppression during downstream walks.
    pub visited: u64,
}

impl ReactiveNode {
    pub fn new(kind: NodeKind, parent: NodeId) -> Self {
        Self {
            value: None,
            compute: None,
            eq: None,
            kind,
            version: 0,
            dirty: false,
            computing: false,
            queued: false,
            runner: None,
            parent,
            children: Vec::new(),
            dependencies: SmallVec::new(),
            dependents: Vec::new(),
            cleanups: Vec::new(),
            visited: 0,
        }
    }
}

/// A handle to a node, used to dispose it along with everything it owns.
#[derive(Clone, Copy)]
pub struct NodeHandle(pub(crate) NodeId, pub(crate) &'static Runtime);

impl NodeHandle {
    /// Destroy the node and everything created inside it. Severs the node's
    /// incoming edges so former dependencies no longer reach it. Disposing an
    /// already-disposed node is a no-op.
    pub fn dispose(self) {
        let NodeHandle(id, rt) = self;
        if rt.nodes.borrow().get(id).is_none() {
            return;
        }
        self.dispose_children();
        let dependencies = match rt.nodes.borrow_mut().get_mut(id) {
            Some(node) => mem::take(&mut node.dependencies),
            None => return,
        };
        for edge in dependencies {
            if let Some(source) = rt.nodes.borrow_mut().get_mut(edge.source) {
                source.dependents.retain(|&dependent| dependent != id);
            }
        }
        rt.nodes.borrow_mut().remove(id);
    }

    /// Run the node's cleanups and dispose its owned children, leaving the
    /// node itself alive. This is what happens right before a re-run.
    pub(crate) fn dispose_children(self) {
        let NodeHandle(id, rt) = self;
        let (cleanups, children) = match rt.nodes.borrow_mut().get_mut(id) {
            Some(node) => (
                mem::take(&mut node.cleanups),
                mem::take(&mut node.children),
            ),
            None => return,
        };
        untrack_in(rt, move || {
            for cb in cleanups {
                cb();
            }
        });
        for child in children {
            NodeHandle(child, rt).dispose();
        }
    }

    /// Whether the node has not been disposed yet.
    pub fn is_alive(self) -> bool {
        self.1.nodes.borrow().get(self.0).is_some()
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NodeHandle").field(&self.0).finish()
    }
}

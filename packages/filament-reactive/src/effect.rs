//! Effects: re-runs observed as side effects, not as values.

use std::rc::Rc;

use crate::flush::FlushStrategy;
use crate::node::{NodeHandle, NodeKind};
use crate::runtime::Runtime;

/// A handle to a created effect, used to dispose it before its owning scope
/// goes away.
#[derive(Clone, Copy, Debug)]
pub struct EffectHandle(NodeHandle);

impl EffectHandle {
    /// Stop the effect: sever its dependencies, cancel any pending scheduling
    /// and run its cleanups. Disposing twice is a no-op, and disposing an
    /// effect from inside its own body is valid (the current run completes,
    /// no further runs occur).
    pub fn dispose(self) {
        self.0.dispose();
    }

    /// Whether the effect has not been disposed yet.
    pub fn is_alive(self) -> bool {
        self.0.is_alive()
    }
}

/// Creates an effect on signals used inside the closure.
///
/// The first run is synchronous and eager. Subsequent runs happen when a
/// dependency changes: inline for the default [`FlushStrategy::sync`], or
/// through the effect's flush strategy otherwise (see [`create_effect_with`]).
/// Within a batch, any number of writes schedules at most one run.
///
/// Cleanup callbacks registered with [`on_cleanup`](crate::on_cleanup) inside
/// the body run before every re-run and on dispose. Anything reactive created
/// inside the body is owned by the effect and torn down the same way.
///
/// # Example
/// ```
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let state = create_signal(0);
///
/// create_effect(move || {
///     println!("new state = {}", state.get());
/// });
/// // Prints "new state = 0"
///
/// state.set(1);
/// // Prints "new state = 1"
/// # });
/// ```
///
/// `create_effect` should only be used for side effects. For updating related
/// state, a [`create_memo`](crate::create_memo) is usually the better tool.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_effect(f: impl FnMut() + 'static) -> EffectHandle {
    create_effect_with(f, FlushStrategy::sync())
}

/// Like [`create_effect`], with an explicit flush strategy governing how an
/// invalidation turns into a run.
///
/// The first run always executes eagerly, bypassing the strategy. When the
/// effect is re-scheduled, its staleness is re-verified at the moment the
/// strategy fires the run, so coalesced or late runs of asynchronous
/// strategies never act on stale premises.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_effect_with(mut f: impl FnMut() + 'static, strategy: FlushStrategy) -> EffectHandle {
    let rt = Runtime::global();
    let id = rt.create_node(NodeKind::Effect);
    {
        let mut nodes = rt.nodes.borrow_mut();
        let node = nodes.get_mut(id).unwrap();
        node.compute = Some(Box::new(move |_slot| {
            f();
            false
        }));
        let run: Rc<dyn Fn()> = Rc::new(move || rt.run_scheduled_effect(id));
        node.runner = Some(strategy.wrap(run));
    }
    rt.recompute(id);
    EffectHandle(NodeHandle(id, rt))
}

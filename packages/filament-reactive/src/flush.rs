//! Flush strategies: policies mapping "invalidated" to "scheduled to run".

use std::rc::Rc;

/// A policy that turns an effect's "run now" entry point into a scheduled
/// version of itself.
///
/// The wrapping happens once, when the effect is created, so a strategy can
/// keep per-effect state (a pending flag, a timer) inside the closure it
/// returns. The runner handed to the strategy re-verifies the effect's
/// staleness when invoked, so dropping or coalescing invocations is always
/// safe.
///
/// The default is [`FlushStrategy::sync`]. Asynchronous strategies
/// (microtask, animation frame, idle, debounce, throttle) are provided by
/// the companion futures crate, where executors live.
#[derive(Clone)]
pub struct FlushStrategy(Rc<dyn Fn(Rc<dyn Fn()>) -> Rc<dyn Fn()>>);

impl FlushStrategy {
    /// Run re-runs inline, inside the write (or batch exit) that caused them.
    pub fn sync() -> Self {
        Self(Rc::new(|run| run))
    }

    /// Build a strategy from a custom wrapping function.
    ///
    /// # Example
    /// ```
    /// # use filament_reactive::*;
    /// # use std::rc::Rc;
    /// // A strategy that drops every re-run (the first, eager run of an
    /// // effect does not go through the strategy).
    /// let never = FlushStrategy::custom(|_run| Rc::new(|| {}));
    /// ```
    pub fn custom(wrap: impl Fn(Rc<dyn Fn()>) -> Rc<dyn Fn()> + 'static) -> Self {
        Self(Rc::new(wrap))
    }

    /// Apply the strategy to an effect's run entry point.
    pub fn wrap(&self, run: Rc<dyn Fn()>) -> Rc<dyn Fn()> {
        (self.0)(run)
    }
}

impl Default for FlushStrategy {
    fn default() -> Self {
        Self::sync()
    }
}

impl std::fmt::Debug for FlushStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FlushStrategy")
    }
}

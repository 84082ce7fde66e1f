//! Memos: lazily recomputed derived values.

use crate::node::NodeKind;
use crate::signal::{create_node_signal, ReadSignal};

/// Creates a memoized computation from some signals.
///
/// The output is derived from all the signals read within the closure. Memos
/// are lazy: the closure does not run until the memo is first read, and a
/// dependency change only marks the memo stale. The next read recomputes it,
/// and only if an input actually changed.
///
/// If the recomputed value equals the previous one (per [`PartialEq`]),
/// dependents are not notified and the memo's version does not advance, so
/// nothing downstream recomputes either. Use [`create_memo_with`] for a
/// custom comparator.
///
/// # Fallible computations
///
/// A fallible derivation is a memo over [`Result`]: the cached value stays
/// `Err` (and every read returns it) until a dependency change produces a
/// successful recompute.
///
/// # Example
/// ```
/// # use filament_reactive::*;
/// # let _ = create_root(|| {
/// let state = create_signal(0);
/// let double = create_memo(move || state.get() * 2);
///
/// assert_eq!(double.get(), 0);
/// state.set(1);
/// assert_eq!(double.get(), 2);
/// # });
/// ```
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_memo<T: PartialEq + 'static>(f: impl FnMut() -> T + 'static) -> ReadSignal<T> {
    create_memo_with(f, PartialEq::eq)
}

/// Like [`create_memo`] but with an explicit comparator deciding whether the
/// recomputed value equals the cached one. `|_, _| false` makes every
/// recompute propagate.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_memo_with<T: 'static>(
    mut f: impl FnMut() -> T + 'static,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> ReadSignal<T> {
    let signal = create_node_signal::<T>(NodeKind::Derived);
    let mut node = signal.get_mut();
    node.compute = Some(Box::new(move |slot| {
        let new = f();
        match slot {
            Some(old) => {
                let old = old.downcast_mut::<T>().expect("wrong memo type");
                if eq(&new, old) {
                    false
                } else {
                    *old = new;
                    true
                }
            }
            None => {
                *slot = Some(Box::new(new));
                true
            }
        }
    }));
    drop(node);
    *signal
}

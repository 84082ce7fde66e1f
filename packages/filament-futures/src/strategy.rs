//! Asynchronous flush strategies.
//!
//! Each constructor returns a [`FlushStrategy`] whose per-effect state lives
//! in the closure it wraps around the effect's runner. The runner re-verifies
//! the effect's staleness when it finally fires, so coalescing and dropping
//! invocations here is always safe.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use filament_reactive::FlushStrategy;

use crate::{sleep, spawn_local};

/// Re-runs execute on the next turn of the local executor. Invalidations
/// arriving before the scheduled run coalesce into one.
pub fn microtask() -> FlushStrategy {
    deferred(None)
}

/// Re-runs execute roughly on the next frame. Without a host compositor this
/// approximates a frame with a 16ms timer; invalidations coalesce per frame.
pub fn animation_frame() -> FlushStrategy {
    deferred(Some(Duration::from_millis(16)))
}

/// Re-runs execute when the executor is otherwise idle. Approximated with a
/// zero-length timer, which yields to every task already scheduled.
pub fn idle() -> FlushStrategy {
    deferred(Some(Duration::ZERO))
}

fn deferred(delay: Option<Duration>) -> FlushStrategy {
    FlushStrategy::custom(move |run| {
        let pending = Rc::new(Cell::new(false));
        Rc::new(move || {
            if pending.replace(true) {
                return;
            }
            let pending = pending.clone();
            let run = run.clone();
            spawn_local(async move {
                if let Some(delay) = delay {
                    sleep(delay).await;
                }
                pending.set(false);
                run();
            });
        })
    })
}

/// Trailing-edge debounce: a re-run executes only once `duration` has passed
/// with no further invalidations; every new invalidation restarts the timer.
pub fn debounce(duration: Duration) -> FlushStrategy {
    FlushStrategy::custom(move |run| {
        let generation = Rc::new(Cell::new(0u64));
        Rc::new(move || {
            let current = generation.get().wrapping_add(1);
            generation.set(current);
            let generation = generation.clone();
            let run = run.clone();
            spawn_local(async move {
                sleep(duration).await;
                // A later invalidation superseded this timer.
                if generation.get() == current {
                    run();
                }
            });
        })
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Throttle {
    Idle,
    Cooling,
    CoolingWithPending,
}

/// Leading-edge throttle with a trailing run: the first invalidation runs
/// immediately, further ones during the cooldown window collapse into a
/// single run at the window's end.
pub fn throttle(duration: Duration) -> FlushStrategy {
    FlushStrategy::custom(move |run| {
        let state = Rc::new(Cell::new(Throttle::Idle));
        Rc::new(move || match state.get() {
            Throttle::Idle => {
                run();
                state.set(Throttle::Cooling);
                let state = state.clone();
                let run = run.clone();
                spawn_local(async move {
                    loop {
                        sleep(duration).await;
                        if state.get() == Throttle::CoolingWithPending {
                            state.set(Throttle::Cooling);
                            run();
                        } else {
                            state.set(Throttle::Idle);
                            break;
                        }
                    }
                });
            }
            Throttle::Cooling => state.set(Throttle::CoolingWithPending),
            Throttle::CoolingWithPending => {}
        })
    })
}

//! Futures support for Filament: local executors, async flush strategies,
//! resources, and the async-boundary helper.

#![warn(missing_docs)]
#![deny(missing_debug_implementations)]

mod load;
mod resource;
mod strategy;

pub use load::*;
pub use resource::*;
pub use strategy::*;

use futures::future::abortable;
use futures::Future;
use filament_reactive::on_cleanup;

/// If running on the `wasm32` target, does nothing. Otherwise creates a new
/// `tokio::task::LocalSet` scope, which the spawned local tasks of resources
/// and async flush strategies need on native targets.
///
/// Normally this wraps the whole app (or test body) once.
pub async fn provide_executor_scope<U>(f: impl Future<Output = U>) -> U {
    #[cfg(target_arch = "wasm32")]
    {
        f.await
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let local = tokio::task::LocalSet::new();
        local.run_until(f).await
    }
}

/// Spawn a `!Send` future on the current executor.
///
/// On `wasm32` this always schedules. On native targets it requires a running
/// tokio runtime (see [`provide_executor_scope`]); without one the future is
/// dropped, so asynchronous re-runs degrade to no-ops instead of keeping a
/// server from tearing down.
pub fn spawn_local(f: impl Future<Output = ()> + 'static) {
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(f);
    #[cfg(not(target_arch = "wasm32"))]
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::task::spawn_local(f);
        }
    }
}

/// Spawns a `!Send` future on the current reactive scope. If the scope is
/// destroyed before the future completes, the future is aborted immediately,
/// so it can never observe values the scope has already released.
pub fn spawn_local_scoped(f: impl Future<Output = ()> + 'static) {
    let (abortable, handle) = abortable(f);
    on_cleanup(move || handle.abort());
    spawn_local(async move {
        let _ = abortable.await;
    });
}

/// Sleep for the given duration on whichever timer the target has.
pub(crate) async fn sleep(duration: std::time::Duration) {
    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(duration).await;
    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use filament_reactive::*;

    use super::*;

    #[tokio::test]
    async fn spawn_local_scoped_aborts_on_scope_dispose() {
        provide_executor_scope(async {
            let root = create_root(|| {});
            let (tx, rx) = futures::channel::oneshot::channel::<()>();
            let completed = root.run_in(|| create_signal(false));

            let scope = root.run_in(|| {
                create_child_scope(|| {
                    spawn_local_scoped(async move {
                        let _ = rx.await;
                        completed.set(true);
                    });
                })
            });

            scope.dispose();
            let _ = tx.send(());
            tokio::task::yield_now().await;
            root.run_in(|| assert!(!completed.get()));
            root.dispose();
        })
        .await;
    }

    #[tokio::test]
    async fn spawn_local_without_runtime_scope_is_safe() {
        // Inside a runtime but driving the future to completion through the
        // local set; the helper itself must not panic.
        provide_executor_scope(async {
            let root = create_root(|| {});
            let done = root.run_in(|| create_signal(false));
            spawn_local(async move {
                done.set(true);
            });
            tokio::task::yield_now().await;
            root.run_in(|| assert!(done.get()));
            root.dispose();
        })
        .await;
    }
}

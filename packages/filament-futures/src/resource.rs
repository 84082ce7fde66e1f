//! Resources: async fetchers bound to the reactive graph.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable};
use filament_reactive::{
    create_effect_with, create_memo, create_signal_with, on_cleanup, untrack, EffectHandle,
    FlushStrategy, MaybeDyn, ReadSignal, Signal,
};

use crate::spawn_local;

/// The lifecycle of a resource's value, held in a single signal so ordinary
/// subscribers observe the transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceState<T, E> {
    /// The resource is disabled; the fetcher has not been invoked.
    Idle,
    /// A fetch is in flight.
    Pending,
    /// The last started fetch completed successfully.
    Ready(T),
    /// The last started fetch failed. Aborts never produce this.
    Error(E),
}

impl<T, E> ResourceState<T, E> {
    /// Whether the resource is disabled.
    pub fn is_idle(&self) -> bool {
        matches!(self, ResourceState::Idle)
    }

    /// Whether a fetch is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, ResourceState::Pending)
    }

    /// Whether a value is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, ResourceState::Ready(_))
    }

    /// Whether the last fetch failed.
    pub fn is_error(&self) -> bool {
        matches!(self, ResourceState::Error(_))
    }

    /// The fetched value, if any.
    pub fn data(&self) -> Option<&T> {
        match self {
            ResourceState::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// The fetch error, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            ResourceState::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// The cancellation token handed to a fetcher, signaled when the fetch is
/// superseded (a dependency changed), disabled, or disposed.
///
/// The in-flight future is also hard-cancelled; the signal exists so a
/// fetcher can forward cancellation into whatever transport it drives.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    aborted: Rc<Cell<bool>>,
}

impl AbortSignal {
    pub(crate) fn never() -> Self {
        Self {
            aborted: Rc::new(Cell::new(false)),
        }
    }

    /// Whether the fetch this signal was handed to has been aborted.
    pub fn aborted(&self) -> bool {
        self.aborted.get()
    }
}

struct InFlight {
    flag: Rc<Cell<bool>>,
    handle: AbortHandle,
}

impl InFlight {
    fn abort(self) {
        self.flag.set(true);
        self.handle.abort();
    }
}

/// Options for [`create_resource_with`].
pub struct ResourceOptions {
    enabled: MaybeDyn<bool>,
    flush: FlushStrategy,
    id: Option<String>,
}

impl ResourceOptions {
    /// The defaults: always enabled, synchronous flush, no id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate the resource: while this evaluates to `false` the fetcher is not
    /// invoked and the state is [`ResourceState::Idle`]. Accepts a plain
    /// `bool`, a signal, or a closure; reactive values re-trigger the
    /// resource when they change.
    pub fn enabled(mut self, enabled: impl Into<MaybeDyn<bool>>) -> Self {
        self.enabled = enabled.into();
        self
    }

    /// The flush strategy for reactive re-fetches. The initial fetch always
    /// runs eagerly.
    pub fn flush(mut self, flush: FlushStrategy) -> Self {
        self.flush = flush;
        self
    }

    /// An identifier used by server rendering to pair serialized data with
    /// the resource during hydration.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            enabled: MaybeDyn::Static(true),
            flush: FlushStrategy::sync(),
            id: None,
        }
    }
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions").field("id", &self.id).finish()
    }
}

struct ResourceInner {
    fetch: Rc<dyn Fn()>,
    effect: EffectHandle,
    disposed: Rc<Cell<bool>>,
    in_flight: Rc<RefCell<Option<InFlight>>>,
    version: Rc<Cell<u64>>,
    id: Option<String>,
}

/// An async fetcher bound to the reactive graph.
///
/// The fetcher runs inside an effect: signals it reads synchronously are
/// tracked, and changing them re-enters the fetcher with the prior in-flight
/// fetch aborted. Completions carry the fetch version they started with, so
/// a stale completion is never observed.
///
/// Created with [`create_resource`]; cheap to clone.
pub struct Resource<T: 'static, E: 'static> {
    state: ReadSignal<ResourceState<T, E>>,
    loading: ReadSignal<bool>,
    data: ReadSignal<Option<T>>,
    error: ReadSignal<Option<E>>,
    idle: ReadSignal<bool>,
    inner: Rc<ResourceInner>,
}

impl<T: 'static, E: 'static> Clone for Resource<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            loading: self.loading,
            data: self.data,
            error: self.error,
            idle: self.idle,
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Resource<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("id", &self.inner.id).finish()
    }
}

impl<T: 'static, E: 'static> Resource<T, E> {
    /// The state signal.
    pub fn state(&self) -> ReadSignal<ResourceState<T, E>> {
        self.state
    }

    /// The current state, cloned.
    pub fn read(&self) -> ResourceState<T, E>
    where
        T: Clone,
        E: Clone,
    {
        self.state.get_clone()
    }

    /// `true` while a fetch is in flight.
    pub fn loading(&self) -> ReadSignal<bool> {
        self.loading
    }

    /// The fetched value, if the resource is ready.
    pub fn data(&self) -> ReadSignal<Option<T>> {
        self.data
    }

    /// The fetch error, if the last fetch failed.
    pub fn error(&self) -> ReadSignal<Option<E>> {
        self.error
    }

    /// `true` while the resource is disabled.
    pub fn idle(&self) -> ReadSignal<bool> {
        self.idle
    }

    /// The hydration id, if one was configured.
    pub fn id(&self) -> Option<&str> {
        self.inner.id.as_deref()
    }

    /// Force a re-fetch with the dependency context of the last run: the
    /// prior in-flight fetch is aborted and the fetcher re-invoked,
    /// bypassing the flush strategy. A no-op after [`dispose`](Self::dispose).
    pub fn refetch(&self) {
        if self.inner.disposed.get() {
            return;
        }
        untrack(|| (self.inner.fetch)());
    }

    /// Terminate the resource: abort the in-flight fetch, sever dependency
    /// tracking, and drop any late completions. The state signal keeps its
    /// last value and never transitions again.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        // Invalidate completions that already escaped the abort.
        self.inner.version.set(self.inner.version.get().wrapping_add(1));
        if let Some(in_flight) = self.inner.in_flight.borrow_mut().take() {
            in_flight.abort();
        }
        self.inner.effect.dispose();
    }
}

/// Create a [`Resource`] with default options: see [`create_resource_with`].
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_resource<T, E, F, Fut>(fetcher: F) -> Resource<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
    F: FnMut(AbortSignal) -> Fut + 'static,
    Fut: Future<Output = Result<T, E>> + 'static,
{
    create_resource_with(fetcher, ResourceOptions::default())
}

/// Create a [`Resource`] from a fetcher and options.
///
/// The fetcher is invoked synchronously from inside the resource's effect and
/// hands back a future; signals read during the synchronous part are tracked
/// and re-trigger the resource. The future is awaited on the local executor
/// (see [`provide_executor_scope`](crate::provide_executor_scope)) and
/// hard-cancelled when superseded.
///
/// The resource starts `Idle` and, unless disabled, moves to `Pending`
/// before this function returns (the first effect run is eager). Disposing
/// the owning scope disposes the resource.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_resource_with<T, E, F, Fut>(fetcher: F, options: ResourceOptions) -> Resource<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
    F: FnMut(AbortSignal) -> Fut + 'static,
    Fut: Future<Output = Result<T, E>> + 'static,
{
    let ResourceOptions { enabled, flush, id } = options;

    // State transitions always notify; `T` and `E` stay free of comparator
    // requirements on the hot path.
    let state: Signal<ResourceState<T, E>> =
        create_signal_with(ResourceState::Idle, |_, _| false);

    let version: Rc<Cell<u64>> = Rc::new(Cell::new(0));
    let in_flight: Rc<RefCell<Option<InFlight>>> = Rc::new(RefCell::new(None));
    let disposed: Rc<Cell<bool>> = Rc::new(Cell::new(false));
    let fetcher = Rc::new(RefCell::new(fetcher));

    let fetch: Rc<dyn Fn()> = {
        let version = version.clone();
        let in_flight = in_flight.clone();
        let disposed = disposed.clone();
        let fetcher = fetcher.clone();
        Rc::new(move || {
            if disposed.get() {
                return;
            }
            if !enabled.get() {
                if let Some(prev) = in_flight.borrow_mut().take() {
                    prev.abort();
                }
                state.set(ResourceState::Idle);
                return;
            }

            let fetch_version = version.get().wrapping_add(1);
            version.set(fetch_version);
            if let Some(prev) = in_flight.borrow_mut().take() {
                prev.abort();
            }
            let flag = Rc::new(Cell::new(false));
            let (handle, registration) = AbortHandle::new_pair();
            *in_flight.borrow_mut() = Some(InFlight {
                flag: flag.clone(),
                handle,
            });
            state.set(ResourceState::Pending);

            // The synchronous part of the fetcher is where dependencies get
            // tracked.
            let future = (*fetcher.borrow_mut())(AbortSignal { aborted: flag });

            let version = version.clone();
            spawn_local(async move {
                match Abortable::new(future, registration).await {
                    Ok(Ok(value)) => {
                        if version.get() == fetch_version {
                            state.set(ResourceState::Ready(value));
                        }
                    }
                    Ok(Err(error)) => {
                        if version.get() == fetch_version {
                            state.set(ResourceState::Error(error));
                        }
                    }
                    // Expected when superseded or disposed.
                    Err(futures::future::Aborted) => {}
                }
            });
        })
    };

    let effect = {
        let fetch = fetch.clone();
        create_effect_with(move || fetch(), flush)
    };

    // Tie the in-flight fetch to the owning scope.
    {
        let disposed = disposed.clone();
        let in_flight = in_flight.clone();
        let version = version.clone();
        on_cleanup(move || {
            disposed.set(true);
            version.set(version.get().wrapping_add(1));
            if let Some(in_flight) = in_flight.borrow_mut().take() {
                in_flight.abort();
            }
        });
    }

    let state_read = *state;
    let loading = create_memo(move || state_read.with(ResourceState::is_pending));
    let idle = create_memo(move || state_read.with(ResourceState::is_idle));
    let data = create_memo(move || state_read.with(|s| s.data().cloned()));
    let error = create_memo(move || state_read.with(|s| s.error().cloned()));

    Resource {
        state: state_read,
        loading,
        data,
        error,
        idle,
        inner: Rc::new(ResourceInner {
            fetch,
            effect,
            disposed,
            in_flight,
            version,
            id,
        }),
    }
}

//! The async-boundary helper: lazy ref-specs for view layers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use filament_reactive::{create_memo_with, create_signal_with, ReadSignal};

use crate::resource::{create_resource_with, AbortSignal, ResourceOptions, ResourceState};

/// The rendering phases of an async region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadPhase<T, E> {
    /// The fetch has not completed yet.
    Pending,
    /// The fetch completed with a value.
    Ready(T),
    /// The fetch failed.
    Error(E),
}

/// Options for [`load_with`].
#[derive(Debug, Default)]
pub struct LoadOptions {
    id: Option<String>,
}

impl LoadOptions {
    /// The defaults: no id.
    pub fn new() -> Self {
        Self::default()
    }

    /// An identifier pairing the region's serialized data between server
    /// render and client hydration.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

type BoxedFetcher<T, E> = Box<dyn FnMut(AbortSignal) -> LocalBoxFuture<'static, Result<T, E>>>;

/// An opaque descriptor for a lazy async region, returned by [`load`] and
/// materialized by a view layer in one of three modes:
///
/// - **Client attach** ([`attach`](RefSpec::attach)): construct the backing
///   resource, render the pending branch immediately, re-render on
///   completion.
/// - **Server render** ([`resolve`](RefSpec::resolve)): await the fetcher and
///   render the terminal branch once; the data stays readable through
///   [`data`](RefSpec::data) for serialization into the page.
/// - **Client hydration** ([`inject`](RefSpec::inject) before `attach`):
///   pre-injected data short-circuits to the ready branch without fetching.
///
/// A ref-spec is a single-shot producer: re-entering a region means building
/// a new one with another [`load`] call.
pub struct RefSpec<T: 'static, E: 'static, V: 'static> {
    fetch: Rc<RefCell<BoxedFetcher<T, E>>>,
    renderer: Rc<dyn Fn(&LoadPhase<T, E>) -> V>,
    injected: Rc<RefCell<Option<T>>>,
    resolved: Rc<Cell<bool>>,
    id: Option<String>,
}

impl<T: 'static, E: 'static, V: 'static> Clone for RefSpec<T, E, V> {
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch.clone(),
            renderer: self.renderer.clone(),
            injected: self.injected.clone(),
            resolved: self.resolved.clone(),
            id: self.id.clone(),
        }
    }
}

impl<T: 'static, E: 'static, V: 'static> fmt::Debug for RefSpec<T, E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSpec")
            .field("id", &self.id)
            .field("resolved", &self.resolved.get())
            .finish()
    }
}

/// Introspection metadata of a [`RefSpec`], for view and SSR layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefSpecMeta<'a> {
    /// The hydration-pairing id, if configured.
    pub id: Option<&'a str>,
    /// Whether the region's data is already available (fetched or injected).
    pub resolved: bool,
}

impl<T: 'static, E: 'static, V: 'static> RefSpec<T, E, V> {
    /// Hand pre-fetched data to the region before mounting. The next
    /// [`attach`](RefSpec::attach) short-circuits to the ready branch
    /// without invoking the fetcher.
    pub fn inject(&self, value: T) {
        *self.injected.borrow_mut() = Some(value);
        self.resolved.set(true);
    }

    /// The region's data, if resolved with a value. Server renderers read
    /// this to serialize the value into the page.
    pub fn data(&self) -> Option<T>
    where
        T: Clone,
    {
        self.injected.borrow().clone()
    }

    /// Whether the region's data is already available.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }

    /// The introspection record.
    pub fn meta(&self) -> RefSpecMeta<'_> {
        RefSpecMeta {
            id: self.id.as_deref(),
            resolved: self.resolved.get(),
        }
    }

    /// Client attach: mount the region, returning a reactive view signal.
    ///
    /// With injected data present, renders the ready branch once and never
    /// fetches. Otherwise constructs the backing resource (the fetcher runs
    /// immediately) and the signal follows its state through the renderer.
    pub fn attach(&self) -> ReadSignal<V>
    where
        T: Clone + PartialEq,
        E: Clone + PartialEq,
    {
        if self.resolved.get() {
            if let Some(value) = &*self.injected.borrow() {
                let view = (self.renderer)(&LoadPhase::Ready(value.clone()));
                return *create_signal_with(view, |_, _| false);
            }
        }

        let fetch = self.fetch.clone();
        let options = match &self.id {
            Some(id) => ResourceOptions::new().id(id.clone()),
            None => ResourceOptions::new(),
        };
        let resource = create_resource_with(move |abort| (*fetch.borrow_mut())(abort), options);

        let renderer = self.renderer.clone();
        let resolved = self.resolved.clone();
        let state = resource.state();
        create_memo_with(
            move || {
                state.with(|s| match s {
                    ResourceState::Ready(value) => {
                        resolved.set(true);
                        renderer(&LoadPhase::Ready(value.clone()))
                    }
                    ResourceState::Error(error) => {
                        resolved.set(true);
                        renderer(&LoadPhase::Error(error.clone()))
                    }
                    _ => renderer(&LoadPhase::Pending),
                })
            },
            |_, _| false,
        )
    }

    /// Server render: run the fetcher to completion and render the terminal
    /// branch. The resolved value stays readable through
    /// [`data`](RefSpec::data).
    pub async fn resolve(&self) -> V
    where
        T: Clone,
    {
        let future = (*self.fetch.borrow_mut())(AbortSignal::never());
        match future.await {
            Ok(value) => {
                *self.injected.borrow_mut() = Some(value.clone());
                self.resolved.set(true);
                (self.renderer)(&LoadPhase::Ready(value))
            }
            Err(error) => {
                self.resolved.set(true);
                (self.renderer)(&LoadPhase::Error(error))
            }
        }
    }
}

/// Describe a lazy async region: a fetcher plus a renderer over its phases.
/// See [`RefSpec`] for the three execution modes.
pub fn load<T, E, V, F, Fut, R>(fetcher: F, renderer: R) -> RefSpec<T, E, V>
where
    T: 'static,
    E: 'static,
    V: 'static,
    F: FnMut(AbortSignal) -> Fut + 'static,
    Fut: Future<Output = Result<T, E>> + 'static,
    R: Fn(&LoadPhase<T, E>) -> V + 'static,
{
    load_with(fetcher, renderer, LoadOptions::default())
}

/// Like [`load`], with options.
pub fn load_with<T, E, V, F, Fut, R>(
    mut fetcher: F,
    renderer: R,
    options: LoadOptions,
) -> RefSpec<T, E, V>
where
    T: 'static,
    E: 'static,
    V: 'static,
    F: FnMut(AbortSignal) -> Fut + 'static,
    Fut: Future<Output = Result<T, E>> + 'static,
    R: Fn(&LoadPhase<T, E>) -> V + 'static,
{
    let fetch: BoxedFetcher<T, E> = Box::new(move |abort| fetcher(abort).boxed_local());
    RefSpec {
        fetch: Rc::new(RefCell::new(fetch)),
        renderer: Rc::new(renderer),
        injected: Rc::new(RefCell::new(None)),
        resolved: Rc::new(Cell::new(false)),
        id: options.id,
    }
}

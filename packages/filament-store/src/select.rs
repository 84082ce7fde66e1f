//! Select markers: lazy cross-slice references.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use filament_reactive::{create_memo, ReadSignal};

use crate::slice::Slice;
use crate::value::Value;

type Projector = Rc<dyn Fn(&Value) -> Value>;

/// A sentinel standing for a lazy reference to another slice, produced by
/// [`select`] or [`select_with`] and embedded in a slice's value tree.
///
/// The first time a tree containing the marker is consumed, the marker
/// resolves by reading the referenced slice (and applying the projector, if
/// any) through a cached derivation, so repeat reads reuse the same
/// derivation and stay live as the referenced slice changes.
///
/// Markers compare by identity.
#[derive(Clone)]
pub struct SelectMarker {
    inner: Rc<SelectInner>,
}

struct SelectInner {
    target: Slice,
    projector: Option<Projector>,
    resolved: RefCell<Option<ReadSignal<Value>>>,
}

impl SelectMarker {
    fn new(target: Slice, projector: Option<Projector>) -> Self {
        Self {
            inner: Rc::new(SelectInner {
                target,
                projector,
                resolved: RefCell::new(None),
            }),
        }
    }

    /// Resolve the marker to the referenced slice's current value.
    pub fn resolve(&self) -> Value {
        let cached = (*self.inner.resolved.borrow()).filter(|memo| memo.is_alive());
        let memo = match cached {
            Some(memo) => memo,
            None => {
                let target = self.inner.target.clone();
                let projector = self.inner.projector.clone();
                let memo = create_memo(move || {
                    let value = target.read();
                    match &projector {
                        // A projector may itself return markers.
                        Some(project) => resolve_tree(&project(&value)),
                        None => value,
                    }
                });
                *self.inner.resolved.borrow_mut() = Some(memo);
                memo
            }
        };
        memo.get_clone()
    }
}

impl PartialEq for SelectMarker {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SelectMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelectMarker")
    }
}

/// Create a marker standing for the current value of another slice.
///
/// The marker resolves when the containing tree is read; see
/// [`Slice::read`].
pub fn select(slice: &Slice) -> Value {
    Value::Select(SelectMarker::new(slice.clone(), None))
}

/// Like [`select`], applying a projector to the referenced slice's resolved
/// value. The projector typically picks a single member:
///
/// ```ignore
/// select_with(&actions, |v| v.get("increment").unwrap().clone())
/// ```
pub fn select_with(slice: &Slice, projector: impl Fn(&Value) -> Value + 'static) -> Value {
    Value::Select(SelectMarker::new(slice.clone(), Some(Rc::new(projector))))
}

/// Walk a value tree, replacing every marker with its resolution.
/// Resolution is recursive: resolved subtrees are walked too.
pub(crate) fn resolve_tree(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(resolve_tree).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(key, value)| (*key, resolve_tree(value)))
                .collect(),
        ),
        Value::Select(marker) => marker.resolve(),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use filament_reactive::*;

    use crate::adapter::testing::MemoryStore;
    use crate::*;

    #[derive(Clone, PartialEq)]
    struct AppState {
        count: i64,
        user: User,
    }

    #[derive(Clone, PartialEq)]
    struct User {
        name: String,
    }

    fn app_store() -> Store<MemoryStore<AppState>> {
        Store::new(MemoryStore::new(AppState {
            count: 0,
            user: User {
                name: "Alice".to_string(),
            },
        }))
    }

    fn actions_slice(store: &Store<MemoryStore<AppState>>) -> Slice {
        create_slice(
            store,
            |selectors| selectors.field("count", |s: &AppState| s.count),
            |count: &Getter<i64>, set: &Setter<AppState>| {
                let set = set.clone();
                let count = count.clone();
                Value::map([
                    ("increment", Value::action(move || set.set(|s| s.count += 1))),
                    (
                        "current",
                        Value::method(move |_| Value::Int(count.get())),
                    ),
                ])
            },
        )
    }

    #[test]
    fn button_slice_resolves_live_action() {
        let _ = create_root(|| {
            let store = app_store();
            let actions = actions_slice(&store);

            let button = create_slice(
                &store,
                |selectors| selectors.field("user", |s: &AppState| s.user.clone()),
                compose([("actions", actions.clone())], {
                    move |user: &Getter<User>, _set: &Setter<AppState>, deps: &SliceMap| {
                        Value::map([
                            (
                                "onClick",
                                select_with(deps.get("actions"), |v| {
                                    v.get("increment").unwrap().clone()
                                }),
                            ),
                            ("label", format!("Hi, {}", user.get().name).into()),
                        ])
                    }
                }),
            );

            // A subscriber over the count observes the action's write.
            let counter = create_derived_slice(
                &store,
                |selectors| selectors.field("count", |s: &AppState| s.count),
                |count: &Getter<i64>| Value::Int(count.get()),
            );
            let observed = create_signal(-1);
            let counter2 = counter.clone();
            let _unsub = counter.subscribe(move || {
                observed.set(counter2.read().as_int().unwrap());
            });

            let tree = button.read();
            assert_eq!(tree.get("label").unwrap().as_str(), Some("Hi, Alice"));

            // The marker resolved to the live function reference.
            tree.get("onClick").unwrap().call(&[]);
            assert_eq!(store.get().count, 1);
            assert_eq!(observed.get(), 1);
        });
    }

    #[test]
    fn marker_resolution_is_cached_and_live() {
        let _ = create_root(|| {
            let store = app_store();
            let actions = actions_slice(&store);

            let marker = select_with(&actions, |v| v.get("current").unwrap().clone());
            let first = crate::select::resolve_tree(&marker);
            assert_eq!(first.call(&[]), Value::Int(0));

            store.set(|s| s.count = 5);
            // Repeat resolution goes through the same cached derivation and
            // observes the current slice value.
            let second = crate::select::resolve_tree(&marker);
            assert_eq!(second.call(&[]), Value::Int(5));
        });
    }

    #[test]
    fn select_without_projector_resolves_whole_slice() {
        let _ = create_root(|| {
            let store = app_store();
            let counter = create_derived_slice(
                &store,
                |selectors| selectors.field("count", |s: &AppState| s.count),
                |count: &Getter<i64>| Value::map([("value", Value::Int(count.get()))]),
            );

            let holder = create_derived_slice(
                &store,
                |_selectors| (),
                compose([("counter", counter.clone())], {
                    move |_: &(), deps: &SliceMap| {
                        Value::map([("inner", select(deps.get("counter")))])
                    }
                }),
            );

            let tree = holder.read();
            assert_eq!(
                tree.get("inner").unwrap().get("value").unwrap(),
                &Value::Int(0)
            );
        });
    }

    #[test]
    fn markers_compare_by_identity() {
        let _ = create_root(|| {
            let store = app_store();
            let actions = actions_slice(&store);
            let a = select(&actions);
            let b = select(&actions);
            assert_eq!(a, a.clone());
            assert_ne!(a, b);
        });
    }
}

//! Inline composition of slice bodies.

use indexmap::IndexMap;

use crate::adapter::Setter;
use crate::slice::{DerivedSliceBody, Slice, SliceBody};
use crate::value::Value;

/// The named inner slices handed to a composed body.
pub struct SliceMap {
    inner: IndexMap<&'static str, Slice>,
}

impl SliceMap {
    /// Look up an inner slice by name.
    pub fn try_get(&self, name: &str) -> Option<&Slice> {
        self.inner.get(name)
    }

    /// Look up an inner slice by name.
    ///
    /// # Panics
    /// Panics if no slice was composed under that name.
    #[track_caller]
    pub fn get(&self, name: &str) -> &Slice {
        self.try_get(name)
            .unwrap_or_else(|| panic!("no slice composed under the name `{name}`"))
    }

    /// The composed names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inner.keys().copied()
    }
}

/// A slice body with other slices in scope. Built by [`compose`]; usable
/// wherever a slice body is expected.
pub struct Composed<F> {
    deps: SliceMap,
    body: F,
}

/// Compose a slice body with other slices by name.
///
/// The resulting body's declared dependency key-set is the union of the inner
/// slices' key-sets (plus whatever the enclosing selector phase declares),
/// and the body receives the inner slices through a [`SliceMap`], preserving
/// their method identity across the boundary.
///
/// Works for both writable bodies (`Fn(&G, &Setter<S>, &SliceMap) -> Value`,
/// passed to [`create_slice`](crate::create_slice)) and read-only bodies
/// (`Fn(&G, &SliceMap) -> Value`, passed to
/// [`create_derived_slice`](crate::create_derived_slice)).
///
/// # Example
/// ```ignore
/// let button = create_slice(
///     &store,
///     |selectors| selectors.field("user", |s: &AppState| s.user.clone()),
///     compose([("actions", actions.clone())], |user, _set, deps| {
///         Value::map([
///             ("onClick", select_with(deps.get("actions"), |v| {
///                 v.get("increment").unwrap().clone()
///             })),
///             ("label", format!("Hi, {}", user.get().name).into()),
///         ])
///     }),
/// );
/// ```
pub fn compose<F>(deps: impl IntoIterator<Item = (&'static str, Slice)>, body: F) -> Composed<F> {
    Composed {
        deps: SliceMap {
            inner: deps.into_iter().collect(),
        },
        body,
    }
}

impl<F> Composed<F> {
    fn union_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        for slice in self.deps.inner.values() {
            for &key in slice.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

impl<G, S, F> SliceBody<G, S> for Composed<F>
where
    G: 'static,
    S: 'static,
    F: Fn(&G, &Setter<S>, &SliceMap) -> Value + 'static,
{
    fn dep_keys(&self) -> Vec<&'static str> {
        self.union_keys()
    }

    fn run(&self, getters: &G, set: &Setter<S>) -> Value {
        (self.body)(getters, set, &self.deps)
    }
}

impl<G, F> DerivedSliceBody<G> for Composed<F>
where
    G: 'static,
    F: Fn(&G, &SliceMap) -> Value + 'static,
{
    fn dep_keys(&self) -> Vec<&'static str> {
        self.union_keys()
    }

    fn run(&self, getters: &G) -> Value {
        (self.body)(getters, &self.deps)
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
        step: i64,
        label: String,
    }

    fn app_store() -> Store<MemoryStore<AppState>> {
        Store::new(MemoryStore::new(AppState {
            count: 0,
            step: 2,
            label: "x".to_string(),
        }))
    }

    #[test]
    fn composed_dep_set_is_the_union() {
        let _ = create_root(|| {
            let store = app_store();
            let counter = create_derived_slice(
                &store,
                |selectors| selectors.field("count", |s: &AppState| s.count),
                |count: &Getter<i64>| Value::Int(count.get()),
            );
            let stepper = create_derived_slice(
                &store,
                |selectors| selectors.field("step", |s: &AppState| s.step),
                |step: &Getter<i64>| Value::Int(step.get()),
            );

            let both = create_derived_slice(
                &store,
                |selectors| selectors.field("label", |s: &AppState| s.label.clone()),
                compose(
                    [("counter", counter.clone()), ("stepper", stepper.clone())],
                    |label: &Getter<String>, deps: &SliceMap| {
                        let count = deps.get("counter").read().as_int().unwrap();
                        let step = deps.get("stepper").read().as_int().unwrap();
                        Value::map([
                            ("sum", Value::Int(count + step)),
                            ("label", label.get().into()),
                        ])
                    },
                ),
            );

            assert_eq!(both.keys(), ["label", "count", "step"]);
            assert_eq!(both.get("sum"), Value::Int(2));
        });
    }

    #[test]
    fn composed_body_sees_inner_changes() {
        let _ = create_root(|| {
            let store = app_store();
            let counter = create_derived_slice(
                &store,
                |selectors| selectors.field("count", |s: &AppState| s.count),
                |count: &Getter<i64>| Value::Int(count.get()),
            );

            let doubled = create_derived_slice(
                &store,
                |_selectors| (),
                compose([("counter", counter.clone())], |_: &(), deps: &SliceMap| {
                    Value::Int(deps.get("counter").read().as_int().unwrap() * 2)
                }),
            );

            assert_eq!(doubled.read(), Value::Int(0));
            store.set(|s| s.count = 21);
            assert_eq!(doubled.read(), Value::Int(42));
        });
    }

    #[test]
    fn method_identity_is_preserved_across_the_boundary() {
        let _ = create_root(|| {
            let store = app_store();
            let actions = create_slice(
                &store,
                |selectors| selectors.field("count", |s: &AppState| s.count),
                |_count: &Getter<i64>, set: &Setter<AppState>| {
                    let set = set.clone();
                    Value::map([("bump", Value::action(move || set.set(|s| s.count += 1)))])
                },
            );

            let outer = create_slice(
                &store,
                |_selectors| (),
                compose([("actions", actions.clone())], {
                    move |_: &(), _set: &Setter<AppState>, deps: &SliceMap| {
                        // Hand the inner method through directly.
                        Value::map([("bump", deps.get("actions").get("bump"))])
                    }
                }),
            );

            let inner_method = actions.get("bump");
            let outer_method = outer.get("bump");
            assert_eq!(inner_method, outer_method);

            outer_method.call(&[]);
            assert_eq!(store.get().count, 1);
        });
    }

    #[test]
    #[should_panic(expected = "no slice composed under the name")]
    fn missing_composed_name_panics() {
        let _ = create_root(|| {
            let store = app_store();
            let slice = create_derived_slice(
                &store,
                |_selectors| (),
                compose([], |_: &(), deps: &SliceMap| {
                    deps.get("nope").read()
                }),
            );
            let _ = slice.read();
        });
    }
}

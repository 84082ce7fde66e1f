//! Values that can be either static or reactive.

use std::borrow::Cow;
use std::rc::Rc;

use crate::*;

/// Represents a value that can be either static or dynamic.
///
/// This is useful for options that accept both a plain value and a reactive
/// one, such as a resource's `enabled` flag.
///
/// A [`MaybeDyn`] is created through the [`From`] trait: from a static value,
/// from a signal, or from a closure returning the value.
///
/// Because Rust does not have specialization, the `From<T>` implementations
/// cannot be written generically; the [`impl_into_maybe_dyn!`] macro
/// generates them for a given type.
#[derive(Clone)]
pub enum MaybeDyn<T>
where
    T: Into<Self> + 'static,
{
    /// A static value.
    Static(T),
    /// A dynamic value backed by a signal.
    Signal(ReadSignal<T>),
    /// A derived dynamic value.
    Derived(Rc<dyn Fn() -> Self>),
}

impl<T: Into<Self> + 'static> MaybeDyn<T> {
    /// Get the value by consuming itself, avoiding a clone for static values.
    pub fn evaluate(self) -> T
    where
        T: Clone,
    {
        match self {
            Self::Static(value) => value,
            Self::Signal(signal) => signal.get_clone(),
            Self::Derived(f) => f().evaluate(),
        }
    }

    /// Get the value by copying it.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        match self {
            Self::Static(value) => *value,
            Self::Signal(value) => value.get(),
            Self::Derived(f) => f().evaluate(),
        }
    }

    /// Get the value by cloning it.
    pub fn get_clone(&self) -> T
    where
        T: Clone,
    {
        match self {
            Self::Static(value) => value.clone(),
            Self::Signal(value) => value.get_clone(),
            Self::Derived(f) => f().evaluate(),
        }
    }

    /// Track the reactive dependencies, if the value is dynamic.
    pub fn track(&self) {
        match self {
            Self::Static(_) => {}
            Self::Signal(signal) => signal.track(),
            Self::Derived(f) => f().track(),
        }
    }

    /// Tries to get the value statically, or returns `None` if dynamic.
    pub fn as_static(&self) -> Option<&T> {
        match self {
            Self::Static(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Into<Self>> From<ReadSignal<T>> for MaybeDyn<T> {
    fn from(val: ReadSignal<T>) -> Self {
        MaybeDyn::Signal(val)
    }
}

impl<T: Into<Self>> From<Signal<T>> for MaybeDyn<T> {
    fn from(val: Signal<T>) -> Self {
        MaybeDyn::Signal(*val)
    }
}

impl<F, U, T: Into<Self>> From<F> for MaybeDyn<T>
where
    F: Fn() -> U + 'static,
    U: Into<MaybeDyn<T>>,
{
    fn from(f: F) -> Self {
        MaybeDyn::Derived(Rc::new(move || f().into()))
    }
}

/// A macro that makes it easy to write `Into<MaybeDyn<T>>` implementations
/// for types defined in the current crate.
#[macro_export]
macro_rules! impl_into_maybe_dyn {
    ($ty:ty $(; $($from:ty),*)?) => {
        impl From<$ty> for $crate::MaybeDyn<$ty> {
            fn from(val: $ty) -> Self {
                $crate::MaybeDyn::Static(val)
            }
        }

        $(
            $(
                impl From<$from> for $crate::MaybeDyn<$ty> {
                    fn from(val: $from) -> Self {
                        $crate::MaybeDyn::Static(val.into())
                    }
                }
            )*
        )?
    };
}

impl_into_maybe_dyn!(bool);
impl_into_maybe_dyn!(Cow<'static, str>; &'static str, String);

impl_into_maybe_dyn!(f32);
impl_into_maybe_dyn!(f64);

impl_into_maybe_dyn!(i8);
impl_into_maybe_dyn!(i16);
impl_into_maybe_dyn!(i32);
impl_into_maybe_dyn!(i64);
impl_into_maybe_dyn!(isize);
impl_into_maybe_dyn!(u8);
impl_into_maybe_dyn!(u16);
impl_into_maybe_dyn!(u32);
impl_into_maybe_dyn!(u64);
impl_into_maybe_dyn!(usize);

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn static_and_dynamic_values() {
        let _ = create_root(|| {
            let stat: MaybeDyn<bool> = true.into();
            assert!(stat.get());
            assert_eq!(stat.as_static(), Some(&true));

            let signal = create_signal(false);
            let dynamic: MaybeDyn<bool> = signal.into();
            assert!(!dynamic.get());
            signal.set(true);
            assert!(dynamic.get());
            assert_eq!(dynamic.as_static(), None);
        });
    }

    #[test]
    fn derived_value_is_tracked() {
        let _ = create_root(|| {
            let signal = create_signal(1);
            let derived: MaybeDyn<bool> = (move || signal.get() > 2).into();
            let runs = create_signal(0);
            let derived2 = derived.clone();
            create_effect(move || {
                derived2.track();
                runs.set(runs.get_untracked() + 1);
            });
            assert_eq!(runs.get(), 1);

            signal.set(5);
            assert_eq!(runs.get(), 2);
        });
    }
}

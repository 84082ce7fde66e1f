//! The dynamic value tree returned by slice bodies.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::select::SelectMarker;

/// A callable slice member: a query (read-only) or an action (may write
/// through the slice's setter).
///
/// Methods compare by identity, so a method is equal only to clones of
/// itself.
#[derive(Clone)]
pub struct Method(Rc<dyn Fn(&[Value]) -> Value>);

impl Method {
    /// Wrap a closure as a slice method.
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Wrap a closure that takes no arguments and returns nothing.
    pub fn action(f: impl Fn() + 'static) -> Self {
        Self::new(move |_| {
            f();
            Value::Unit
        })
    }

    /// Invoke the method.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method")
    }
}

/// A value in a slice's public tree: data, methods, and select markers, all
/// as one tagged union so the tree can be walked for marker resolution.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// The unit value.
    #[default]
    Unit,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(Rc<str>),
    /// An ordered list of values.
    List(Vec<Value>),
    /// An ordered map of named values.
    Map(IndexMap<&'static str, Value>),
    /// A callable member.
    Method(Method),
    /// A lazy reference to another slice, resolved on first read.
    Select(SelectMarker),
}

impl Value {
    /// Build a [`Value::Map`] from name/value pairs, preserving order.
    pub fn map(entries: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Build a [`Value::List`].
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// Build a [`Value::Method`] from a closure.
    pub fn method(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Method(Method::new(f))
    }

    /// Build a no-argument, no-result [`Value::Method`].
    pub fn action(f: impl Fn() + 'static) -> Self {
        Value::Method(Method::action(f))
    }

    /// Look up a member of a [`Value::Map`].
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Invoke the value as a method, if it is one.
    pub fn try_call(&self, args: &[Value]) -> Option<Value> {
        match self {
            Value::Method(method) => Some(method.call(args)),
            _ => None,
        }
    }

    /// Invoke the value as a method.
    ///
    /// # Panics
    /// Panics if the value is not a method.
    #[track_caller]
    pub fn call(&self, args: &[Value]) -> Value {
        self.try_call(args)
            .unwrap_or_else(|| panic!("value is not callable: {self:?}"))
    }

    /// The boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The float payload, if any.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The method payload, if any.
    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Value::Method(method) => Some(method),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}
impl From<Method> for Value {
    fn from(m: Method) -> Self {
        Value::Method(m)
    }
}

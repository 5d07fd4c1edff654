//! Props and State
//!
//! Components receive two externally-assigned inputs: props from their
//! parent and their own state. Both are [`Props`] records: ordered maps from
//! key to [`Value`], shared behind an `Rc` so cloning is cheap and reference
//! identity is observable.
//!
//! # Shallow Equality
//!
//! Deciding whether an input "changed" uses shallow equality, and the exact
//! rule is part of the public contract:
//!
//! - Two records are shallow-equal if they are the same allocation, or if
//!   they have the same number of keys and every key of one is present in
//!   the other with a [`Value::same`] value.
//! - Scalars (`Null`, `Bool`, `Int`, `Str`) compare by value.
//! - `Float` compares like `Object.is`: `NaN` is the same as `NaN`, `0.0`
//!   and `-0.0` differ. `Int(1)` and `Float(1.0)` are different values.
//! - Everything behind an `Rc` (`List`, `Record`, `Object`, `Render`)
//!   compares by reference. A new record with identical contents is a
//!   different value.
//!
//! Nothing is compared recursively.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RenderError;
use crate::host::Node;

/// A render function passed as a prop.
pub type RenderFn = Rc<dyn Fn() -> Result<Node, RenderError>>;

/// A single prop or state value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Record(Props),
    /// Any other shared object, compared by reference.
    Object(Rc<dyn Any>),
    /// A render callback, e.g. the child of an `Observer`.
    Render(RenderFn),
}

impl Value {
    /// Wrap a render function.
    pub fn render<F>(f: F) -> Self
    where
        F: Fn() -> Result<Node, RenderError> + 'static,
    {
        Self::Render(Rc::new(f))
    }

    /// Wrap any value as a reference-compared object.
    pub fn object<T: Any>(value: T) -> Self {
        Self::Object(Rc::new(value))
    }

    /// Shallow sameness, see the module docs.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => same_float(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Record(a), Self::Record(b)) => Props::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Self::Render(a), Self::Render(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Props> {
        match self {
            Self::Record(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_render(&self) -> Option<&RenderFn> {
        match self {
            Self::Render(f) => Some(f),
            _ => None,
        }
    }

    /// Downcast an `Object` value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn same_float(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

/// Values are equal when they are [`Value::same`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Record(props) => f.debug_tuple("Record").field(props).finish(),
            Self::Object(object) => write!(f, "Object({:p})", Rc::as_ptr(object)),
            Self::Render(render) => write!(f, "Render({:p})", Rc::as_ptr(render)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            other => write!(f, "{other:?}"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    &str => Str,
    String => Str,
    Props => Record,
    Vec<Value> => List,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An ordered record of values, used for both props and state.
///
/// Builders return a new record; an existing record is never mutated, so a
/// `Props` held elsewhere keeps its contents and its identity.
#[derive(Clone, Default)]
pub struct Props(Rc<IndexMap<String, Value>>);

/// Component state uses the same record type as props.
pub type State = Props;

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Rc::make_mut(&mut self.0).insert(key.into(), value.into());
        self
    }

    /// Return a new record with `partial` merged over this one.
    ///
    /// Always a fresh allocation, even when `partial` is empty.
    pub fn merge(&self, partial: &Props) -> Props {
        let mut merged = (*self.0).clone();
        for (key, value) in partial.iter() {
            merged.insert(key.clone(), value.clone());
        }
        Props(Rc::new(merged))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Whether both records are the same allocation.
    pub fn ptr_eq(a: &Props, b: &Props) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Props(Rc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

/// Shallow comparison used when deciding whether an input changed.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

impl ShallowEq for Props {
    fn shallow_eq(&self, other: &Self) -> bool {
        shallow_equal(self, other)
    }
}

impl ShallowEq for Value {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

/// Compare two records key by key at the top level.
pub fn shallow_equal(a: &Props, b: &Props) -> bool {
    if Props::ptr_eq(a, b) {
        return true;
    }
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .all(|(key, value)| b.get(key).is_some_and(|other| value.same(other)))
}

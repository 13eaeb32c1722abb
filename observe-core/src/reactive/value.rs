//! Values and Containers
//!
//! A `Container` is a shared map of named properties. A property starts out
//! as a plain stored field; `observe` turns it into a reactive cell whose
//! reads are tracked and whose writes notify.
//!
//! # Equality
//!
//! `PartialEq` on `Value` is an identity comparison, the one cell writes use
//! to decide whether anything changed:
//!
//! - numbers, booleans and strings compare by value (`NaN` is never equal)
//! - `Int` and `Float` compare numerically, so `Int(1) == Float(1.0)` and
//!   writing `1.0` over `1` is not a change
//! - containers compare by reference, never structurally
//!
//! Mutating a nested container in place is therefore invisible to the cell
//! that holds it. Only the nested container's own reactive fields notify.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

use super::cell::{self, ReactiveCell};
use super::error::ReactiveError;

/// A dynamically typed property value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Container(Container),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Container(_) => "container",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> ReactiveError {
        ReactiveError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Container(c) => fmt::Debug::fmt(c, f),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(c)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Builds plain (non-reactive) containers. Arrays become containers keyed
/// by their decimal indices.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                let container = Container::new();
                for (index, item) in items.into_iter().enumerate() {
                    container.set(index.to_string(), Value::from(item));
                }
                Value::Container(container)
            }
            serde_json::Value::Object(fields) => {
                let container = Container::new();
                for (key, item) in fields {
                    container.set(key, Value::from(item));
                }
                Value::Container(container)
            }
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = ReactiveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| value.mismatch("bool"))
    }
}

impl TryFrom<Value> for i64 {
    type Error = ReactiveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_i64().ok_or_else(|| value.mismatch("int"))
    }
}

impl TryFrom<Value> for f64 {
    type Error = ReactiveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| value.mismatch("float"))
    }
}

impl TryFrom<Value> for String {
    type Error = ReactiveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(other.mismatch("string")),
        }
    }
}

impl TryFrom<Value> for Container {
    type Error = ReactiveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Container(c) => Ok(c),
            other => Err(other.mismatch("container")),
        }
    }
}

/// Serializes an untracked snapshot.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Container(c) => c.serialize(serializer),
        }
    }
}

/// A stored property: either a plain field or an intercepted one.
#[derive(Clone)]
enum Slot {
    Plain(Value),
    Reactive(Rc<ReactiveCell>),
}

/// A shared, insertion-ordered map of named properties.
///
/// Cloning yields another handle to the same container.
#[derive(Clone, Default)]
pub struct Container {
    slots: Rc<RefCell<IndexMap<String, Slot>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from `(key, value)` pairs, all plain.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let container = Self::new();
        for (key, value) in pairs {
            container.set(key, value);
        }
        container
    }

    fn slot(&self, key: &str) -> Option<Slot> {
        self.slots.borrow().get(key).cloned()
    }

    /// Read a property.
    ///
    /// Reading a reactive property inside a running watcher subscribes the
    /// watcher to it.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.slot(key)? {
            Slot::Plain(value) => Some(value),
            Slot::Reactive(cell) => Some(cell.get()),
        }
    }

    /// Like `get`, but a missing property is an error.
    pub fn try_get(&self, key: &str) -> Result<Value, ReactiveError> {
        self.get(key).ok_or_else(|| ReactiveError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Read a property without subscribing the running watcher.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        match self.slot(key)? {
            Slot::Plain(value) => Some(value),
            Slot::Reactive(cell) => Some(cell.get_untracked()),
        }
    }

    /// Write a property.
    ///
    /// Reactive properties go through their cell's write path and may run
    /// watchers before this returns. Other keys are stored as plain fields.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        let cell = match self.slots.borrow().get(&key) {
            Some(Slot::Reactive(cell)) => Some(cell.clone()),
            _ => None,
        };

        match cell {
            Some(cell) => cell.set(value),
            None => {
                self.slots.borrow_mut().insert(key, Slot::Plain(value));
            }
        }
    }

    /// Make `key` reactive with `value` as its initial value.
    pub fn observe(&self, key: impl Into<String>, value: impl Into<Value>) {
        cell::observe(self, key, value);
    }

    pub(crate) fn install(&self, key: String, cell: Rc<ReactiveCell>) {
        self.slots.borrow_mut().insert(key, Slot::Reactive(cell));
    }

    /// The reactive cell behind `key`, if the property is reactive.
    pub fn cell(&self, key: &str) -> Option<Rc<ReactiveCell>> {
        match self.slot(key)? {
            Slot::Reactive(cell) => Some(cell),
            Slot::Plain(_) => None,
        }
    }

    pub fn is_reactive(&self, key: &str) -> bool {
        self.cell(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.borrow().contains_key(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.slots.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.slots, &other.slots)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.slots) as *const () as usize
    }

    /// Untracked snapshot as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, ReactiveError> {
        serde_json::to_value(self).map_err(ReactiveError::Snapshot)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("keys", &self.keys())
            .finish()
    }
}

thread_local! {
    static SERIALIZING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Removes a container from the in-progress set when serialization leaves it.
struct Visit(usize);

impl Drop for Visit {
    fn drop(&mut self) {
        SERIALIZING.with(|set| {
            set.borrow_mut().remove(&self.0);
        });
    }
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let addr = self.addr();
        if !SERIALIZING.with(|set| set.borrow_mut().insert(addr)) {
            return Err(S::Error::custom("cyclic container"));
        }
        let _visit = Visit(addr);

        let keys = self.keys();
        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in keys {
            let value = self.get_untracked(&key).unwrap_or_default();
            map.serialize_entry(&key, &value)?;
        }
        map.end()
    }
}

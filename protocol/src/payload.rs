//! Dynamic payload values produced by instrumentation.
//!
//! Instrumentation captures arbitrary application data: values that were never
//! assigned, floating point results that are not finite, callables, and shared
//! objects that refer back to themselves. None of these cross a JSON wire, so
//! [`Payload::to_json`] remaps each of them to a descriptive placeholder string
//! instead of failing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde_json::{Map, Number, Value};

pub const UNDEFINED_PLACEHOLDER: &str = "~~~ undefined ~~~";
pub const NAN_PLACEHOLDER: &str = "~~~ NaN ~~~";
pub const INFINITY_PLACEHOLDER: &str = "~~~ Infinity ~~~";
pub const NEG_INFINITY_PLACEHOLDER: &str = "~~~ -Infinity ~~~";
pub const CIRCULAR_PLACEHOLDER: &str = "~~~ Circular Reference ~~~";
const ANONYMOUS_FUNCTION: &str = "anonymous";

/// A value captured from the application, before it is made transport-safe.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// Absent value. As a whole payload it means "no payload".
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    /// Any float, including NaN and the infinities.
    Number(f64),
    String(String),
    Array(Vec<Payload>),
    Object(BTreeMap<String, Payload>),
    /// A callable, optionally named.
    Function(Option<String>),
    /// A reference-counted node; the only way to build a cycle.
    Shared(SharedPayload),
}

impl Payload {
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Payload)>,
    {
        Payload::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn function(name: impl Into<String>) -> Self {
        Payload::Function(Some(name.into()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Payload::Undefined)
    }

    /// Converts the value into plain JSON, substituting placeholders for
    /// anything JSON cannot carry. Never fails.
    ///
    /// A top-level [`Payload::Undefined`] becomes `null`; nested ones become
    /// the undefined placeholder so the inspector can show them.
    pub fn to_json(&self) -> Value {
        if self.is_undefined() {
            return Value::Null;
        }
        let mut ancestors = Vec::new();
        self.to_json_inner(&mut ancestors)
    }

    fn to_json_inner(&self, ancestors: &mut Vec<usize>) -> Value {
        match self {
            Payload::Undefined => Value::String(UNDEFINED_PLACEHOLDER.to_string()),
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Integer(i) => Value::Number((*i).into()),
            Payload::Unsigned(u) => Value::Number((*u).into()),
            Payload::Number(n) => number_to_json(*n),
            Payload::String(s) => Value::String(s.clone()),
            Payload::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json_inner(ancestors))
                    .collect(),
            ),
            Payload::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json_inner(ancestors)))
                    .collect::<Map<String, Value>>(),
            ),
            Payload::Function(name) => Value::String(format!(
                "~~~ {}() ~~~",
                name.as_deref().unwrap_or(ANONYMOUS_FUNCTION)
            )),
            Payload::Shared(shared) => {
                let key = shared.key();
                // Only a node already on the current path is a cycle; a node
                // reached twice through siblings is serialized twice.
                if ancestors.contains(&key) {
                    return Value::String(CIRCULAR_PLACEHOLDER.to_string());
                }
                ancestors.push(key);
                let value = shared.read().to_json_inner(ancestors);
                ancestors.pop();
                value
            }
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.is_nan() {
        Value::String(NAN_PLACEHOLDER.to_string())
    } else if n == f64::INFINITY {
        Value::String(INFINITY_PLACEHOLDER.to_string())
    } else if n == f64::NEG_INFINITY {
        Value::String(NEG_INFINITY_PLACEHOLDER.to_string())
    } else {
        Number::from_f64(n).map_or_else(|| Value::String(NAN_PLACEHOLDER.to_string()), Value::Number)
    }
}

/// Shared, mutable payload node.
///
/// Cloning shares the node. Setting a node to contain itself (directly or via
/// descendants) forms a reference cycle that is never freed; that mirrors the
/// object graphs instrumentation captures and is acceptable for diagnostic data.
#[derive(Clone, Default)]
pub struct SharedPayload(Arc<RwLock<Payload>>);

impl SharedPayload {
    pub fn new(value: Payload) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn set(&self, value: Payload) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Inserts `value` under `key` if the node holds an object.
    pub fn insert(&self, key: impl Into<String>, value: Payload) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if let Payload::Object(entries) = &mut *guard {
            entries.insert(key.into(), value);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Payload> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for SharedPayload {
    // Never recurse: the node may be part of a cycle.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedPayload({:#x})", self.key())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Payload::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Payload::Unsigned(u)
                } else {
                    Payload::Number(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::Array(items.into_iter().map(Payload::from).collect()),
            Value::Object(entries) => Payload::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Payload::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::String(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<u64> for Payload {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Payload::Unsigned(value), Payload::Integer)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Number(value)
    }
}

impl From<SharedPayload> for Payload {
    fn from(value: SharedPayload) -> Self {
        Payload::Shared(value)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(values: Vec<T>) -> Self {
        Payload::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Null, Into::into)
    }
}

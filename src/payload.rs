//! Payloads and selectors.
//!
//! A [`Payload`] is a JSON object: some of its fields are routing keys, the
//! rest is data. A [`Selector`] is the set of key/value pairs a binding
//! requires a payload to carry before its handler fires.
//!
//! # Example
//!
//! ```
//! use keyroute::payload::{to_payload, Selector};
//! use serde_json::json;
//!
//! let selector = Selector::new().key("_act", "data");
//! let action = to_payload(json!({"_act": "data", "test": "demo"})).unwrap();
//! assert!(selector.matches(&action));
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{DispatchError, Result};

/// A routable payload: selector keys plus arbitrary data fields.
pub type Payload = Map<String, Value>;

/// Convert a JSON value into a [`Payload`].
///
/// # Errors
///
/// Returns [`DispatchError::NotAnObject`] unless `value` is a JSON object.
pub fn to_payload(value: Value) -> Result<Payload> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DispatchError::NotAnObject),
    }
}

/// Split `action` into `(keys, data)` around the given key names.
///
/// `keys` holds only the named fields present in `action`; `data` holds
/// every other field. Together they reconstruct `action` exactly.
pub fn split_keys(action: &Payload, key_names: &[String]) -> (Payload, Payload) {
    let mut keys = Map::new();
    let mut data = Map::new();

    for (name, value) in action {
        if key_names.iter().any(|k| k == name) {
            keys.insert(name.clone(), value.clone());
        } else {
            data.insert(name.clone(), value.clone());
        }
    }

    (keys, data)
}

/// Key/value pairs a payload must carry for a binding to fire.
///
/// Values must be scalars (`null`, bool, number, string). Comparison is exact
/// with no coercion across types: `1` never matches `"1"`. Numbers compare by
/// value, so `1` matches `1.0` and `0` matches `-0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pairs: BTreeMap<String, Value>,
}

impl Selector {
    /// Create an empty selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required key/value pair.
    pub fn key(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pairs.insert(name.into(), value.into());
        self
    }

    /// Get the required value for a key.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.pairs.get(name)
    }

    /// Key names in sorted order.
    pub fn key_names(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Number of key/value pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if the selector has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Check that the selector is non-empty and holds only scalar values.
    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(DispatchError::EmptySelector);
        }
        for (name, value) in &self.pairs {
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                return Err(DispatchError::InvalidSelector { key: name.clone() });
            }
        }
        Ok(())
    }

    /// Check if every pair is present in `action` with an equal value.
    pub fn matches(&self, action: &Payload) -> bool {
        self.pairs
            .iter()
            .all(|(name, expected)| action.get(name).is_some_and(|v| scalar_eq(v, expected)))
    }
}

/// JSON equality, except numbers compare by numeric value.
fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(l), Some(r)) = (x.as_i64(), y.as_i64()) {
                return l == r;
            }
            if let (Some(l), Some(r)) = (x.as_u64(), y.as_u64()) {
                return l == r;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            }
        }
        _ => a == b,
    }
}

impl TryFrom<Value> for Selector {
    type Error = DispatchError;

    fn try_from(value: Value) -> Result<Self> {
        Ok(Self::from(to_payload(value)?))
    }
}

impl From<Payload> for Selector {
    fn from(map: Payload) -> Self {
        Self {
            pairs: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Selector {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

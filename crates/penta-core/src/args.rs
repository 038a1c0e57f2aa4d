//! Bound handler arguments.

use crate::error::{PentaError, PentaResult};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A shared dependency value.
pub type Injected = Arc<dyn Any + Send + Sync>;

/// One bound argument.
#[derive(Clone)]
pub enum Bound {
    /// A validated value from a source group.
    Value(Value),
    /// The output of a dependency provider.
    Injected(Injected),
    /// Placeholder for a request-object parameter; read it through `Call::request`.
    Request,
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Injected(_) => f.write_str("Injected(..)"),
            Self::Request => f.write_str("Request"),
        }
    }
}

/// Handler arguments keyed by declared parameter name, in declaration order.
///
/// # Example
///
/// ```
/// use penta_core::BoundArgs;
/// use serde_json::json;
///
/// let mut args = BoundArgs::new();
/// args.insert_value("item_id", json!(123));
/// let item_id: i64 = args.get("item_id").unwrap();
/// assert_eq!(item_id, 123);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    entries: IndexMap<String, Bound>,
}

impl BoundArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a validated value.
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), Bound::Value(value));
    }

    /// Binds a dependency output.
    pub fn insert_injected(&mut self, name: impl Into<String>, value: Injected) {
        self.entries.insert(name.into(), Bound::Injected(value));
    }

    /// Marks a request-object parameter.
    pub fn insert_request(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), Bound::Request);
    }

    /// Deserializes a bound value into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> PentaResult<T> {
        let value = self.value(name).ok_or_else(|| unbound(name))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            PentaError::internal_with_source(format!("argument '{name}' has an unexpected shape"), e)
        })
    }

    /// Returns the raw JSON value of a bound argument.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.entries.get(name) {
            Some(Bound::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns a dependency output downcast to `T`.
    pub fn injected<T: Any + Send + Sync>(&self, name: &str) -> PentaResult<Arc<T>> {
        match self.entries.get(name) {
            Some(Bound::Injected(value)) => Arc::clone(value).downcast::<T>().map_err(|_| {
                PentaError::internal(format!(
                    "dependency argument '{name}' is not a {}",
                    std::any::type_name::<T>()
                ))
            }),
            _ => Err(unbound(name)),
        }
    }

    /// Returns the bound entry for a name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&Bound> {
        self.entries.get(name)
    }

    /// Returns `true` if the name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over the bound names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of bound arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value arguments as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .filter_map(|(name, bound)| match bound {
                    Bound::Value(value) => Some((name.clone(), value.clone())),
                    _ => None,
                })
                .collect(),
        )
    }
}

fn unbound(name: &str) -> PentaError {
    PentaError::internal(format!("argument '{name}' was not bound"))
}

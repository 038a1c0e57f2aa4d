//! Per-path method dispatch.
//!
//! A [`MethodTable`] holds every operation registered under one exact path
//! template (a "path view"). Lookups by method either hit or report the set of
//! methods that would have been accepted.

use http::Method;

/// Maps HTTP methods to values for a single path template.
///
/// The first value registered for a method wins; later registrations for the
/// same method are ignored and reported by [`MethodTable::insert`].
///
/// # Example
///
/// ```rust
/// use penta_router::MethodTable;
/// use http::Method;
///
/// let mut table = MethodTable::new();
/// table.insert(Method::GET, "list_items");
/// table.insert(Method::POST, "create_item");
///
/// assert_eq!(table.get(&Method::GET), Some(&"list_items"));
/// assert_eq!(table.get(&Method::DELETE), None);
/// assert_eq!(table.allowed_methods(), vec![Method::GET, Method::POST]);
/// ```
#[derive(Debug, Clone)]
pub struct MethodTable<T> {
    entries: Vec<(Method, T)>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> MethodTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a value for a method.
    ///
    /// Returns `false` (and keeps the existing value) if the method is taken.
    pub fn insert(&mut self, method: Method, value: T) -> bool {
        if self.contains(&method) {
            return false;
        }
        self.entries.push((method, value));
        true
    }

    /// Returns the value for a method.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the method is registered.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.entries.iter().any(|(m, _)| m == method)
    }

    /// Returns the registered methods in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Iterates over `(method, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Method, &T)> {
        self.entries.iter().map(|(m, value)| (m, value))
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Renders methods as an `Allow` header value.
#[must_use]
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

//! Ordered route resolution.
//!
//! Templates are tried in registration order and the first structural match
//! wins. A structural match whose method table lacks the request method ends
//! resolution with [`RouteError::MethodNotAllowed`]; later templates are not
//! consulted.

use http::Method;

use crate::error::RouteError;
use crate::method_table::MethodTable;
use crate::params::Params;
use crate::path::{normalize_path, PathTemplate};

/// One path template and the values registered under it.
#[derive(Debug, Clone)]
pub struct RouteEntry<T> {
    template: PathTemplate,
    methods: MethodTable<T>,
}

impl<T> RouteEntry<T> {
    /// Returns the template.
    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Returns the method table.
    #[must_use]
    pub fn methods(&self) -> &MethodTable<T> {
        &self.methods
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// The value registered for the method.
    pub value: &'a T,
    /// Captured path parameters.
    pub params: Params,
    /// The matched template.
    pub template: &'a PathTemplate,
}

/// An ordered collection of path templates.
///
/// # Example
///
/// ```rust
/// use penta_router::{RouteError, RouteTree};
/// use http::Method;
///
/// let mut tree = RouteTree::new();
/// tree.insert("/items/{int:item_id}", &[Method::GET], "get_item").unwrap();
/// tree.insert("/items/{slug}", &[Method::GET], "get_by_slug").unwrap();
///
/// let found = tree.resolve(&Method::GET, "/items/5").unwrap();
/// assert_eq!(*found.value, "get_item");
/// assert_eq!(found.params.get("item_id"), Some("5"));
///
/// let found = tree.resolve(&Method::GET, "/items/blue-hat").unwrap();
/// assert_eq!(*found.value, "get_by_slug");
///
/// assert!(matches!(
///     tree.resolve(&Method::POST, "/items/5"),
///     Err(RouteError::MethodNotAllowed { .. })
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct RouteTree<T> {
    entries: Vec<RouteEntry<T>>,
}

impl<T> Default for RouteTree<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> RouteTree<T> {
    /// Registers a value for each method under a template.
    ///
    /// A template identical to an existing one (after normalization) joins
    /// that entry instead of creating a new one. Methods already taken in the
    /// entry keep their first value.
    pub fn insert(&mut self, template: &str, methods: &[Method], value: T) -> Result<(), RouteError> {
        let template = PathTemplate::parse(template)?;
        let index = match self
            .entries
            .iter()
            .position(|entry| entry.template.as_str() == template.as_str())
        {
            Some(index) => index,
            None => {
                self.entries.push(RouteEntry {
                    template,
                    methods: MethodTable::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        for method in methods {
            entry.methods.insert(method.clone(), value.clone());
        }
        Ok(())
    }
}

impl<T> RouteTree<T> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a request method and path.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch<'_, T>, RouteError> {
        let normalized = normalize_path(path);
        for entry in &self.entries {
            if let Some(params) = entry.template.match_path(&normalized) {
                return match entry.methods.get(method) {
                    Some(value) => Ok(RouteMatch {
                        value,
                        params,
                        template: &entry.template,
                    }),
                    None => Err(RouteError::MethodNotAllowed {
                        method: method.clone(),
                        allowed: entry.methods.allowed_methods(),
                    }),
                };
            }
        }
        Err(RouteError::NotFound {
            path: path.to_string(),
        })
    }

    /// Iterates over entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry<T>> {
        self.entries.iter()
    }

    /// Returns the number of distinct templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no template is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

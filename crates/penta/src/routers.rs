//! Routers group operations under a common prefix and shared settings.
//!
//! A router may be mounted once. Mounting happens when the API is built, which
//! is also when router settings are folded into each operation.

use crate::operation::{AuthSetting, Operation};
use crate::responses::{DumpOptions, DumpSettings};
use http::Method;
use parking_lot::Mutex;
use penta_core::{ParamSource, PentaError, PentaResult};
use penta_extract::{classify, FieldType, ParamSpec};
use penta_middleware::{Authenticator, Throttle};
use penta_router::{join_prefix, PathTemplate};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
struct Registered {
    path: String,
    methods: Vec<Method>,
    operation: Arc<Operation>,
    specs: Vec<ParamSpec>,
}

#[derive(Default)]
struct RouterState {
    operations: Vec<Registered>,
    children: Vec<(String, Router)>,
    auth: AuthSetting,
    throttles: Option<Vec<Arc<dyn Throttle>>>,
    tags: Option<Vec<String>>,
    dump: DumpSettings,
    attached: bool,
}

/// Settings passed down while mounting.
#[derive(Clone, Default)]
pub(crate) struct Inherited {
    pub auth: Vec<Arc<dyn Authenticator>>,
    pub throttles: Vec<Arc<dyn Throttle>>,
    pub tags: Option<Vec<String>>,
    pub dump: DumpSettings,
}

/// An operation with its full path and every inherited setting applied.
pub(crate) struct Mounted {
    pub path: String,
    pub methods: Vec<Method>,
    pub operation: Arc<Operation>,
    pub specs: Vec<ParamSpec>,
    pub auth: Vec<Arc<dyn Authenticator>>,
    pub throttles: Vec<Arc<dyn Throttle>>,
    pub tags: Vec<String>,
    pub dump: DumpOptions,
}

impl std::fmt::Debug for Mounted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mounted")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("tags", &self.tags)
            .field("dump", &self.dump)
            .finish_non_exhaustive()
    }
}

/// A group of operations.
///
/// `Router` is a cheap handle; clones share the same operations. Settings
/// methods consume and return the handle so they chain at construction time.
///
/// # Example
///
/// ```rust
/// use penta::{Operation, Router};
/// use penta::core::{Call, PentaResult, Reply};
///
/// fn list(_call: Call) -> PentaResult<Reply> {
///     Ok(Reply::new(serde_json::json!([])))
/// }
///
/// let items = Router::new().tags(["items"]);
/// items.get("/", Operation::sync("items::list", list))?;
/// # Ok::<(), penta::core::PentaError>(())
/// ```
#[derive(Clone, Default)]
pub struct Router {
    state: Arc<Mutex<RouterState>>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an authenticator to the router chain.
    #[must_use]
    pub fn auth(self, authenticator: impl Authenticator) -> Self {
        self.state.lock().auth.push(Arc::new(authenticator));
        self
    }

    /// Turns authentication off for every operation that does not set its own.
    #[must_use]
    pub fn no_auth(self) -> Self {
        self.state.lock().auth = AuthSetting::Disabled;
        self
    }

    /// Appends a throttle to the router list.
    #[must_use]
    pub fn throttle(self, throttle: impl Throttle) -> Self {
        self.state
            .lock()
            .throttles
            .get_or_insert_with(Vec::new)
            .push(Arc::new(throttle));
        self
    }

    /// Turns throttling off below this router.
    #[must_use]
    pub fn no_throttle(self) -> Self {
        self.state.lock().throttles = Some(Vec::new());
        self
    }

    /// Sets tags for operations that declare none.
    #[must_use]
    pub fn tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Default for response `by_alias`.
    #[must_use]
    pub fn by_alias(self, on: bool) -> Self {
        self.state.lock().dump.by_alias = Some(on);
        self
    }

    /// Default for response `exclude_none`.
    #[must_use]
    pub fn exclude_none(self, on: bool) -> Self {
        self.state.lock().dump.exclude_none = Some(on);
        self
    }

    /// Default for response `exclude_defaults`.
    #[must_use]
    pub fn exclude_defaults(self, on: bool) -> Self {
        self.state.lock().dump.exclude_defaults = Some(on);
        self
    }

    /// Registers `operation` at `path` for `methods`.
    ///
    /// Parameters are classified immediately against the path template.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid template, a parameter
    /// that cannot be classified, a path parameter missing from the template,
    /// or a router that is already mounted.
    pub fn add_operation(&self, path: &str, methods: &[Method], operation: Operation) -> PentaResult<()> {
        if methods.is_empty() {
            return Err(PentaError::configuration(format!(
                "operation '{}' at '{path}' declares no methods",
                operation.name()
            )));
        }
        let template = PathTemplate::parse(path)
            .map_err(|e| PentaError::configuration(e.to_string()))?;
        let names = template.param_names();

        let specs = operation
            .params()
            .iter()
            .map(|param| classify(param, &names))
            .collect::<PentaResult<Vec<_>>>()?;
        check_path_specs(&specs, &names, path)?;

        let mut state = self.state.lock();
        if state.attached {
            return Err(PentaError::configuration(format!(
                "cannot add '{}' to a router that is already mounted",
                operation.name()
            )));
        }
        tracing::debug!(
            operation = operation.name(),
            path,
            methods = ?methods,
            "operation registered"
        );
        state.operations.push(Registered {
            path: path.to_string(),
            methods: methods.to_vec(),
            operation: Arc::new(operation),
            specs,
        });
        Ok(())
    }

    /// Registers a `GET` operation.
    ///
    /// # Errors
    ///
    /// See [`Router::add_operation`].
    pub fn get(&self, path: &str, operation: Operation) -> PentaResult<()> {
        self.add_operation(path, &[Method::GET], operation)
    }

    /// Registers a `POST` operation.
    ///
    /// # Errors
    ///
    /// See [`Router::add_operation`].
    pub fn post(&self, path: &str, operation: Operation) -> PentaResult<()> {
        self.add_operation(path, &[Method::POST], operation)
    }

    /// Registers a `PUT` operation.
    ///
    /// # Errors
    ///
    /// See [`Router::add_operation`].
    pub fn put(&self, path: &str, operation: Operation) -> PentaResult<()> {
        self.add_operation(path, &[Method::PUT], operation)
    }

    /// Registers a `PATCH` operation.
    ///
    /// # Errors
    ///
    /// See [`Router::add_operation`].
    pub fn patch(&self, path: &str, operation: Operation) -> PentaResult<()> {
        self.add_operation(path, &[Method::PATCH], operation)
    }

    /// Registers a `DELETE` operation.
    ///
    /// # Errors
    ///
    /// See [`Router::add_operation`].
    pub fn delete(&self, path: &str, operation: Operation) -> PentaResult<()> {
        self.add_operation(path, &[Method::DELETE], operation)
    }

    /// Nests `router` under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when nesting a router into itself or
    /// into a router that is already mounted.
    pub fn add_router(&self, prefix: &str, router: &Router) -> PentaResult<()> {
        if Arc::ptr_eq(&self.state, &router.state) {
            return Err(PentaError::configuration("a router cannot be nested in itself"));
        }
        let mut state = self.state.lock();
        if state.attached {
            return Err(PentaError::configuration(format!(
                "cannot nest a router at '{prefix}' into a router that is already mounted"
            )));
        }
        state.children.push((prefix.to_string(), router.clone()));
        Ok(())
    }

    /// Returns `true` once the router has been mounted by an API.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// Returns the number of operations registered directly on this router.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().operations.len()
    }

    /// Returns `true` if no operation is registered directly on this router.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mounts the router and its children under `prefix`.
    pub(crate) fn attach(&self, prefix: &str, parent: &Inherited, out: &mut Vec<Mounted>) -> PentaResult<()> {
        let (operations, children, inherited) = {
            let mut state = self.state.lock();
            if state.attached {
                return Err(PentaError::configuration(format!(
                    "router at '{}' is already mounted",
                    join_prefix(prefix, "")
                )));
            }
            state.attached = true;
            let inherited = Inherited {
                auth: state.auth.resolve(&parent.auth),
                throttles: state
                    .throttles
                    .clone()
                    .unwrap_or_else(|| parent.throttles.clone()),
                tags: state.tags.clone().or_else(|| parent.tags.clone()),
                dump: state.dump.inherit(parent.dump),
            };
            (state.operations.clone(), state.children.clone(), inherited)
        };

        for registered in operations {
            let operation = &registered.operation;
            out.push(Mounted {
                path: join_prefix(prefix, &registered.path),
                auth: operation.auth.resolve(&inherited.auth),
                throttles: operation
                    .throttles
                    .clone()
                    .unwrap_or_else(|| inherited.throttles.clone()),
                tags: operation
                    .tags
                    .clone()
                    .or_else(|| inherited.tags.clone())
                    .unwrap_or_default(),
                dump: operation.dump.inherit(inherited.dump).resolve(),
                methods: registered.methods,
                specs: registered.specs,
                operation: registered.operation,
            });
        }

        for (child_prefix, child) in children {
            child.attach(&join_prefix(prefix, &child_prefix), &inherited, out)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Router")
            .field("operations", &state.operations.len())
            .field("children", &state.children.len())
            .field("attached", &state.attached)
            .finish()
    }
}

/// Checks that every path-sourced parameter names a template capture.
pub(crate) fn check_path_specs(specs: &[ParamSpec], names: &[&str], path: &str) -> PentaResult<()> {
    for spec in specs.iter().filter(|s| s.source == ParamSource::Path) {
        let wires: Vec<String> = match (&spec.ty, spec.flatten) {
            (Some(FieldType::Model(model)), true) => {
                model.fields.iter().map(|f| f.wire_name().to_string()).collect()
            }
            _ => vec![spec.wire_name()],
        };
        if let Some(missing) = wires.iter().find(|w| !names.contains(&w.as_str())) {
            return Err(PentaError::configuration(format!(
                "path parameter '{missing}' of '{}' is not captured by '{path}'",
                spec.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use penta_core::{Call, Reply};
    use penta_extract::{Field, Model, Param};

    fn noop(_call: Call) -> PentaResult<Reply> {
        Ok(Reply::empty())
    }

    fn mount(router: &Router) -> PentaResult<Vec<Mounted>> {
        let mut out = Vec::new();
        router.attach("", &Inherited::default(), &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_register_and_mount() {
        let root = Router::new();
        let items = Router::new().tags(["items"]);
        items
            .get(
                "/{item_id}",
                Operation::sync("items::get_item", noop).param(Param::new("item_id", FieldType::Integer)),
            )
            .unwrap();
        root.add_router("/items", &items).unwrap();

        let mounted = mount(&root).unwrap();
        assert_eq!(mounted.len(), 1);
        assert_eq!(mounted[0].path, "items/{item_id}");
        assert_eq!(mounted[0].tags, vec!["items".to_string()]);
        assert_eq!(mounted[0].specs[0].source, ParamSource::Path);
        assert!(items.is_attached());
    }

    #[test]
    fn test_mount_twice_rejected() {
        let router = Router::new();
        router.get("/", Operation::sync("a", noop)).unwrap();
        mount(&router).unwrap();

        let err = mount(&router).unwrap_err();
        assert!(err.to_string().contains("already mounted"));

        let err = router.get("/b", Operation::sync("b", noop)).unwrap_err();
        assert!(matches!(err, PentaError::Configuration { .. }));
    }

    #[test]
    fn test_cycles_rejected() {
        let a = Router::new();
        assert!(a.add_router("/self", &a.clone()).is_err());

        let b = Router::new();
        a.add_router("/b", &b).unwrap();
        b.add_router("/a", &a).unwrap();
        assert!(mount(&a).is_err());
    }

    #[test]
    fn test_path_param_must_be_captured() {
        let router = Router::new();
        let err = router
            .get(
                "/items",
                Operation::sync("a", noop).param(Param::new("item_id", FieldType::Integer).path()),
            )
            .unwrap_err();
        assert!(err.to_string().contains("item_id"));

        let filters = Model::new("Filters").field(Field::new("year", FieldType::Integer));
        let err = router
            .get(
                "/events/{month}",
                Operation::sync("b", noop).param(Param::new("filters", FieldType::model(filters)).path()),
            )
            .unwrap_err();
        assert!(err.to_string().contains("year"));
    }

    #[test]
    fn test_settings_inherit_nearest() {
        let root = Router::new().tags(["root"]).exclude_none(true);
        let child = Router::new().by_alias(true).no_throttle();
        child.get("/x", Operation::sync("x", noop)).unwrap();
        child
            .get("/y", Operation::sync("y", noop).tag("own").by_alias(false))
            .unwrap();
        root.add_router("/c", &child).unwrap();

        let mounted = mount(&root).unwrap();
        let x = &mounted[0];
        assert_eq!(x.path, "c/x");
        assert_eq!(x.tags, vec!["root".to_string()]);
        assert!(x.dump.by_alias && x.dump.exclude_none);
        assert!(x.throttles.is_empty());

        let y = &mounted[1];
        assert_eq!(y.tags, vec!["own".to_string()]);
        assert!(!y.dump.by_alias);
    }
}

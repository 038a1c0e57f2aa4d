//! Dependency providers and their resolution order.
//!
//! A [`Dependency`] is a named provider with its own declared parameters.
//! Parameters of dependencies are validated together with the operation's
//! own parameters; the provider then receives them through [`Resolved`].
//! Dependencies may depend on each other. The graph is checked for cycles
//! when the API is built, and each dependency runs at most once per request.

use crate::param::{classify, Param, ParamKind, ParamSpec};
use indexmap::{IndexMap, IndexSet};
use penta_core::{BoundArgs, BoxFuture, Identity, Injected, PentaError, PentaResult, Request};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type SyncProvider = Arc<dyn Fn(&Resolved) -> PentaResult<Injected> + Send + Sync>;
type AsyncProvider =
    Arc<dyn Fn(Resolved) -> BoxFuture<'static, PentaResult<Injected>> + Send + Sync>;

#[derive(Clone)]
enum Provider {
    Sync(SyncProvider),
    Async(AsyncProvider),
}

/// Inputs handed to a dependency provider.
#[derive(Debug, Clone)]
pub struct Resolved {
    args: BoundArgs,
    request: Arc<Request>,
    identity: Identity,
}

impl Resolved {
    /// Deserializes a validated parameter value.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> PentaResult<T> {
        self.args.get(name)
    }

    /// Returns the output of a nested dependency.
    pub fn dep<T: Any + Send + Sync>(&self, name: &str) -> PentaResult<Arc<T>> {
        self.args.injected(name)
    }

    /// Returns all bound arguments.
    #[must_use]
    pub fn args(&self) -> &BoundArgs {
        &self.args
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// A named value provider.
///
/// # Example
///
/// ```rust
/// use penta_extract::{Dependency, FieldType, Param};
///
/// let pagination = Dependency::sync("pagination", |resolved| {
///     let limit: i64 = resolved.arg("limit")?;
///     Ok(limit.clamp(1, 100))
/// })
/// .param(Param::new("limit", FieldType::Integer).default(serde_json::json!(20)));
///
/// assert_eq!(pagination.name(), "pagination");
/// ```
#[derive(Clone)]
pub struct Dependency {
    name: String,
    params: Vec<Param>,
    provider: Provider,
}

impl Dependency {
    /// Creates a dependency backed by a plain function.
    pub fn sync<T, F>(name: impl Into<String>, provider: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Resolved) -> PentaResult<T> + Send + Sync + 'static,
    {
        let provider: SyncProvider = Arc::new(move |resolved: &Resolved| {
            provider(resolved).map(|value| Arc::new(value) as Injected)
        });
        Self {
            name: name.into(),
            params: Vec::new(),
            provider: Provider::Sync(provider),
        }
    }

    /// Creates a dependency backed by a function returning a future.
    pub fn asynchronous<T, F, Fut>(name: impl Into<String>, provider: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Resolved) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PentaResult<T>> + Send + 'static,
    {
        let provider: AsyncProvider = Arc::new(move |resolved: Resolved| {
            let future = provider(resolved);
            Box::pin(async move { future.await.map(|value| Arc::new(value) as Injected) })
                as BoxFuture<'static, PentaResult<Injected>>
        });
        Self {
            name: name.into(),
            params: Vec::new(),
            provider: Provider::Async(provider),
        }
    }

    /// Declares a parameter of the provider.
    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Returns `true` for providers returning futures.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        matches!(self.provider, Provider::Async(_))
    }

    /// Names of the dependencies this one requires, in declaration order.
    pub fn requires(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(|param| match param.kind() {
            ParamKind::Depends(dep) => Some(dep.as_str()),
            _ => None,
        })
    }

    /// Classifies the parameters against an operation's path template.
    pub fn specs(&self, path_names: &[&str]) -> PentaResult<Vec<ParamSpec>> {
        self.params
            .iter()
            .map(|param| classify(param, path_names))
            .collect()
    }

    async fn provide(&self, resolved: Resolved) -> PentaResult<Injected> {
        match &self.provider {
            Provider::Sync(provider) => provider(&resolved),
            Provider::Async(provider) => provider(resolved).await,
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("async", &self.is_async())
            .finish()
    }
}

/// All dependencies known to an API.
#[derive(Debug, Clone, Default)]
pub struct DependencyRegistry {
    entries: IndexMap<String, Arc<Dependency>>,
}

impl DependencyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency. Names are unique.
    pub fn register(&mut self, dependency: Dependency) -> PentaResult<()> {
        if self.entries.contains_key(dependency.name()) {
            return Err(PentaError::configuration(format!(
                "dependency '{}' is registered twice",
                dependency.name()
            )));
        }
        self.entries
            .insert(dependency.name().to_string(), Arc::new(dependency));
        Ok(())
    }

    /// Looks up a dependency.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Dependency>> {
        self.entries.get(name)
    }

    /// Returns the number of dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every registered dependency for unknown names and cycles.
    pub fn validate(&self) -> PentaResult<()> {
        let names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        self.plan(names).map(|_| ())
    }

    /// Orders the dependencies needed by `roots` so that each one comes
    /// after everything it requires.
    pub fn plan<'a, I>(&self, roots: I) -> PentaResult<Vec<Arc<Dependency>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ordered = IndexSet::new();
        let mut stack = Vec::new();
        for root in roots {
            self.visit(root, &mut stack, &mut ordered)?;
        }
        Ok(ordered
            .into_iter()
            .filter_map(|name| self.entries.get(name).cloned())
            .collect())
    }

    fn visit<'s>(
        &'s self,
        name: &str,
        stack: &mut Vec<&'s str>,
        ordered: &mut IndexSet<&'s str>,
    ) -> PentaResult<()> {
        if ordered.contains(name) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|n| *n == name) {
            let mut cycle: Vec<&str> = stack[start..].to_vec();
            cycle.push(name);
            return Err(PentaError::configuration(format!(
                "dependency cycle detected: {}",
                cycle.join(" -> ")
            )));
        }
        let (key, dependency) = self
            .entries
            .get_key_value(name)
            .ok_or_else(|| PentaError::configuration(format!("unknown dependency '{name}'")))?;

        stack.push(key.as_str());
        for required in dependency.requires() {
            self.visit(required, stack, ordered)?;
        }
        stack.pop();
        ordered.insert(key.as_str());
        Ok(())
    }
}

/// Runs a resolution plan for one request.
///
/// `values` are the validated group values keyed by parameter name. Returns
/// each dependency output keyed by dependency name.
pub async fn resolve_plan(
    plan: &[Arc<Dependency>],
    values: &Map<String, Value>,
    request: &Arc<Request>,
    identity: &Identity,
) -> PentaResult<HashMap<String, Injected>> {
    let mut outputs: HashMap<String, Injected> = HashMap::with_capacity(plan.len());
    for dependency in plan {
        if outputs.contains_key(dependency.name()) {
            continue;
        }
        let mut args = BoundArgs::new();
        for param in dependency.params() {
            match param.kind() {
                ParamKind::Value(_) => {
                    args.insert_value(
                        param.name(),
                        values.get(param.name()).cloned().unwrap_or(Value::Null),
                    );
                }
                ParamKind::Request => args.insert_request(param.name()),
                ParamKind::Depends(required) => {
                    let output = outputs.get(required).cloned().ok_or_else(|| {
                        PentaError::internal(format!(
                            "dependency '{required}' was not resolved before '{}'",
                            dependency.name()
                        ))
                    })?;
                    args.insert_injected(param.name(), output);
                }
            }
        }
        tracing::trace!(dependency = dependency.name(), "resolving dependency");
        let resolved = Resolved {
            args,
            request: Arc::clone(request),
            identity: identity.clone(),
        };
        let output = dependency.provide(resolved).await?;
        outputs.insert(dependency.name().to_string(), output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unit(name: &str) -> Dependency {
        Dependency::sync(name, |_| Ok(()))
    }

    #[test]
    fn test_plan_is_topological() {
        let mut registry = DependencyRegistry::new();
        registry.register(unit("db")).unwrap();
        registry
            .register(unit("user").param(Param::depends("db", "db")))
            .unwrap();
        registry
            .register(
                unit("perms")
                    .param(Param::depends("user", "user"))
                    .param(Param::depends("db", "db")),
            )
            .unwrap();

        let plan = registry.plan(["perms"]).unwrap();
        let names: Vec<&str> = plan.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["db", "user", "perms"]);
    }

    #[test]
    fn test_cycle_is_named() {
        let mut registry = DependencyRegistry::new();
        registry.register(unit("a").param(Param::depends("b", "b"))).unwrap();
        registry.register(unit("b").param(Param::depends("a", "a"))).unwrap();

        let err = registry.validate().unwrap_err();
        assert_eq!(err.category(), penta_core::ErrorCategory::Configuration);
        assert!(err.to_string().contains("a -> b -> a"), "{err}");
    }

    #[test]
    fn test_unknown_and_duplicate() {
        let mut registry = DependencyRegistry::new();
        registry.register(unit("a").param(Param::depends("x", "missing"))).unwrap();
        let err = registry.plan(["a"]).unwrap_err();
        assert!(err.to_string().contains("unknown dependency 'missing'"));
        assert!(registry.register(unit("a")).is_err());
    }

    #[tokio::test]
    async fn test_resolve_plan_runs_each_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = DependencyRegistry::new();
        registry
            .register(
                Dependency::sync("limit", move |resolved| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    resolved.arg::<i64>("limit")
                })
                .param(Param::new("limit", FieldType::Integer).default(json!(20))),
            )
            .unwrap();
        registry
            .register(
                Dependency::asynchronous("page", |resolved: Resolved| async move {
                    let limit = resolved.dep::<i64>("limit")?;
                    Ok::<_, PentaError>(format!("first {limit}"))
                })
                .param(Param::depends("limit", "limit")),
            )
            .unwrap();

        let plan = registry.plan(["page", "limit"]).unwrap();
        assert_eq!(plan.len(), 2);

        let request = Arc::new(Request::builder().uri("/items").build());
        let mut values = Map::new();
        values.insert("limit".into(), json!(5));
        let outputs = resolve_plan(&plan, &values, &request, &Identity::Anonymous)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let page = Arc::clone(&outputs["page"]).downcast::<String>().unwrap();
        assert_eq!(page.as_str(), "first 5");
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let dependency = Arc::new(Dependency::sync("auth", |_| -> PentaResult<()> {
            Err(PentaError::forbidden())
        }));
        let request = Arc::new(Request::builder().build());
        let err = resolve_plan(&[dependency], &Map::new(), &request, &Identity::Anonymous)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);
    }
}

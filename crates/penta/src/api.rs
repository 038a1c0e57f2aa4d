//! The API: builder, compiled operations, schema document and reverse URLs.

use crate::exceptions::{ErrorMatcher, ErrorTranslator, ExceptionHandler};
use crate::operation::Operation;
use crate::registry;
use crate::renderer::{JsonRenderer, Renderer};
use crate::responses::{DumpOptions, ResponseShapes};
use crate::routers::{check_path_specs, Inherited, Mounted, Router};
use http::Method;
use indexmap::IndexMap;
use penta_config::{PentaConfig, ServerEntry};
use penta_core::{PentaError, PentaResult, Reply, Request};
use penta_docs::{DocsPage, OpenApi, OperationDoc, SchemaDocGenerator};
use penta_extract::{
    merge_specs, Dependency, DependencyRegistry, OperationSchemas, ParamSpec, SchemaSynthesizer,
};
use penta_middleware::{AuthGate, Authenticator, Throttle, ThrottleGate};
use penta_router::{PathTemplate, Params, RouteTree};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// An operation ready to serve requests.
pub(crate) struct CompiledOperation {
    pub operation: Arc<Operation>,
    pub template: PathTemplate,
    pub methods: Vec<Method>,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub auth: AuthGate,
    pub throttle: ThrottleGate,
    pub plan: Vec<Arc<Dependency>>,
    pub specs: Vec<ParamSpec>,
    pub schemas: OperationSchemas,
    pub responses: ResponseShapes,
    pub dump: DumpOptions,
}

/// Builds an [`Api`].
///
/// # Example
///
/// ```rust
/// use penta::core::{Call, PentaResult, Reply};
/// use penta::{Api, Operation};
///
/// fn health(_call: Call) -> PentaResult<Reply> {
///     Ok(Reply::new(serde_json::json!({ "status": "ok" })))
/// }
///
/// let api = Api::builder()
///     .title("Inventory")
///     .version("2.1.0")
///     .skip_registry(true)
///     .get("/health", Operation::sync("health", health))
///     .build()?;
/// assert_eq!(api.namespace(), "api-2.1.0");
/// # Ok::<(), penta::core::PentaError>(())
/// ```
#[must_use]
pub struct ApiBuilder {
    title: String,
    version: String,
    description: Option<String>,
    servers: Vec<ServerEntry>,
    urls_namespace: Option<String>,
    openapi_url: Option<String>,
    docs_url: Option<String>,
    docs_page: DocsPage,
    openapi_extra: Map<String, Value>,
    debug: bool,
    skip_registry: bool,
    auth: Vec<Arc<dyn Authenticator>>,
    throttles: Vec<Arc<dyn Throttle>>,
    root: Router,
    routers: Vec<(String, Router)>,
    dependencies: Vec<Dependency>,
    custom_handlers: Vec<(ErrorMatcher, ExceptionHandler)>,
    renderer: Arc<dyn Renderer>,
    synthesizer: Option<Arc<SchemaSynthesizer>>,
    pending: Option<PentaError>,
}

impl Default for ApiBuilder {
    fn default() -> Self {
        Self {
            title: "Penta".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            servers: Vec::new(),
            urls_namespace: None,
            openapi_url: Some("/openapi.json".to_string()),
            docs_url: Some("/docs".to_string()),
            docs_page: DocsPage::swagger(),
            openapi_extra: Map::new(),
            debug: false,
            skip_registry: false,
            auth: Vec::new(),
            throttles: Vec::new(),
            root: Router::new(),
            routers: Vec::new(),
            dependencies: Vec::new(),
            custom_handlers: Vec::new(),
            renderer: Arc::new(JsonRenderer),
            synthesizer: None,
            pending: None,
        }
    }
}

impl ApiBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from loaded configuration.
    pub fn from_config(config: &PentaConfig) -> Self {
        let mut builder = Self::new()
            .title(config.api.title.clone())
            .version(config.api.version.clone())
            .debug(config.api.debug)
            .skip_registry(config.api.skip_registry)
            .openapi_url(config.docs.openapi_url.clone());
        builder.description = config.api.description.clone();
        builder.urls_namespace = config.api.urls_namespace.clone();
        builder.docs_url = config.docs.docs_url.clone();
        builder.servers = config.docs.servers.clone();
        builder
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a server entry to the schema document.
    pub fn server(mut self, url: impl Into<String>, description: Option<&str>) -> Self {
        self.servers.push(ServerEntry {
            url: url.into(),
            description: description.map(str::to_string),
        });
        self
    }

    /// Sets the namespace used for reverse URL lookup.
    pub fn urls_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.urls_namespace = Some(namespace.into());
        self
    }

    /// Serves the schema document at `url`.
    pub fn openapi_url(mut self, url: impl Into<String>) -> Self {
        self.openapi_url = Some(url.into());
        self
    }

    /// Stops serving the schema document and the docs page.
    pub fn no_openapi(mut self) -> Self {
        self.openapi_url = None;
        self
    }

    /// Serves the interactive docs page at `url`.
    pub fn docs_url(mut self, url: impl Into<String>) -> Self {
        self.docs_url = Some(url.into());
        self
    }

    /// Stops serving the docs page.
    pub fn no_docs(mut self) -> Self {
        self.docs_url = None;
        self
    }

    /// Picks the docs page flavor.
    pub fn docs_page(mut self, page: DocsPage) -> Self {
        self.docs_page = page;
        self
    }

    /// Merges extra top-level keys into the schema document.
    pub fn openapi_extra(mut self, extra: Map<String, Value>) -> Self {
        self.openapi_extra.extend(extra);
        self
    }

    /// Enables debug error output.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Skips the namespace uniqueness check.
    pub fn skip_registry(mut self, skip: bool) -> Self {
        self.skip_registry = skip;
        self
    }

    /// Appends an API-wide authenticator.
    pub fn auth(mut self, authenticator: impl Authenticator) -> Self {
        self.auth.push(Arc::new(authenticator));
        self
    }

    /// Appends an API-wide throttle.
    pub fn throttle(mut self, throttle: impl Throttle) -> Self {
        self.throttles.push(Arc::new(throttle));
        self
    }

    /// Sets the payload renderer.
    pub fn renderer(mut self, renderer: impl Renderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Uses a private schema cache instead of the process-wide one.
    pub fn synthesizer(mut self, synthesizer: Arc<SchemaSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Registers a dependency provider.
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Registers an exception handler, replacing one for the same matcher.
    pub fn exception_handler<F>(mut self, matcher: ErrorMatcher, handler: F) -> Self
    where
        F: Fn(&Request, &PentaError) -> Reply + Send + Sync + 'static,
    {
        self.custom_handlers.push((matcher, Arc::new(handler)));
        self
    }

    /// Mounts `router` under `prefix`.
    pub fn add_router(mut self, prefix: impl Into<String>, router: &Router) -> Self {
        self.routers.push((prefix.into(), router.clone()));
        self
    }

    /// Registers an operation on the API's own router.
    ///
    /// A registration error is reported by [`ApiBuilder::build`].
    pub fn route(mut self, path: &str, methods: &[Method], operation: Operation) -> Self {
        if self.pending.is_none() {
            if let Err(error) = self.root.add_operation(path, methods, operation) {
                self.pending = Some(error);
            }
        }
        self
    }

    /// Registers a `GET` operation on the API's own router.
    pub fn get(self, path: &str, operation: Operation) -> Self {
        self.route(path, &[Method::GET], operation)
    }

    /// Registers a `POST` operation on the API's own router.
    pub fn post(self, path: &str, operation: Operation) -> Self {
        self.route(path, &[Method::POST], operation)
    }

    /// Registers a `PUT` operation on the API's own router.
    pub fn put(self, path: &str, operation: Operation) -> Self {
        self.route(path, &[Method::PUT], operation)
    }

    /// Registers a `PATCH` operation on the API's own router.
    pub fn patch(self, path: &str, operation: Operation) -> Self {
        self.route(path, &[Method::PATCH], operation)
    }

    /// Registers a `DELETE` operation on the API's own router.
    pub fn delete(self, path: &str, operation: Operation) -> Self {
        self.route(path, &[Method::DELETE], operation)
    }

    /// Mounts every router, compiles every operation and registers the
    /// namespace.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a router mounted twice, an unknown
    /// or cyclic dependency, conflicting parameter declarations, an invalid
    /// response declaration, two operations on the same path and method, or
    /// a namespace that is already registered.
    pub fn build(self) -> PentaResult<Api> {
        if let Some(error) = self.pending {
            return Err(error);
        }
        let namespace = self
            .urls_namespace
            .clone()
            .unwrap_or_else(|| format!("api-{}", self.version));
        registry::check(&namespace, self.skip_registry)?;

        let inherited = Inherited {
            auth: self.auth.clone(),
            throttles: self.throttles.clone(),
            tags: None,
            dump: Default::default(),
        };
        let mut mounted = Vec::new();
        self.root.attach("", &inherited, &mut mounted)?;
        for (prefix, router) in &self.routers {
            router.attach(prefix, &inherited, &mut mounted)?;
        }

        let mut dependencies = DependencyRegistry::new();
        for dependency in self.dependencies {
            dependencies.register(dependency)?;
        }
        dependencies.validate()?;

        let synthesizer: &SchemaSynthesizer = match &self.synthesizer {
            Some(synthesizer) => synthesizer,
            None => SchemaSynthesizer::global(),
        };

        let mut tree = RouteTree::new();
        let mut seen: HashSet<(String, Method)> = HashSet::new();
        let mut url_names: IndexMap<String, usize> = IndexMap::new();
        let mut operations = Vec::with_capacity(mounted.len());
        for entry in mounted {
            let index = operations.len();
            let compiled = compile(entry, &dependencies, synthesizer)?;
            for method in &compiled.methods {
                if !seen.insert((compiled.template.as_str().to_string(), method.clone())) {
                    return Err(PentaError::configuration(format!(
                        "{method} {} is registered twice",
                        compiled.template.as_str()
                    )));
                }
            }
            tree.insert(compiled.template.as_str(), &compiled.methods, index)
                .map_err(|e| PentaError::configuration(e.to_string()))?;
            url_names
                .entry(compiled.operation.reverse_name().to_string())
                .or_insert(index);
            operations.push(compiled);
        }

        let mut ids = HashSet::new();
        for op in operations.iter().filter(|op| op.operation.is_documented()) {
            if !ids.insert(op.operation_id.as_str()) {
                tracing::warn!(
                    operation_id = %op.operation_id,
                    "duplicate operation id in schema document"
                );
            }
        }

        let mut translator = ErrorTranslator::with_defaults(self.debug);
        for (matcher, handler) in self.custom_handlers {
            translator.add(matcher, handler);
        }

        registry::register(&namespace, self.skip_registry)?;
        tracing::info!(
            title = %self.title,
            version = %self.version,
            namespace = %namespace,
            operations = operations.len(),
            "API built"
        );

        Ok(Api {
            title: self.title,
            version: self.version,
            description: self.description,
            servers: self.servers,
            namespace,
            openapi_url: self.openapi_url,
            docs_url: self.docs_url,
            docs_page: self.docs_page,
            openapi_extra: self.openapi_extra,
            debug: self.debug,
            operations,
            tree,
            url_names,
            translator,
            renderer: self.renderer,
        })
    }
}

fn compile(
    entry: Mounted,
    dependencies: &DependencyRegistry,
    synthesizer: &SchemaSynthesizer,
) -> PentaResult<CompiledOperation> {
    let template = PathTemplate::parse(&entry.path).map_err(|e| PentaError::configuration(e.to_string()))?;
    let names = template.param_names();

    let roots = entry
        .specs
        .iter()
        .filter_map(|spec| spec.dependency.as_deref());
    let plan = dependencies.plan(roots)?;

    let mut dependency_specs = Vec::new();
    for dependency in &plan {
        let specs = dependency.specs(&names)?;
        check_path_specs(&specs, &names, &entry.path)?;
        dependency_specs.extend(specs);
    }
    let merged = merge_specs(entry.specs.iter().cloned().chain(dependency_specs))?;
    let schemas = synthesizer.synthesize(&entry.operation.handler().id(), &merged)?;
    let responses = ResponseShapes::compile(&entry.operation.responses)?;

    Ok(CompiledOperation {
        operation_id: entry.operation.effective_operation_id(),
        auth: AuthGate::new(entry.auth),
        throttle: ThrottleGate::new(entry.throttles),
        tags: entry.tags,
        dump: entry.dump,
        methods: entry.methods,
        specs: entry.specs,
        operation: entry.operation,
        template,
        plan,
        schemas,
        responses,
    })
}

/// A built API.
///
/// An `Api` is immutable and can be shared across tasks; see
/// [`Api::handle`] for request dispatch.
pub struct Api {
    title: String,
    version: String,
    description: Option<String>,
    servers: Vec<ServerEntry>,
    namespace: String,
    pub(crate) openapi_url: Option<String>,
    pub(crate) docs_url: Option<String>,
    pub(crate) docs_page: DocsPage,
    openapi_extra: Map<String, Value>,
    debug: bool,
    pub(crate) operations: Vec<CompiledOperation>,
    pub(crate) tree: RouteTree<usize>,
    url_names: IndexMap<String, usize>,
    pub(crate) translator: ErrorTranslator,
    pub(crate) renderer: Arc<dyn Renderer>,
}

impl Api {
    /// Starts building an API.
    pub fn builder() -> ApiBuilder {
        ApiBuilder::new()
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the URL namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns `true` in debug mode.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if the API has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operation ids in registration order.
    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|op| op.operation_id.as_str())
    }

    /// Generates the schema document.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a schema cannot be generated.
    pub fn openapi(&self) -> PentaResult<OpenApi> {
        let mut generator = SchemaDocGenerator::new(&self.title, &self.version)
            .openapi_extra(self.openapi_extra.clone());
        if let Some(description) = &self.description {
            generator = generator.description(description);
        }
        for server in &self.servers {
            generator = generator.server(&server.url, server.description.clone());
        }

        let docs: Vec<OperationDoc> = self.operations.iter().map(operation_doc).collect();
        generator
            .generate(&docs)
            .map_err(|e| PentaError::internal_with_source("failed to generate the schema document", e))
    }

    /// Generates the schema document as JSON.
    ///
    /// # Errors
    ///
    /// Returns an internal error if generation or serialization fails.
    pub fn generate_schema_document(&self) -> PentaResult<Value> {
        let document = self.openapi()?;
        serde_json::to_value(&document)
            .map_err(|e| PentaError::internal_with_source("failed to serialize the schema document", e))
    }

    /// Builds the URL of a named operation.
    ///
    /// `name` is either the operation's reverse name or `namespace:name`.
    /// Returns `None` for an unknown name, another namespace, or missing
    /// parameters.
    #[must_use]
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let name = match name.split_once(':') {
            Some((namespace, name)) if namespace == self.namespace => name,
            Some(_) => return None,
            None => name,
        };
        let index = *self.url_names.get(name)?;
        let params: Params = params.iter().copied().collect();
        self.operations.get(index)?.template.render(&params)
    }
}

fn operation_doc(op: &CompiledOperation) -> OperationDoc {
    let operation = &op.operation;
    let mut doc = OperationDoc::new(op.template.openapi_path(), op.methods.clone(), &op.operation_id);
    doc.summary = Some(operation.effective_summary());
    doc.description = operation.description_text().map(str::to_string);
    doc.tags = op.tags.clone();
    doc.deprecated = operation.is_deprecated();
    doc.include_in_schema = operation.is_documented();
    doc.schemas = op.schemas.clone();
    doc.responses = op.responses.docs().clone();
    doc.security = op.auth.security_schemes();
    doc.openapi_extra = operation.extra().clone();
    doc
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("title", &self.title)
            .field("version", &self.version)
            .field("namespace", &self.namespace)
            .field("operations", &self.operations.len())
            .finish_non_exhaustive()
    }
}

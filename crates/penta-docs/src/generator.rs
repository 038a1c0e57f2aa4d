//! OpenAPI generation from registered operations.
//!
//! The generator only reads registration metadata: operation descriptors and
//! the group schemas the binder validates against. Handlers are never run.

use crate::error::{DocsError, DocsResult};
use crate::openapi::{
    Components, MediaType, OpenApi, Operation, Parameter, ParameterIn, RequestBody, Response,
    Schema, SecurityRequirement, SecurityScheme, Server, Tag,
};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use penta_core::naming::title_case;
use penta_core::ParamSource;
use penta_extract::{Binding, Constraints, Field, FieldType, Model, OperationSchema, OperationSchemas};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Everything the generator needs to know about one registered operation.
#[derive(Debug, Clone)]
pub struct OperationDoc {
    /// Path in OpenAPI form (`/items/{item_id}`).
    pub path: String,
    /// Methods served by the operation.
    pub methods: Vec<Method>,
    /// Operation identifier.
    pub operation_id: String,
    /// Short summary.
    pub summary: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Grouping tags.
    pub tags: Vec<String>,
    /// Whether the operation is deprecated.
    pub deprecated: bool,
    /// Whether the operation appears in the document at all.
    pub include_in_schema: bool,
    /// Group schemas, as bound at request time.
    pub schemas: OperationSchemas,
    /// Response models keyed by status code or `default`.
    pub responses: IndexMap<String, Option<Arc<Model>>>,
    /// Security schemes of the effective auth chain, by name.
    pub security: Vec<(String, SecurityScheme)>,
    /// Keys merged into the emitted operation object.
    pub openapi_extra: Map<String, Value>,
}

impl OperationDoc {
    /// Creates a descriptor with empty metadata.
    #[must_use]
    pub fn new(path: impl Into<String>, methods: Vec<Method>, operation_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods,
            operation_id: operation_id.into(),
            summary: None,
            description: None,
            tags: Vec::new(),
            deprecated: false,
            include_in_schema: true,
            schemas: OperationSchemas::default(),
            responses: IndexMap::new(),
            security: Vec::new(),
            openapi_extra: Map::new(),
        }
    }
}

/// Builds an [`OpenApi`] document from [`OperationDoc`]s.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use penta_docs::{OperationDoc, SchemaDocGenerator};
///
/// let generator = SchemaDocGenerator::new("Shop", "1.0.0");
/// let doc = generator
///     .generate(&[OperationDoc::new("/ping", vec![Method::GET], "ping")])
///     .unwrap();
/// assert!(doc.operation("/ping", &Method::GET).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct SchemaDocGenerator {
    title: String,
    version: String,
    description: Option<String>,
    servers: Vec<Server>,
    openapi_extra: Map<String, Value>,
}

impl SchemaDocGenerator {
    /// Creates a generator for an API.
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
            servers: Vec::new(),
            openapi_extra: Map::new(),
        }
    }

    /// Sets the API description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a server entry.
    #[must_use]
    pub fn server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    /// Keys merged into the document root.
    #[must_use]
    pub fn openapi_extra(mut self, extra: Map<String, Value>) -> Self {
        self.openapi_extra = extra;
        self
    }

    /// Generates the document.
    ///
    /// # Errors
    ///
    /// Returns an error when two different models share a component name,
    /// an operation uses a method OpenAPI cannot describe, or an
    /// `openapi_extra` merge produces an invalid object.
    pub fn generate(&self, operations: &[OperationDoc]) -> DocsResult<OpenApi> {
        let mut doc = OpenApi::new(&self.title, &self.version);
        doc.info.description.clone_from(&self.description);
        doc.servers.clone_from(&self.servers);

        let mut components = ComponentSet::default();
        let mut security_schemes = IndexMap::new();
        let mut tags: Vec<String> = Vec::new();
        let mut seen_ids: HashMap<&str, &str> = HashMap::new();

        for op in operations.iter().filter(|op| op.include_in_schema) {
            if let Some(previous) = seen_ids.insert(&op.operation_id, &op.path) {
                if previous != op.path {
                    tracing::warn!(
                        operation_id = %op.operation_id,
                        first = %previous,
                        second = %op.path,
                        "duplicate operationId in schema document"
                    );
                }
            }
            for tag in &op.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
            for (name, scheme) in &op.security {
                security_schemes
                    .entry(name.clone())
                    .or_insert_with(|| scheme.clone());
            }

            let operation = build_operation(op, &mut components)?;
            let item = doc.paths.entry(op.path.clone()).or_default();
            for method in &op.methods {
                if !item.set(method, operation.clone()) {
                    return Err(DocsError::InvalidOperation {
                        operation_id: op.operation_id.clone(),
                        reason: format!("method {method} cannot be documented"),
                    });
                }
            }
        }

        let components = Components {
            schemas: components.schemas,
            security_schemes,
        };
        if !components.is_empty() {
            doc.components = Some(components);
        }
        doc.tags = tags
            .into_iter()
            .map(|name| Tag {
                name,
                description: None,
            })
            .collect();

        if self.openapi_extra.is_empty() {
            Ok(doc)
        } else {
            merge_extra(&doc, &self.openapi_extra)
        }
    }
}

fn build_operation(op: &OperationDoc, components: &mut ComponentSet) -> DocsResult<Operation> {
    let mut parameters = Vec::new();
    for (source, location) in [
        (ParamSource::Path, ParameterIn::Path),
        (ParamSource::Query, ParameterIn::Query),
        (ParamSource::Header, ParameterIn::Header),
        (ParamSource::Cookie, ParameterIn::Cookie),
    ] {
        if let Some(schema) = op.schemas.get(source) {
            let hidden = hidden_fields(schema);
            for field in schema.model().fields.iter().filter(|f| !hidden.contains(f.name.as_str())) {
                parameters.push(Parameter {
                    name: field.wire_name().to_string(),
                    location,
                    description: field.description.clone(),
                    required: location == ParameterIn::Path || field.required,
                    schema: Some(components.field_schema(field)?),
                });
            }
        }
    }

    let mut operation = Operation {
        operation_id: op.operation_id.clone(),
        summary: op.summary.clone(),
        description: op.description.clone(),
        tags: op.tags.clone(),
        deprecated: op.deprecated,
        parameters,
        request_body: request_body(&op.schemas, components)?,
        responses: responses(&op.responses, components)?,
        security: op
            .security
            .iter()
            .map(|(name, _)| SecurityRequirement::from([(name.clone(), Vec::new())]))
            .collect(),
        extensions: Map::new(),
    };

    if !op.openapi_extra.is_empty() {
        operation = merge_extra(&operation, &op.openapi_extra)?;
    }
    Ok(operation)
}

/// Field names of parameters excluded from the document.
fn hidden_fields(schema: &OperationSchema) -> HashSet<&str> {
    let mut hidden = HashSet::new();
    for binding in schema.bindings() {
        let (param, fields) = match binding {
            Binding::Direct { param } => (param, std::slice::from_ref(param)),
            Binding::Flattened { param, fields } => (param, fields.as_slice()),
        };
        let documented = schema
            .specs()
            .iter()
            .find(|spec| &spec.name == param)
            .map_or(true, |spec| spec.include_in_schema);
        if !documented {
            hidden.extend(fields.iter().map(String::as_str));
        }
    }
    hidden
}

fn request_body(schemas: &OperationSchemas, components: &mut ComponentSet) -> DocsResult<Option<RequestBody>> {
    let mut content = IndexMap::new();
    let mut required = false;

    if let Some(body) = schemas.get(ParamSource::Body) {
        let hidden = hidden_fields(body);
        let wrapped_model = body
            .wrapped()
            .and_then(|key| body.model().fields.iter().find(|f| f.wire_name() == key));
        let schema = match wrapped_model {
            Some(field) => {
                required = field.required;
                components.type_schema(&field.ty)?
            }
            None => {
                let (schema, any_required) = components.inline_object(body.model(), &hidden)?;
                required = any_required;
                schema
            }
        };
        content.insert(JSON.to_string(), MediaType { schema: Some(schema) });
    }

    if let Some(form) = schemas.get(ParamSource::Form) {
        let hidden = hidden_fields(form);
        let (schema, any_required) = components.inline_object(form.model(), &hidden)?;
        required |= any_required;
        content.insert(FORM.to_string(), MediaType { schema: Some(schema) });
    }

    Ok((!content.is_empty()).then_some(RequestBody { required, content }))
}

fn responses(
    declared: &IndexMap<String, Option<Arc<Model>>>,
    components: &mut ComponentSet,
) -> DocsResult<IndexMap<String, Response>> {
    let mut out = IndexMap::new();
    if declared.is_empty() {
        out.insert(
            "200".to_string(),
            Response {
                description: "OK".to_string(),
                content: IndexMap::new(),
            },
        );
        return Ok(out);
    }

    for (status, model) in declared {
        let mut content = IndexMap::new();
        if let Some(model) = model {
            let schema = components.model_ref(model)?;
            content.insert(JSON.to_string(), MediaType { schema: Some(schema) });
        }
        out.insert(
            status.clone(),
            Response {
                description: status_description(status),
                content,
            },
        );
    }
    Ok(out)
}

fn status_description(status: &str) -> String {
    status
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Default Response")
        .to_string()
}

/// Component schemas collected while walking field types.
#[derive(Default)]
struct ComponentSet {
    schemas: IndexMap<String, Schema>,
    fingerprints: HashMap<String, Value>,
}

impl ComponentSet {
    fn field_schema(&mut self, field: &Field) -> DocsResult<Schema> {
        let mut schema = self.type_schema(&field.ty)?;
        apply_constraints(&mut schema, &field.constraints);
        if field.nullable {
            schema = Schema {
                any_of: vec![schema, Schema::null()],
                ..Schema::default()
            };
        }
        if schema.reference.is_none() {
            schema.title = Some(
                field
                    .title
                    .clone()
                    .unwrap_or_else(|| title_case(field.wire_name())),
            );
        }
        schema.description.clone_from(&field.description);
        schema.default.clone_from(&field.default);
        Ok(schema)
    }

    fn type_schema(&mut self, ty: &FieldType) -> DocsResult<Schema> {
        Ok(match ty {
            FieldType::String => Schema::string(),
            FieldType::Integer => Schema::integer(),
            FieldType::Number => Schema::number(),
            FieldType::Boolean => Schema::boolean(),
            FieldType::Uuid => Schema {
                format: Some("uuid".to_string()),
                ..Schema::string()
            },
            FieldType::Any => Schema::default(),
            FieldType::List(inner) => Schema::array(self.type_schema(inner)?),
            FieldType::Model(model) => self.model_ref(model)?,
        })
    }

    /// Registers `model` as a component and returns a reference to it.
    fn model_ref(&mut self, model: &Model) -> DocsResult<Schema> {
        let fingerprint = model.fingerprint();
        match self.fingerprints.get(&model.name) {
            Some(existing) if *existing == fingerprint => {}
            Some(_) => {
                return Err(DocsError::SchemaConversionError {
                    reason: format!("two different models are named '{}'", model.name),
                });
            }
            None => {
                self.fingerprints.insert(model.name.clone(), fingerprint);
                let (mut schema, _) = self.inline_object(model, &HashSet::new())?;
                schema.title = Some(model.name.clone());
                self.schemas.insert(model.name.clone(), schema);
            }
        }
        Ok(Schema::component(&model.name))
    }

    /// Builds an object schema; the flag reports whether any property is required.
    fn inline_object(&mut self, model: &Model, hidden: &HashSet<&str>) -> DocsResult<(Schema, bool)> {
        let mut schema = Schema::object();
        for field in model.fields.iter().filter(|f| !hidden.contains(f.name.as_str())) {
            let property = self.field_schema(field)?;
            schema = schema.property(field.wire_name(), property);
            if field.required {
                schema = schema.required_property(field.wire_name());
            }
        }
        if model.forbid_extra {
            schema.additional_properties = Some(false);
        }
        let any_required = !schema.required.is_empty();
        Ok((schema, any_required))
    }
}

fn apply_constraints(schema: &mut Schema, constraints: &Constraints) {
    schema.minimum = constraints.ge;
    schema.maximum = constraints.le;
    schema.exclusive_minimum = constraints.gt;
    schema.exclusive_maximum = constraints.lt;
    schema.min_length = constraints.min_length.and_then(|n| u64::try_from(n).ok());
    schema.max_length = constraints.max_length.and_then(|n| u64::try_from(n).ok());
    schema.pattern = constraints.pattern.as_ref().map(|p| p.as_str().to_string());
}

/// Deep-merges `extra` into the serialized form of `target`.
fn merge_extra<T>(target: &T, extra: &Map<String, Value>) -> DocsResult<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut value = serde_json::to_value(target)?;
    deep_merge(&mut value, &Value::Object(extra.clone()));
    Ok(serde_json::from_value(value)?)
}

fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penta_core::HandlerId;
    use penta_extract::{classify, Param, SchemaSynthesizer};
    use serde_json::json;

    struct Handler;

    fn schemas(path: &[&str], params: &[Param]) -> OperationSchemas {
        let specs: Vec<_> = params.iter().map(|p| classify(p, path).unwrap()).collect();
        SchemaSynthesizer::new()
            .synthesize(&HandlerId::of::<Handler>("handler"), &specs)
            .unwrap()
    }

    fn item_model() -> Model {
        Model::new("Item")
            .field(Field::new("name", FieldType::String))
            .field(Field::new("price", FieldType::Number).gt(0.0))
            .forbid_extra()
    }

    fn generate(op: OperationDoc) -> Value {
        let doc = SchemaDocGenerator::new("Test", "1.0.0").generate(&[op]).unwrap();
        serde_json::to_value(doc).unwrap()
    }

    #[test]
    fn test_path_and_query_parameters() {
        let mut op = OperationDoc::new("/items/{item_id}", vec![Method::GET], "get_item");
        op.schemas = schemas(
            &["item_id"],
            &[
                Param::new("item_id", FieldType::Integer),
                Param::new("q", FieldType::String).optional().max_length(50),
            ],
        );
        let doc = generate(op);
        let params = &doc["paths"]["/items/{item_id}"]["get"]["parameters"];
        assert_eq!(
            params[0],
            json!({
                "name": "item_id",
                "in": "path",
                "required": true,
                "schema": {"type": "integer", "title": "Item Id"}
            })
        );
        assert_eq!(params[1]["in"], "query");
        assert_eq!(params[1]["required"], false);
        assert_eq!(params[1]["schema"]["anyOf"][0]["maxLength"], 50);
        assert_eq!(doc["paths"]["/items/{item_id}"]["get"]["responses"]["200"]["description"], "OK");
    }

    #[test]
    fn test_wrapped_body_references_component() {
        let mut op = OperationDoc::new("/items", vec![Method::POST], "create_item");
        op.schemas = schemas(&[], &[Param::new("payload", FieldType::model(item_model()))]);
        op.responses.insert("201".to_string(), Some(Arc::new(item_model())));
        let doc = generate(op);

        let body = &doc["paths"]["/items"]["post"]["requestBody"];
        assert_eq!(body["required"], true);
        assert_eq!(
            body["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Item"
        );
        let item = &doc["components"]["schemas"]["Item"];
        assert_eq!(item["required"], json!(["name", "price"]));
        assert_eq!(item["additionalProperties"], false);
        assert_eq!(item["properties"]["price"]["exclusiveMinimum"], 0.0);

        let created = &doc["paths"]["/items"]["post"]["responses"]["201"];
        assert_eq!(created["description"], "Created");
        assert_eq!(
            created["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Item"
        );
    }

    #[test]
    fn test_multiple_body_params_are_inline() {
        let mut op = OperationDoc::new("/items", vec![Method::POST], "create_item");
        op.schemas = schemas(
            &[],
            &[
                Param::new("item", FieldType::model(item_model())),
                Param::new("importance", FieldType::Integer).body(),
            ],
        );
        let doc = generate(op);
        let schema = &doc["paths"]["/items"]["post"]["requestBody"]["content"]["application/json"]["schema"];
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["item"]["$ref"], "#/components/schemas/Item");
        assert_eq!(schema["properties"]["importance"]["type"], "integer");
    }

    #[test]
    fn test_form_body() {
        let mut op = OperationDoc::new("/login", vec![Method::POST], "login");
        op.schemas = schemas(
            &[],
            &[
                Param::new("username", FieldType::String).form(),
                Param::new("remember", FieldType::Boolean).form().default(json!(false)),
            ],
        );
        let doc = generate(op);
        let form = &doc["paths"]["/login"]["post"]["requestBody"]["content"][FORM]["schema"];
        assert_eq!(form["required"], json!(["username"]));
        assert_eq!(form["properties"]["remember"]["default"], false);
    }

    #[test]
    fn test_parameters_match_bound_fields() {
        let filters = Model::new("Filters")
            .field(Field::new("limit", FieldType::Integer).default(json!(10)))
            .field(Field::new("category_in", FieldType::String).alias("category__in").optional());
        let op_schemas = schemas(
            &[],
            &[
                Param::new("filters", FieldType::model(filters)).query(),
                Param::new("x_token", FieldType::String).header(),
                Param::new("session", FieldType::String).cookie().optional(),
            ],
        );
        let mut bound: Vec<(String, String)> = Vec::new();
        for (source, schema) in op_schemas.iter() {
            for field in &schema.model().fields {
                bound.push((source.as_str().to_string(), field.wire_name().to_string()));
            }
        }

        let mut op = OperationDoc::new("/search", vec![Method::GET], "search");
        op.schemas = op_schemas;
        let doc = generate(op);
        let documented: Vec<(String, String)> = doc["paths"]["/search"]["get"]["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| {
                (
                    p["in"].as_str().unwrap().to_string(),
                    p["name"].as_str().unwrap().to_string(),
                )
            })
            .collect();

        let mut bound_sorted = bound.clone();
        bound_sorted.sort();
        let mut documented_sorted = documented.clone();
        documented_sorted.sort();
        assert_eq!(bound_sorted, documented_sorted);
        assert!(documented.contains(&("query".to_string(), "category__in".to_string())));
        assert!(documented.contains(&("header".to_string(), "x-token".to_string())));
    }

    #[test]
    fn test_hidden_params_and_operations() {
        let mut visible = OperationDoc::new("/a", vec![Method::GET], "a");
        visible.schemas = schemas(
            &[],
            &[
                Param::new("shown", FieldType::String),
                Param::new("secret", FieldType::String).hidden(),
            ],
        );
        let mut hidden = OperationDoc::new("/b", vec![Method::GET], "b");
        hidden.include_in_schema = false;

        let doc = SchemaDocGenerator::new("Test", "1.0.0")
            .generate(&[visible, hidden])
            .unwrap();
        assert!(!doc.paths.contains_key("/b"));
        let params = &doc.operation("/a", &Method::GET).unwrap().parameters;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "shown");
    }

    #[test]
    fn test_security_tags_and_extra() {
        let mut op = OperationDoc::new("/me", vec![Method::GET, Method::HEAD], "me");
        op.tags = vec!["users".to_string()];
        op.deprecated = true;
        op.security = vec![(
            "ApiKeyHeader".to_string(),
            SecurityScheme::api_key(ParameterIn::Header, "X-API-Key"),
        )];
        op.openapi_extra = json!({"x-internal": true, "responses": {"200": {"description": "Me"}}})
            .as_object()
            .cloned()
            .unwrap();

        let doc = SchemaDocGenerator::new("Test", "1.0.0")
            .description("Users")
            .server("https://api.example.com", None)
            .generate(&[op])
            .unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        let get = &value["paths"]["/me"]["get"];
        assert_eq!(get["security"], json!([{"ApiKeyHeader": []}]));
        assert_eq!(get["deprecated"], true);
        assert_eq!(get["x-internal"], true);
        assert_eq!(get["responses"]["200"]["description"], "Me");
        assert_eq!(value["paths"]["/me"]["head"]["operationId"], "me");
        assert_eq!(
            value["components"]["securitySchemes"]["ApiKeyHeader"],
            json!({"type": "apiKey", "in": "header", "name": "X-API-Key"})
        );
        assert_eq!(value["tags"], json!([{"name": "users"}]));
        assert_eq!(value["servers"][0]["url"], "https://api.example.com");
    }

    #[test]
    fn test_conflicting_model_names() {
        let mut first = OperationDoc::new("/a", vec![Method::POST], "a");
        first.schemas = schemas(&[], &[Param::new("item", FieldType::model(item_model()))]);
        let mut second = OperationDoc::new("/b", vec![Method::POST], "b");
        second.schemas = schemas(
            &[],
            &[Param::new(
                "item",
                FieldType::model(Model::new("Item").field(Field::new("sku", FieldType::Uuid))),
            )],
        );
        let err = SchemaDocGenerator::new("Test", "1.0.0")
            .generate(&[first, second])
            .unwrap_err();
        assert!(matches!(err, DocsError::SchemaConversionError { .. }));
    }

    #[test]
    fn test_undocumentable_method() {
        let op = OperationDoc::new("/tunnel", vec![Method::CONNECT], "tunnel");
        let err = SchemaDocGenerator::new("Test", "1.0.0").generate(&[op]).unwrap_err();
        assert!(err.to_string().contains("tunnel"));
    }

    #[test]
    fn test_nullable_uuid_field() {
        let mut components = ComponentSet::default();
        let field = Field::new("owner", FieldType::Uuid).nullable().optional();
        let schema = serde_json::to_value(components.field_schema(&field).unwrap()).unwrap();
        assert_eq!(
            schema,
            json!({
                "title": "Owner",
                "anyOf": [{"type": "string", "format": "uuid"}, {"type": "null"}]
            })
        );
    }
}

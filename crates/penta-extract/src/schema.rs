//! Per-group validation schemas and their process-wide cache.
//!
//! Every operation gets one [`OperationSchema`] per non-empty source group.
//! Schemas are memoized by handler identity, group, and a canonical
//! fingerprint of the group's parameters, so registering the same handler
//! twice with the same declarations shares one `Arc`.

use crate::model::{Field, Model};
use crate::param::ParamSpec;
use indexmap::IndexMap;
use parking_lot::RwLock;
use penta_core::{HandlerId, ParamSource, PentaError, PentaResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// How validated group fields map back to handler parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// One field, one parameter.
    Direct {
        /// Parameter (and field) name.
        param: String,
    },
    /// Several group fields re-nested under one model parameter.
    Flattened {
        /// Parameter name.
        param: String,
        /// Field names taken from the model.
        fields: Vec<String>,
    },
}

/// The compiled schema of one source group of one operation.
#[derive(Debug, Clone)]
pub struct OperationSchema {
    source: ParamSource,
    model: Model,
    bindings: Vec<Binding>,
    specs: Vec<ParamSpec>,
    wrapped: Option<String>,
}

impl OperationSchema {
    /// Returns the group.
    #[must_use]
    pub fn source(&self) -> ParamSource {
        self.source
    }

    /// Returns the group model. Field wire names are what the binder reads.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Returns the field-to-parameter bindings.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Returns the parameters of this group.
    #[must_use]
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// For a lone body model, the key the raw body is wrapped under.
    #[must_use]
    pub fn wrapped(&self) -> Option<&str> {
        self.wrapped.as_deref()
    }

    /// Returns `true` if the group field at `wire` accepts multiple values.
    #[must_use]
    pub fn is_list_field(&self, wire: &str) -> bool {
        self.model
            .fields
            .iter()
            .any(|field| field.wire_name() == wire && field.ty.is_list())
    }

    fn build(handler: &HandlerId, source: ParamSource, specs: Vec<ParamSpec>) -> PentaResult<Self> {
        let mut model = Model::new(format!("{}::{source}", handler.name()));
        let mut bindings = Vec::with_capacity(specs.len());
        let mut wrapped = None;

        let lone_body_model = source == ParamSource::Body
            && specs.len() == 1
            && specs.iter().all(|spec| {
                !spec.embed && spec.ty.as_ref().is_some_and(crate::FieldType::is_model)
            });

        for spec in &specs {
            if spec.flatten {
                let nested = spec.ty.as_ref().and_then(crate::FieldType::as_model).ok_or_else(|| {
                    PentaError::configuration(format!("parameter '{}' is not a model", spec.name))
                })?;
                let mut names = Vec::with_capacity(nested.fields.len());
                for field in &nested.fields {
                    model.fields.push(flattened_field(field, source));
                    names.push(field.name.clone());
                }
                bindings.push(Binding::Flattened {
                    param: spec.name.clone(),
                    fields: names,
                });
            } else {
                let field = spec.to_field().ok_or_else(|| {
                    PentaError::configuration(format!("parameter '{}' has no type", spec.name))
                })?;
                if lone_body_model {
                    wrapped = Some(field.wire_name().to_string());
                }
                model.fields.push(field);
                bindings.push(Binding::Direct {
                    param: spec.name.clone(),
                });
            }
        }

        model.check().map_err(|e| {
            PentaError::configuration(format!("invalid {source} parameters: {}", e.client_message()))
        })?;

        Ok(Self {
            source,
            model,
            bindings,
            specs,
            wrapped,
        })
    }
}

fn flattened_field(field: &Field, source: ParamSource) -> Field {
    let mut field = field.clone();
    if source == ParamSource::Header && field.alias.is_none() && field.name.contains('_') {
        field.alias = Some(field.name.replace('_', "-"));
    }
    field
}

/// The schemas of one operation, in group order.
#[derive(Debug, Clone, Default)]
pub struct OperationSchemas {
    groups: IndexMap<ParamSource, Arc<OperationSchema>>,
}

impl OperationSchemas {
    /// Returns the schema of a group.
    #[must_use]
    pub fn get(&self, source: ParamSource) -> Option<&Arc<OperationSchema>> {
        self.groups.get(&source)
    }

    /// Iterates over non-empty groups.
    pub fn iter(&self) -> impl Iterator<Item = (ParamSource, &Arc<OperationSchema>)> {
        self.groups.iter().map(|(source, schema)| (*source, schema))
    }

    /// Returns `true` if the operation reads nothing from the request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SchemaKey {
    handler: HandlerId,
    source: ParamSource,
    fingerprint: String,
}

/// Builds and memoizes [`OperationSchema`]s.
#[derive(Debug, Default)]
pub struct SchemaSynthesizer {
    cache: RwLock<HashMap<SchemaKey, Arc<OperationSchema>>>,
}

static GLOBAL: OnceLock<SchemaSynthesizer> = OnceLock::new();

impl SchemaSynthesizer {
    /// Creates a synthesizer with its own cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide synthesizer.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Builds (or reuses) the schemas for a handler's classified parameters.
    ///
    /// Dependency and request parameters are skipped. Body and form
    /// parameters read the same payload, so one operation may declare only
    /// one of the two groups.
    pub fn synthesize(&self, handler: &HandlerId, specs: &[ParamSpec]) -> PentaResult<OperationSchemas> {
        let body = specs.iter().find(|s| s.source == ParamSource::Body);
        let form = specs.iter().find(|s| s.source == ParamSource::Form);
        if let (Some(body), Some(form)) = (body, form) {
            return Err(PentaError::configuration(format!(
                "'{}' reads the JSON body and '{}' reads form data; an operation takes one payload",
                body.name, form.name
            )));
        }
        let mut schemas = OperationSchemas::default();
        for source in ParamSource::GROUPS {
            let group: Vec<ParamSpec> = specs.iter().filter(|s| s.source == source).cloned().collect();
            if group.is_empty() {
                continue;
            }
            let key = SchemaKey {
                handler: handler.clone(),
                source,
                fingerprint: fingerprint(&group),
            };
            let schema = self.get_or_build(key, || OperationSchema::build(handler, source, group))?;
            schemas.groups.insert(source, schema);
        }
        Ok(schemas)
    }

    fn get_or_build<F>(&self, key: SchemaKey, build: F) -> PentaResult<Arc<OperationSchema>>
    where
        F: FnOnce() -> PentaResult<OperationSchema>,
    {
        if let Some(schema) = self.cache.read().get(&key) {
            return Ok(Arc::clone(schema));
        }
        let built = Arc::new(build()?);
        let mut cache = self.cache.write();
        let stored = cache.entry(key).or_insert(built);
        Ok(Arc::clone(stored))
    }

    /// Returns the number of cached schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Drops every cached schema.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

fn fingerprint(specs: &[ParamSpec]) -> String {
    let mut parts: Vec<(&str, Value)> = specs.iter().map(|s| (s.name.as_str(), s.fingerprint())).collect();
    parts.sort_by(|a, b| a.0.cmp(b.0));
    Value::Array(parts.into_iter().map(|(_, v)| v).collect()).to_string()
}

/// Merges an operation's parameters with those of its dependencies.
///
/// Identical declarations under one name collapse into one; differing ones
/// are a configuration error.
pub fn merge_specs<I>(specs: I) -> PentaResult<Vec<ParamSpec>>
where
    I: IntoIterator<Item = ParamSpec>,
{
    let mut merged: IndexMap<String, ParamSpec> = IndexMap::new();
    for spec in specs {
        match merged.get(&spec.name) {
            Some(existing) if *existing == spec => {}
            Some(_) => {
                return Err(PentaError::configuration(format!(
                    "parameter '{}' is declared twice with different settings",
                    spec.name
                )));
            }
            None => {
                merged.insert(spec.name.clone(), spec);
            }
        }
    }
    Ok(merged.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use crate::param::{classify, Param};
    use serde_json::json;

    struct ListItems;
    struct GetItem;

    fn specs(params: &[Param]) -> Vec<ParamSpec> {
        params.iter().map(|p| classify(p, &["item_id"]).unwrap()).collect()
    }

    fn item_model() -> FieldType {
        FieldType::model(Model::new("Item").field(Field::new("name", FieldType::String)).forbid_extra())
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let synth = SchemaSynthesizer::new();
        let handler = HandlerId::of::<ListItems>("list_items");
        let params = specs(&[
            Param::new("q", FieldType::String),
            Param::new("limit", FieldType::Integer).default(json!(10)),
        ]);

        let first = synth.synthesize(&handler, &params).unwrap();
        let mut reversed = params.clone();
        reversed.reverse();
        let second = synth.synthesize(&handler, &reversed).unwrap();

        assert!(Arc::ptr_eq(
            first.get(ParamSource::Query).unwrap(),
            second.get(ParamSource::Query).unwrap()
        ));
        assert_eq!(synth.len(), 1);
    }

    #[test]
    fn test_changed_declaration_is_a_new_schema() {
        let synth = SchemaSynthesizer::new();
        let handler = HandlerId::of::<ListItems>("list_items");
        let a = synth
            .synthesize(&handler, &specs(&[Param::new("q", FieldType::String)]))
            .unwrap();
        let b = synth
            .synthesize(&handler, &specs(&[Param::new("q", FieldType::String).alias("query")]))
            .unwrap();
        assert!(!Arc::ptr_eq(a.get(ParamSource::Query).unwrap(), b.get(ParamSource::Query).unwrap()));

        let other = HandlerId::of::<GetItem>("list_items");
        let c = synth
            .synthesize(&other, &specs(&[Param::new("q", FieldType::String)]))
            .unwrap();
        assert!(!Arc::ptr_eq(a.get(ParamSource::Query).unwrap(), c.get(ParamSource::Query).unwrap()));
    }

    #[test]
    fn test_documentation_changes_are_new_schemas() {
        let synth = SchemaSynthesizer::new();
        let handler = HandlerId::of::<ListItems>("list_items");
        let first = synth
            .synthesize(&handler, &specs(&[Param::new("q", FieldType::String).description("first")]))
            .unwrap();
        let second = synth
            .synthesize(&handler, &specs(&[Param::new("q", FieldType::String).description("second")]))
            .unwrap();
        let hidden = synth
            .synthesize(&handler, &specs(&[Param::new("q", FieldType::String).description("first").hidden()]))
            .unwrap();

        let query = |schemas: &OperationSchemas| Arc::clone(schemas.get(ParamSource::Query).unwrap());
        assert_eq!(query(&first).model().fields[0].description.as_deref(), Some("first"));
        assert_eq!(query(&second).model().fields[0].description.as_deref(), Some("second"));
        assert!(!Arc::ptr_eq(&query(&first), &query(&hidden)));
        assert!(!query(&hidden).specs()[0].include_in_schema);
        assert_eq!(synth.len(), 3);

        let titled = |title: &str| {
            let model = Model::new("Filters").field(Field::new("limit", FieldType::Integer).title(title));
            specs(&[Param::new("filters", FieldType::model(model)).query()])
        };
        let a = synth.synthesize(&handler, &titled("Limit")).unwrap();
        let b = synth.synthesize(&handler, &titled("Page size")).unwrap();
        assert!(!Arc::ptr_eq(&query(&a), &query(&b)));
    }

    #[test]
    fn test_concurrent_first_use_shares_one_schema() {
        let synth = SchemaSynthesizer::new();
        let handler = HandlerId::of::<ListItems>("list_items");
        let params = specs(&[
            Param::new("q", FieldType::String),
            Param::new("limit", FieldType::Integer).default(json!(10)),
        ]);

        let results: Vec<Arc<OperationSchema>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let schemas = synth.synthesize(&handler, &params).unwrap();
                        Arc::clone(schemas.get(ParamSource::Query).unwrap())
                    })
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });

        assert!(results.iter().all(|schema| Arc::ptr_eq(schema, &results[0])));
        assert_eq!(synth.len(), 1);
    }

    #[test]
    fn test_body_and_form_are_exclusive() {
        let synth = SchemaSynthesizer::new();
        let err = synth
            .synthesize(
                &HandlerId::of::<GetItem>("create"),
                &specs(&[
                    Param::new("payload", item_model()),
                    Param::new("note", FieldType::String).form(),
                ]),
            )
            .unwrap_err();
        assert_eq!(err.category(), penta_core::ErrorCategory::Configuration);
        assert!(err.to_string().contains("one payload"));
        assert!(synth.is_empty());
    }

    #[test]
    fn test_groups_never_mix() {
        let synth = SchemaSynthesizer::new();
        let schemas = synth
            .synthesize(
                &HandlerId::of::<GetItem>("get_item"),
                &specs(&[
                    Param::new("item_id", FieldType::Integer),
                    Param::new("q", FieldType::String),
                    Param::new("x_token", FieldType::String).header(),
                    Param::request("request"),
                ]),
            )
            .unwrap();
        let groups: Vec<ParamSource> = schemas.iter().map(|(source, _)| source).collect();
        assert_eq!(groups, vec![ParamSource::Path, ParamSource::Query, ParamSource::Header]);
        let header = schemas.get(ParamSource::Header).unwrap();
        assert_eq!(header.model().fields[0].wire_name(), "x-token");
    }

    #[test]
    fn test_lone_body_model_is_wrapped() {
        let synth = SchemaSynthesizer::new();
        let handler = HandlerId::of::<GetItem>("create");
        let schemas = synth
            .synthesize(&handler, &specs(&[Param::new("payload", item_model())]))
            .unwrap();
        assert_eq!(schemas.get(ParamSource::Body).unwrap().wrapped(), Some("payload"));

        let schemas = synth
            .synthesize(&handler, &specs(&[Param::new("payload", item_model()).embed()]))
            .unwrap();
        assert_eq!(schemas.get(ParamSource::Body).unwrap().wrapped(), None);
    }

    #[test]
    fn test_flattened_bindings() {
        let filters = FieldType::model(
            Model::new("Filters")
                .field(Field::new("limit", FieldType::Integer).default(json!(10)))
                .field(Field::new("category_in", FieldType::String).alias("category__in").optional()),
        );
        let synth = SchemaSynthesizer::new();
        let schemas = synth
            .synthesize(
                &HandlerId::of::<ListItems>("list"),
                &specs(&[Param::new("filters", filters).query()]),
            )
            .unwrap();
        let query = schemas.get(ParamSource::Query).unwrap();
        assert_eq!(
            query.bindings(),
            &[Binding::Flattened {
                param: "filters".into(),
                fields: vec!["limit".into(), "category_in".into()],
            }]
        );
        let wires: Vec<&str> = query.model().fields.iter().map(Field::wire_name).collect();
        assert_eq!(wires, vec!["limit", "category__in"]);
    }

    #[test]
    fn test_shared_wire_alias_is_rejected() {
        let synth = SchemaSynthesizer::new();
        let err = synth
            .synthesize(
                &HandlerId::of::<ListItems>("list"),
                &specs(&[
                    Param::new("a", FieldType::String).alias("x"),
                    Param::new("b", FieldType::String).alias("x"),
                ]),
            )
            .unwrap_err();
        assert_eq!(err.category(), penta_core::ErrorCategory::Configuration);
        assert!(synth.is_empty());
    }

    #[test]
    fn test_merge_specs() {
        let own = specs(&[Param::new("limit", FieldType::Integer).default(json!(10))]);
        let dep_same = specs(&[Param::new("limit", FieldType::Integer).default(json!(10))]);
        let merged = merge_specs(own.clone().into_iter().chain(dep_same)).unwrap();
        assert_eq!(merged.len(), 1);

        let dep_other = specs(&[Param::new("limit", FieldType::Integer)]);
        assert!(merge_specs(own.into_iter().chain(dep_other)).is_err());
    }
}

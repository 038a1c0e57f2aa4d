//! Response shapes.
//!
//! An operation declares which statuses it returns and, for each, the model
//! its payload must satisfy. Payloads are validated against the model and
//! dumped with the operation's dump options before rendering.

use http::StatusCode;
use indexmap::IndexMap;
use penta_core::{PentaError, PentaResult};
use penta_extract::{Field, FieldType, Model};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Informational statuses.
pub const CODES_1XX: &[u16] = &[100, 101];

/// The usual success statuses.
pub const CODES_2XX: &[u16] = &[200, 201, 202, 203, 204, 205, 206];

/// Redirect statuses.
pub const CODES_3XX: &[u16] = &[300, 301, 302, 303, 304, 305, 306, 307, 308];

/// The usual client error statuses.
pub const CODES_4XX: &[u16] = &[
    400, 401, 402, 403, 404, 405, 406, 407, 408, 409, 410, 411, 412, 416, 418, 425, 429, 451,
];

/// Server error statuses.
pub const CODES_5XX: &[u16] = &[500, 501, 502, 503, 504];

/// What the payload for one status looks like.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseModel {
    /// No declaration: the payload is rendered as returned.
    Unset,
    /// No body.
    Empty,
    /// The payload is validated against the model.
    Model(Arc<Model>),
}

impl ResponseModel {
    fn from_option(model: Option<Model>) -> Self {
        model.map_or(Self::Empty, |model| Self::Model(Arc::new(model)))
    }

    fn doc_model(&self) -> Option<Arc<Model>> {
        match self {
            Self::Model(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }
}

/// Status to model declarations of one operation.
///
/// ```rust
/// use penta::{Responses, CODES_4XX};
/// use penta::extract::{Field, FieldType, Model};
///
/// let item = Model::new("Item").field(Field::new("name", FieldType::String));
/// let error = Model::new("Message").field(Field::new("message", FieldType::String));
///
/// let responses = Responses::new()
///     .status(200, Some(item))
///     .codes(CODES_4XX, Some(error))
///     .status(204, None);
/// assert_eq!(responses.len(), 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Responses {
    statuses: IndexMap<u16, ResponseModel>,
    default: Option<ResponseModel>,
}

impl Responses {
    /// No declarations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares one status. `None` means an empty body.
    #[must_use]
    pub fn status(mut self, code: u16, model: Option<Model>) -> Self {
        self.statuses.insert(code, ResponseModel::from_option(model));
        self
    }

    /// Declares one status whose payload is rendered as returned.
    #[must_use]
    pub fn untyped(mut self, code: u16) -> Self {
        self.statuses.insert(code, ResponseModel::Unset);
        self
    }

    /// Declares several statuses sharing one model.
    #[must_use]
    pub fn codes(mut self, codes: &[u16], model: Option<Model>) -> Self {
        let shared = ResponseModel::from_option(model);
        for code in codes {
            self.statuses.insert(*code, shared.clone());
        }
        self
    }

    /// Declares the model used for statuses with no entry of their own.
    #[must_use]
    pub fn fallback(mut self, model: Option<Model>) -> Self {
        self.default = Some(ResponseModel::from_option(model));
        self
    }

    /// Number of declarations, the fallback included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len() + usize::from(self.default.is_some())
    }

    /// Returns `true` if nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolved dump options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Emit wire names instead of field names.
    pub by_alias: bool,
    /// Drop `null` values.
    pub exclude_none: bool,
    /// Drop values equal to the field default.
    pub exclude_defaults: bool,
}

/// Dump options as declared on an operation or router; unset values inherit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DumpSettings {
    pub by_alias: Option<bool>,
    pub exclude_none: Option<bool>,
    pub exclude_defaults: Option<bool>,
}

impl DumpSettings {
    /// Fills unset values from `parent`.
    pub fn inherit(self, parent: Self) -> Self {
        Self {
            by_alias: self.by_alias.or(parent.by_alias),
            exclude_none: self.exclude_none.or(parent.exclude_none),
            exclude_defaults: self.exclude_defaults.or(parent.exclude_defaults),
        }
    }

    pub fn resolve(self) -> DumpOptions {
        DumpOptions {
            by_alias: self.by_alias.unwrap_or(false),
            exclude_none: self.exclude_none.unwrap_or(false),
            exclude_defaults: self.exclude_defaults.unwrap_or(false),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Shape {
    Unset,
    Empty,
    Model {
        model: Arc<Model>,
        // The same model read by field name, for validating handler output.
        by_name: Model,
    },
}

/// Compiled declarations of one operation.
#[derive(Debug)]
pub(crate) struct ResponseShapes {
    statuses: IndexMap<StatusCode, Shape>,
    fallback: Option<Shape>,
    default_status: StatusCode,
    docs: IndexMap<String, Option<Arc<Model>>>,
}

impl ResponseShapes {
    pub fn compile(responses: &Responses) -> PentaResult<Self> {
        if responses.is_empty() {
            return Self::compile(&Responses::new().status(200, None).unset_all());
        }

        let mut statuses = IndexMap::new();
        let mut docs = IndexMap::new();
        for (code, model) in &responses.statuses {
            let status = StatusCode::from_u16(*code).map_err(|_| {
                PentaError::configuration(format!("invalid response status {code}"))
            })?;
            statuses.insert(status, shape(model)?);
            docs.insert(code.to_string(), model.doc_model());
        }
        let fallback = match &responses.default {
            Some(model) => {
                docs.insert("default".to_string(), model.doc_model());
                Some(shape(model)?)
            }
            None => None,
        };

        let default_status = match (statuses.len(), &fallback) {
            (1, None) => statuses.keys().next().copied().unwrap_or(StatusCode::OK),
            _ => StatusCode::OK,
        };

        Ok(Self {
            statuses,
            fallback,
            default_status,
            docs,
        })
    }

    /// Status used when the handler does not pick one.
    pub const fn default_status(&self) -> StatusCode {
        self.default_status
    }

    pub fn lookup(&self, status: StatusCode) -> PentaResult<&Shape> {
        self.statuses
            .get(&status)
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                let declared: Vec<&str> = self.docs.keys().map(String::as_str).collect();
                PentaError::configuration(format!(
                    "no response schema for status {} (declared: {})",
                    status.as_u16(),
                    declared.join(", ")
                ))
            })
    }

    /// Status to model map for the schema document.
    pub fn docs(&self) -> &IndexMap<String, Option<Arc<Model>>> {
        &self.docs
    }
}

impl Responses {
    fn unset_all(mut self) -> Self {
        for model in self.statuses.values_mut() {
            *model = ResponseModel::Unset;
        }
        self
    }
}

fn shape(model: &ResponseModel) -> PentaResult<Shape> {
    Ok(match model {
        ResponseModel::Unset => Shape::Unset,
        ResponseModel::Empty => Shape::Empty,
        ResponseModel::Model(model) => {
            model.check()?;
            Shape::Model {
                model: Arc::clone(model),
                by_name: by_name(model),
            }
        }
    })
}

fn by_name(model: &Model) -> Model {
    Model {
        name: model.name.clone(),
        fields: model
            .fields
            .iter()
            .map(|field| Field {
                alias: None,
                ty: by_name_type(&field.ty),
                ..field.clone()
            })
            .collect(),
        forbid_extra: model.forbid_extra,
    }
}

fn by_name_type(ty: &FieldType) -> FieldType {
    match ty {
        FieldType::Model(model) => FieldType::model(by_name(model)),
        FieldType::List(inner) => FieldType::list(by_name_type(inner)),
        other => other.clone(),
    }
}

/// Validates a handler payload and dumps it with `options`.
pub(crate) fn shape_payload(
    model: &Model,
    by_name: &Model,
    status: StatusCode,
    payload: &Value,
    options: DumpOptions,
) -> PentaResult<Value> {
    let validated = by_name.validate(payload).map_err(|errors| {
        tracing::error!(
            model = %model.name,
            status = status.as_u16(),
            errors = errors.len(),
            "response payload does not match its declared model"
        );
        PentaError::internal(format!(
            "response for status {} does not match model '{}'",
            status.as_u16(),
            model.name
        ))
    })?;
    Ok(Value::Object(dump(model, &validated, options)))
}

fn dump(model: &Model, values: &Map<String, Value>, options: DumpOptions) -> Map<String, Value> {
    let mut out = Map::new();
    for field in &model.fields {
        let Some(value) = values.get(&field.name) else {
            continue;
        };
        if options.exclude_none && value.is_null() {
            continue;
        }
        if options.exclude_defaults && is_default(field, value) {
            continue;
        }
        let key = if options.by_alias {
            field.wire_name().to_string()
        } else {
            field.name.clone()
        };
        out.insert(key, dump_value(&field.ty, value, options));
    }
    out
}

fn dump_value(ty: &FieldType, value: &Value, options: DumpOptions) -> Value {
    match (ty, value) {
        (FieldType::Model(model), Value::Object(values)) => Value::Object(dump(model, values, options)),
        (FieldType::List(inner), Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| dump_value(inner, item, options))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn is_default(field: &Field, value: &Value) -> bool {
    match &field.default {
        Some(default) => default == value,
        None => !field.required && value.is_null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> Model {
        Model::new("Item")
            .field(Field::new("name", FieldType::String))
            .field(Field::new("item_count", FieldType::Integer).alias("itemCount").default(json!(0)))
            .field(Field::new("note", FieldType::String).optional())
    }

    fn shape_with(options: DumpOptions, payload: &Value) -> PentaResult<Value> {
        let model = item();
        shape_payload(&model, &by_name(&model), StatusCode::OK, payload, options)
    }

    #[test]
    fn test_undeclared_responses_default_to_unset_200() {
        let shapes = ResponseShapes::compile(&Responses::new()).unwrap();
        assert_eq!(shapes.default_status(), StatusCode::OK);
        assert!(matches!(shapes.lookup(StatusCode::OK).unwrap(), Shape::Unset));
        assert!(shapes.lookup(StatusCode::CREATED).is_err());
        assert_eq!(shapes.docs().get("200"), Some(&None));
    }

    #[test]
    fn test_single_status_is_default() {
        let shapes = ResponseShapes::compile(&Responses::new().status(201, Some(item()))).unwrap();
        assert_eq!(shapes.default_status(), StatusCode::CREATED);

        let shapes = ResponseShapes::compile(
            &Responses::new().status(201, Some(item())).status(204, None),
        )
        .unwrap();
        assert_eq!(shapes.default_status(), StatusCode::OK);
        assert!(matches!(shapes.lookup(StatusCode::NO_CONTENT).unwrap(), Shape::Empty));
    }

    #[test]
    fn test_fallback_and_codes() {
        let shapes = ResponseShapes::compile(
            &Responses::new()
                .status(200, Some(item()))
                .codes(CODES_4XX, None)
                .fallback(None),
        )
        .unwrap();
        assert!(matches!(shapes.lookup(StatusCode::IM_A_TEAPOT).unwrap(), Shape::Empty));
        assert!(matches!(shapes.lookup(StatusCode::BAD_GATEWAY).unwrap(), Shape::Empty));
        assert!(shapes.docs().contains_key("default"));
        assert_eq!(shapes.docs().get("200").unwrap().as_ref().unwrap().name, "Item");
    }

    #[test]
    fn test_invalid_status_rejected() {
        let err = ResponseShapes::compile(&Responses::new().status(42, None)).unwrap_err();
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_payload_validated_by_field_name() {
        let out = shape_with(DumpOptions::default(), &json!({"name": "hat", "item_count": "3"})).unwrap();
        assert_eq!(out, json!({"name": "hat", "item_count": 3, "note": null}));

        assert!(shape_with(DumpOptions::default(), &json!({"item_count": 1})).is_err());
    }

    #[test]
    fn test_dump_options() {
        let payload = json!({"name": "hat", "item_count": 0});

        let out = shape_with(
            DumpOptions {
                exclude_none: true,
                ..DumpOptions::default()
            },
            &payload,
        )
        .unwrap();
        assert_eq!(out, json!({"name": "hat", "item_count": 0}));

        let out = shape_with(
            DumpOptions {
                exclude_defaults: true,
                ..DumpOptions::default()
            },
            &payload,
        )
        .unwrap();
        assert_eq!(out, json!({"name": "hat"}));

        let out = shape_with(
            DumpOptions {
                by_alias: true,
                ..DumpOptions::default()
            },
            &json!({"name": "hat", "item_count": 2}),
        )
        .unwrap();
        assert_eq!(out, json!({"name": "hat", "itemCount": 2, "note": null}));
    }

    #[test]
    fn test_nested_dump_uses_aliases() {
        let owner = Model::new("Owner").field(Field::new("full_name", FieldType::String).alias("fullName"));
        let model = Model::new("Shop")
            .field(Field::new("owners", FieldType::list(FieldType::model(owner))));
        let payload = json!({"owners": [{"full_name": "Ada"}]});

        let out = shape_payload(
            &model,
            &by_name(&model),
            StatusCode::OK,
            &payload,
            DumpOptions {
                by_alias: true,
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, json!({"owners": [{"fullName": "Ada"}]}));
    }

    #[test]
    fn test_dump_settings_inherit() {
        let router = DumpSettings {
            exclude_none: Some(true),
            by_alias: Some(true),
            ..DumpSettings::default()
        };
        let operation = DumpSettings {
            by_alias: Some(false),
            ..DumpSettings::default()
        };
        let resolved = operation.inherit(router).resolve();
        assert!(!resolved.by_alias);
        assert!(resolved.exclude_none);
        assert!(!resolved.exclude_defaults);
    }
}

//! Binding a request to an operation's schemas.
//!
//! Each group is read from its raw source, validated against its schema, and
//! mapped back to parameter names. Every group is evaluated even when an
//! earlier one failed, so a client sees all of its mistakes at once.

use crate::model::Field;
use crate::raw::MultiMap;
use crate::schema::{Binding, OperationSchema, OperationSchemas};
use penta_core::{
    normalize_header_name, ErrorKind, FieldError, ParamSource, Request, ValidationErrorContext,
};
use serde_json::{Map, Value};

/// Validated values keyed by parameter name.
pub type BoundValues = Map<String, Value>;

/// Binds every group of `schemas` against `request`.
///
/// Path values come from the captures stored on the request.
pub fn bind(
    schemas: &OperationSchemas,
    request: &Request,
) -> Result<BoundValues, Vec<ValidationErrorContext>> {
    let mut values = BoundValues::new();
    let mut failures = Vec::new();

    for (source, schema) in schemas.iter() {
        match bind_group(schema, request) {
            Ok(group) => values.extend(group),
            Err(errors) => {
                tracing::debug!(
                    group = %source,
                    errors = errors.len(),
                    "request group failed validation"
                );
                failures.push(ValidationErrorContext::new(source, errors));
            }
        }
    }

    if failures.is_empty() {
        Ok(values)
    } else {
        Err(failures)
    }
}

fn bind_group(schema: &OperationSchema, request: &Request) -> Result<BoundValues, Vec<FieldError>> {
    let raw = raw_input(schema, request)?;
    let validated = schema.model().validate(&raw)?;
    Ok(apply_bindings(schema.bindings(), validated))
}

fn raw_input(schema: &OperationSchema, request: &Request) -> Result<Value, Vec<FieldError>> {
    let fields = &schema.model().fields;
    let mut raw = Map::new();
    match schema.source() {
        ParamSource::Path => {
            for field in fields {
                if let Some(value) = request.path_params().get(field.wire_name()) {
                    raw.insert(field.wire_name().to_string(), Value::from(value));
                }
            }
        }
        ParamSource::Query => {
            let query = MultiMap::parse(request.query_string().unwrap_or_default());
            collect_multi(fields, &query, false, &mut raw);
        }
        ParamSource::Form => {
            let form = MultiMap::parse_bytes(request.body());
            collect_multi(fields, &form, true, &mut raw);
        }
        ParamSource::Header => {
            for field in fields {
                let wanted = normalize_header_name(field.wire_name());
                let values: Vec<Value> = request
                    .headers()
                    .iter()
                    .filter(|(name, _)| normalize_header_name(name.as_str()) == wanted)
                    .filter_map(|(_, value)| value.to_str().ok())
                    .map(Value::from)
                    .collect();
                insert_values(field, values, &mut raw);
            }
        }
        ParamSource::Cookie => {
            let cookies = request.cookies();
            for field in fields {
                if let Some(value) = cookies.get(field.wire_name()) {
                    raw.insert(field.wire_name().to_string(), Value::from(value));
                }
            }
        }
        ParamSource::Body => return body_input(schema, request),
        ParamSource::Dependency | ParamSource::Request => {}
    }
    Ok(Value::Object(raw))
}

fn collect_multi(fields: &[Field], source: &MultiMap, drop_empty: bool, raw: &mut Map<String, Value>) {
    for field in fields {
        let values: Vec<Value> = source
            .get_all(field.wire_name())
            .iter()
            .filter(|value| !(drop_empty && value.is_empty() && !field.required))
            .map(|value| Value::from(value.as_str()))
            .collect();
        insert_values(field, values, raw);
    }
}

fn insert_values(field: &Field, mut values: Vec<Value>, raw: &mut Map<String, Value>) {
    if values.is_empty() {
        return;
    }
    let value = if field.ty.is_list() {
        Value::Array(values)
    } else {
        values.pop().unwrap_or(Value::Null)
    };
    raw.insert(field.wire_name().to_string(), value);
}

fn body_input(schema: &OperationSchema, request: &Request) -> Result<Value, Vec<FieldError>> {
    let body = request.body();
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(body)
                .map_err(|e| vec![FieldError::with_detail(ErrorKind::JsonInvalid, e.to_string())])?,
        )
    };

    Ok(match (schema.wrapped(), parsed) {
        (Some(key), Some(value)) => {
            let mut wrapped = Map::new();
            wrapped.insert(key.to_string(), value);
            Value::Object(wrapped)
        }
        (_, Some(value)) => value,
        (_, None) => Value::Object(Map::new()),
    })
}

fn apply_bindings(bindings: &[Binding], mut validated: Map<String, Value>) -> BoundValues {
    let mut out = BoundValues::new();
    for binding in bindings {
        match binding {
            Binding::Direct { param } => {
                let value = validated.remove(param).unwrap_or(Value::Null);
                out.insert(param.clone(), value);
            }
            Binding::Flattened { param, fields } => {
                let nested: Map<String, Value> = fields
                    .iter()
                    .map(|name| (name.clone(), validated.remove(name).unwrap_or(Value::Null)))
                    .collect();
                out.insert(param.clone(), Value::Object(nested));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, Model};
    use crate::param::{classify, Param};
    use crate::schema::SchemaSynthesizer;
    use http::Method;
    use penta_core::{error_items, HandlerId};
    use penta_router::Params;
    use serde_json::json;

    struct Handler;

    fn schemas(path: &[&str], params: &[Param]) -> OperationSchemas {
        let specs: Vec<_> = params.iter().map(|p| classify(p, path).unwrap()).collect();
        SchemaSynthesizer::new()
            .synthesize(&HandlerId::of::<Handler>("handler"), &specs)
            .unwrap()
    }

    fn loc(items: &[penta_core::ErrorItem], index: usize) -> Value {
        serde_json::to_value(&items[index].loc).unwrap()
    }

    #[test]
    fn test_path_and_query() {
        let schemas = schemas(
            &["item_id"],
            &[
                Param::new("item_id", FieldType::Integer),
                Param::new("q", FieldType::String),
            ],
        );
        let mut request = Request::builder().uri("/items/123?q=test").build();
        request.set_path_params([("item_id", "123")].into_iter().collect::<Params>());

        let values = bind(&schemas, &request).unwrap();
        assert_eq!(Value::Object(values), json!({"item_id": 123, "q": "test"}));
    }

    #[test]
    fn test_all_groups_report_together() {
        let schemas = schemas(
            &["item_id"],
            &[
                Param::new("item_id", FieldType::Integer),
                Param::new("q", FieldType::String),
                Param::new("x_token", FieldType::String).header(),
            ],
        );
        let mut request = Request::builder().uri("/items/abc").build();
        request.set_path_params([("item_id", "abc")].into_iter().collect::<Params>());

        let failures = bind(&schemas, &request).unwrap_err();
        assert_eq!(failures.len(), 3);
        let items = error_items(failures);
        assert_eq!(loc(&items, 0), json!(["path", "item_id"]));
        assert_eq!(items[0].kind, "int_parsing");
        assert_eq!(loc(&items, 1), json!(["query", "q"]));
        assert_eq!(loc(&items, 2), json!(["header", "x-token"]));
        assert_eq!(items[2].kind, "missing");
    }

    #[test]
    fn test_query_lists_take_every_value() {
        let schemas = schemas(
            &[],
            &[
                Param::new("ids", FieldType::list(FieldType::Integer)),
                Param::new("page", FieldType::Integer).default(json!(1)),
            ],
        );
        let request = Request::builder().uri("/?ids=1&ids=2&page=3&page=4").build();
        let values = bind(&schemas, &request).unwrap();
        assert_eq!(values["ids"], json!([1, 2]));
        assert_eq!(values["page"], json!(4));

        let request = Request::builder().uri("/?ids=1&ids=x").build();
        let items = error_items(bind(&schemas, &request).unwrap_err());
        assert_eq!(loc(&items, 0), json!(["query", "ids", 1]));
    }

    #[test]
    fn test_header_lookup_is_normalized() {
        let schemas = schemas(&[], &[Param::new("x_token", FieldType::String).header()]);
        let request = Request::builder().header("X-TOKEN", "secret").build();
        assert_eq!(bind(&schemas, &request).unwrap()["x_token"], json!("secret"));
    }

    #[test]
    fn test_cookies() {
        let schemas = schemas(
            &[],
            &[Param::new("session", FieldType::String).cookie().default(json!("none"))],
        );
        let request = Request::builder().header("cookie", "theme=dark; session=abc").build();
        assert_eq!(bind(&schemas, &request).unwrap()["session"], json!("abc"));
        let request = Request::builder().build();
        assert_eq!(bind(&schemas, &request).unwrap()["session"], json!("none"));
    }

    #[test]
    fn test_forbid_extra_body_location() {
        let item = Model::new("Item")
            .field(Field::new("name", FieldType::String))
            .forbid_extra();
        let schemas = schemas(&[], &[Param::new("payload", FieldType::model(item))]);
        let request = Request::builder()
            .method(Method::POST)
            .json(&json!({"name": "hat", "extra": 1}))
            .build();
        let items = error_items(bind(&schemas, &request).unwrap_err());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, "extra_forbidden");
        assert_eq!(loc(&items, 0), json!(["body", "payload", "extra"]));
    }

    #[test]
    fn test_body_edge_cases() {
        let item = Model::new("Item").field(Field::new("name", FieldType::String));
        let schemas = schemas(&[], &[Param::new("payload", FieldType::model(item))]);

        let empty = Request::builder().method(Method::POST).build();
        let items = error_items(bind(&schemas, &empty).unwrap_err());
        assert_eq!(items[0].kind, "missing");
        assert_eq!(loc(&items, 0), json!(["body", "payload"]));

        let broken = Request::builder().method(Method::POST).body("{not json").build();
        let items = error_items(bind(&schemas, &broken).unwrap_err());
        assert_eq!(items[0].kind, "json_invalid");
        assert_eq!(loc(&items, 0), json!(["body"]));

        let ok = Request::builder().json(&json!({"name": "hat"})).build();
        assert_eq!(bind(&schemas, &ok).unwrap()["payload"], json!({"name": "hat"}));
    }

    #[test]
    fn test_multiple_body_params_are_keyed() {
        let item = Model::new("Item").field(Field::new("name", FieldType::String));
        let schemas = schemas(
            &[],
            &[
                Param::new("item", FieldType::model(item)),
                Param::new("importance", FieldType::Integer).body(),
            ],
        );
        let request = Request::builder()
            .json(&json!({"item": {"name": "hat"}, "importance": "5"}))
            .build();
        let values = bind(&schemas, &request).unwrap();
        assert_eq!(values["importance"], json!(5));
        assert_eq!(values["item"], json!({"name": "hat"}));
    }

    #[test]
    fn test_form_empty_string_uses_default() {
        let schemas = schemas(
            &[],
            &[
                Param::new("username", FieldType::String).form(),
                Param::new("age", FieldType::Integer).form().default(json!(18)),
            ],
        );
        let request = Request::builder().form("username=alice&age=").build();
        let values = bind(&schemas, &request).unwrap();
        assert_eq!(values["username"], json!("alice"));
        assert_eq!(values["age"], json!(18));
    }

    #[test]
    fn test_flattened_query_model() {
        let filters = Model::new("Filters")
            .field(Field::new("limit", FieldType::Integer).default(json!(10)))
            .field(Field::new("category_in", FieldType::String).alias("category__in").optional());
        let schemas = schemas(&[], &[Param::new("filters", FieldType::model(filters)).query()]);
        let request = Request::builder().uri("/?category__in=hats").build();
        let values = bind(&schemas, &request).unwrap();
        assert_eq!(values["filters"], json!({"limit": 10, "category_in": "hats"}));
    }
}

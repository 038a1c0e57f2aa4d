//! Field-level validation errors and their client-facing shape.
//!
//! Validation happens per source group (path, query, header, ...). Each group
//! produces a [`ValidationErrorContext`] whose [`FieldError`] locations are
//! relative to the group. When the contexts are turned into a client response,
//! every location is prefixed with the group name, giving items such as
//! `{"type": "missing", "loc": ["header", "x-token"], "msg": "Field required"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The origin of a declared handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    /// Captured from the URL path template.
    Path,
    /// Read from the query string.
    Query,
    /// Read from request headers.
    Header,
    /// Read from the `Cookie` header.
    Cookie,
    /// Decoded from a JSON request body.
    Body,
    /// Decoded from an urlencoded form body.
    Form,
    /// Produced by a dependency provider.
    Dependency,
    /// The request object itself.
    Request,
}

impl ParamSource {
    /// Sources that carry client data and are validated by a schema.
    pub const GROUPS: [ParamSource; 6] = [
        Self::Path,
        Self::Query,
        Self::Header,
        Self::Cookie,
        Self::Body,
        Self::Form,
    ];

    /// Returns the lowercase group name used in error locations and docs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Body => "body",
            Self::Form => "form",
            Self::Dependency => "dependency",
            Self::Request => "request",
        }
    }

    /// Returns `true` for sources validated through a synthesized schema.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        !matches!(self, Self::Dependency | Self::Request)
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of an error location: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocPart {
    /// Object key or field name.
    Key(String),
    /// List position.
    Index(usize),
}

impl From<&str> for LocPart {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

impl From<String> for LocPart {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

impl From<usize> for LocPart {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// Machine-readable validation failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required field is absent.
    Missing,
    /// A field not declared by a forbid-extra model.
    ExtraForbidden,
    /// A model was given something other than an object.
    ModelAttributesType,
    /// Expected a string.
    StringType,
    /// A string could not be parsed as an integer.
    IntParsing,
    /// Expected an integer.
    IntType,
    /// A string could not be parsed as a number.
    FloatParsing,
    /// Expected a number.
    FloatType,
    /// A string could not be interpreted as a boolean.
    BoolParsing,
    /// Expected a boolean.
    BoolType,
    /// A string could not be parsed as a UUID.
    UuidParsing,
    /// Expected a UUID string.
    UuidType,
    /// Expected a list.
    ListType,
    /// The body is not valid JSON.
    JsonInvalid,
    /// Value must be greater than a bound.
    GreaterThan,
    /// Value must be greater than or equal to a bound.
    GreaterThanEqual,
    /// Value must be less than a bound.
    LessThan,
    /// Value must be less than or equal to a bound.
    LessThanEqual,
    /// String shorter than the minimum length.
    StringTooShort,
    /// String longer than the maximum length.
    StringTooLong,
    /// String does not match the configured pattern.
    StringPatternMismatch,
    /// Custom validator rejection.
    ValueError,
}

impl ErrorKind {
    /// Returns the snake_case error code reported to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::ExtraForbidden => "extra_forbidden",
            Self::ModelAttributesType => "model_attributes_type",
            Self::StringType => "string_type",
            Self::IntParsing => "int_parsing",
            Self::IntType => "int_type",
            Self::FloatParsing => "float_parsing",
            Self::FloatType => "float_type",
            Self::BoolParsing => "bool_parsing",
            Self::BoolType => "bool_type",
            Self::UuidParsing => "uuid_parsing",
            Self::UuidType => "uuid_type",
            Self::ListType => "list_type",
            Self::JsonInvalid => "json_invalid",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanEqual => "greater_than_equal",
            Self::LessThan => "less_than",
            Self::LessThanEqual => "less_than_equal",
            Self::StringTooShort => "string_too_short",
            Self::StringTooLong => "string_too_long",
            Self::StringPatternMismatch => "string_pattern_mismatch",
            Self::ValueError => "value_error",
        }
    }

    /// Message used when the kind carries no context.
    fn plain_message(self) -> &'static str {
        match self {
            Self::Missing => "Field required",
            Self::ExtraForbidden => "Extra inputs are not permitted",
            Self::ModelAttributesType => {
                "Input should be a valid dictionary or object to extract fields from"
            }
            Self::StringType => "Input should be a valid string",
            Self::IntParsing => {
                "Input should be a valid integer, unable to parse string as an integer"
            }
            Self::IntType => "Input should be a valid integer",
            Self::FloatParsing => "Input should be a valid number, unable to parse string as a number",
            Self::FloatType => "Input should be a valid number",
            Self::BoolParsing => "Input should be a valid boolean, unable to interpret input",
            Self::BoolType => "Input should be a valid boolean",
            Self::UuidParsing => "Input should be a valid UUID",
            Self::UuidType => "UUID input should be a string, bytes or UUID object",
            Self::ListType => "Input should be a valid list",
            Self::JsonInvalid => "JSON decode error",
            Self::GreaterThan
            | Self::GreaterThanEqual
            | Self::LessThan
            | Self::LessThanEqual
            | Self::StringTooShort
            | Self::StringTooLong
            | Self::StringPatternMismatch
            | Self::ValueError => "Invalid value",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single validation failure, located relative to its source group.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Failure code.
    pub kind: ErrorKind,
    /// Location relative to the group.
    pub loc: Vec<LocPart>,
    /// Human-readable message.
    pub msg: String,
    /// Extra structured context (limits, patterns, parser messages).
    pub ctx: Option<Value>,
}

impl FieldError {
    /// Creates an error with the kind's standard message and an empty location.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            loc: Vec::new(),
            msg: kind.plain_message().to_string(),
            ctx: None,
        }
    }

    /// Shorthand for a `missing` error.
    #[must_use]
    pub fn missing() -> Self {
        Self::new(ErrorKind::Missing)
    }

    /// Creates a bound-violation error such as `greater_than_equal`.
    ///
    /// `key` names the bound in the error context (`ge`, `min_length`, ...).
    #[must_use]
    pub fn bound(kind: ErrorKind, key: &str, limit: Value) -> Self {
        let shown = match &limit {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let msg = match kind {
            ErrorKind::GreaterThan => format!("Input should be greater than {shown}"),
            ErrorKind::GreaterThanEqual => {
                format!("Input should be greater than or equal to {shown}")
            }
            ErrorKind::LessThan => format!("Input should be less than {shown}"),
            ErrorKind::LessThanEqual => format!("Input should be less than or equal to {shown}"),
            ErrorKind::StringTooShort => {
                format!("String should have at least {shown} {}", plural(&limit))
            }
            ErrorKind::StringTooLong => {
                format!("String should have at most {shown} {}", plural(&limit))
            }
            ErrorKind::StringPatternMismatch => format!("String should match pattern '{shown}'"),
            other => other.plain_message().to_string(),
        };
        let mut ctx = serde_json::Map::new();
        ctx.insert(key.to_string(), limit);
        Self {
            kind,
            loc: Vec::new(),
            msg,
            ctx: Some(Value::Object(ctx)),
        }
    }

    /// Creates an error whose message is extended with a parser detail.
    #[must_use]
    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let msg = match kind {
            ErrorKind::ValueError => format!("Value error, {detail}"),
            ErrorKind::UuidParsing => format!("{}, {detail}", kind.plain_message()),
            other => other.plain_message().to_string(),
        };
        Self {
            kind,
            loc: Vec::new(),
            msg,
            ctx: Some(serde_json::json!({ "error": detail })),
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn at<I, P>(mut self, loc: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<LocPart>,
    {
        self.loc = loc.into_iter().map(Into::into).collect();
        self
    }

    /// Prepends a location element (used when nesting models and lists).
    #[must_use]
    pub fn under(mut self, part: impl Into<LocPart>) -> Self {
        self.loc.insert(0, part.into());
        self
    }
}

fn plural(limit: &Value) -> &'static str {
    if limit.as_u64() == Some(1) {
        "character"
    } else {
        "characters"
    }
}

/// All failures produced while validating one source group.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrorContext {
    /// The group that failed.
    pub source: ParamSource,
    /// Failures with group-relative locations.
    pub errors: Vec<FieldError>,
}

impl ValidationErrorContext {
    /// Creates a context for a group.
    #[must_use]
    pub fn new(source: ParamSource, errors: Vec<FieldError>) -> Self {
        Self { source, errors }
    }

    /// Converts to client-facing items whose location starts with the group name.
    #[must_use]
    pub fn into_items(self) -> Vec<ErrorItem> {
        let source = self.source;
        self.errors
            .into_iter()
            .map(|error| {
                let mut loc = Vec::with_capacity(error.loc.len() + 1);
                loc.push(LocPart::Key(source.as_str().to_string()));
                loc.extend(error.loc);
                ErrorItem {
                    kind: error.kind.code().to_string(),
                    loc,
                    msg: error.msg,
                    ctx: error.ctx,
                }
            })
            .collect()
    }
}

/// A validation error as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorItem {
    /// Error code, e.g. `missing`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Full location starting with the source group.
    pub loc: Vec<LocPart>,
    /// Human-readable message.
    pub msg: String,
    /// Structured context, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
}

/// Flattens group contexts into the item list of a single validation error.
#[must_use]
pub fn error_items(contexts: Vec<ValidationErrorContext>) -> Vec<ErrorItem> {
    contexts
        .into_iter()
        .flat_map(ValidationErrorContext::into_items)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_items_are_prefixed_with_group() {
        let ctx = ValidationErrorContext::new(
            ParamSource::Header,
            vec![FieldError::missing().at(["x-token"])],
        );
        let items = ctx.into_items();
        assert_eq!(
            serde_json::to_value(&items).unwrap(),
            json!([{"type": "missing", "loc": ["header", "x-token"], "msg": "Field required"}])
        );
    }

    #[test]
    fn test_nested_location_keeps_indexes() {
        let error = FieldError::new(ErrorKind::IntParsing)
            .at([LocPart::from("ids"), LocPart::from(2usize)])
            .under("filters");
        let items = ValidationErrorContext::new(ParamSource::Query, vec![error]).into_items();
        assert_eq!(
            serde_json::to_value(&items[0].loc).unwrap(),
            json!(["query", "filters", "ids", 2])
        );
    }

    #[test]
    fn test_bound_messages() {
        let ge = FieldError::bound(ErrorKind::GreaterThanEqual, "ge", json!(1));
        assert_eq!(ge.msg, "Input should be greater than or equal to 1");
        assert_eq!(ge.ctx, Some(json!({"ge": 1})));

        let short = FieldError::bound(ErrorKind::StringTooShort, "min_length", json!(1));
        assert_eq!(short.msg, "String should have at least 1 character");

        let long = FieldError::bound(ErrorKind::StringTooLong, "max_length", json!(5));
        assert_eq!(long.msg, "String should have at most 5 characters");
    }

    #[test]
    fn test_group_flags() {
        assert!(ParamSource::Form.is_group());
        assert!(!ParamSource::Dependency.is_group());
        assert_eq!(ParamSource::GROUPS.len(), 6);
        assert_eq!(ParamSource::Cookie.to_string(), "cookie");
    }

    #[test]
    fn test_error_items_preserve_group_order() {
        let items = error_items(vec![
            ValidationErrorContext::new(ParamSource::Path, vec![FieldError::missing().at(["id"])]),
            ValidationErrorContext::new(ParamSource::Body, vec![FieldError::missing().at(["payload"])]),
        ]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].loc[0], LocPart::from("path"));
        assert_eq!(items[1].loc[0], LocPart::from("body"));
    }
}

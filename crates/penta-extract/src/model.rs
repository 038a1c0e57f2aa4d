//! Declarative field models.
//!
//! A [`Model`] is an ordered list of [`Field`]s. Models describe request
//! bodies, flattened query/header/cookie/form groups, and response payloads.
//! [`Model::validate`] (see `validate.rs`) turns raw JSON into a validated
//! object keyed by field name.
//!
//! # Example
//!
//! ```rust
//! use penta_extract::{Field, FieldType, Model};
//! use serde_json::json;
//!
//! let item = Model::new("Item")
//!     .field(Field::new("name", FieldType::String).min_length(1))
//!     .field(Field::new("price", FieldType::Number).ge(0.0))
//!     .field(Field::new("tags", FieldType::list(FieldType::String)).default(json!([])))
//!     .forbid_extra();
//!
//! let value = item.validate(&json!({"name": "hat", "price": "9.5"})).unwrap();
//! assert_eq!(value["price"], json!(9.5));
//! assert_eq!(value["tags"], json!([]));
//! ```

use penta_core::{PentaError, PentaResult};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// The declared type of a field or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean with lax string coercion.
    Boolean,
    /// Hyphenated UUID string.
    Uuid,
    /// Anything, passed through untouched.
    Any,
    /// Homogeneous list.
    List(Box<FieldType>),
    /// Nested model.
    Model(Arc<Model>),
}

impl FieldType {
    /// A list of `inner`.
    #[must_use]
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    /// A nested model.
    #[must_use]
    pub fn model(model: Model) -> Self {
        Self::Model(Arc::new(model))
    }

    /// Returns the model if this is a model type.
    #[must_use]
    pub fn as_model(&self) -> Option<&Arc<Model>> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Returns `true` for model types.
    #[must_use]
    pub const fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Returns `true` for list types.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Returns `true` if values of this type can be read from flat strings
    /// (a scalar, or a list of scalars).
    #[must_use]
    pub fn is_flat(&self) -> bool {
        match self {
            Self::Model(_) => false,
            Self::List(inner) => !inner.is_model() && !inner.is_list(),
            _ => true,
        }
    }

    /// Canonical description used for cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> Value {
        match self {
            Self::String => json!("string"),
            Self::Integer => json!("integer"),
            Self::Number => json!("number"),
            Self::Boolean => json!("boolean"),
            Self::Uuid => json!("uuid"),
            Self::Any => json!("any"),
            Self::List(inner) => json!({ "list": inner.fingerprint() }),
            Self::Model(model) => model.fingerprint(),
        }
    }
}

/// A compiled regular expression constraint.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern. Invalid expressions are configuration errors.
    pub fn new(source: &str) -> PentaResult<Self> {
        let regex = Regex::new(source).map_err(|e| {
            PentaError::configuration(format!("invalid pattern '{source}': {e}"))
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the pattern matches anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Value constraints checked after type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Exclusive lower bound.
    pub gt: Option<f64>,
    /// Inclusive lower bound.
    pub ge: Option<f64>,
    /// Exclusive upper bound.
    pub lt: Option<f64>,
    /// Inclusive upper bound.
    pub le: Option<f64>,
    /// Minimum string length in characters.
    pub min_length: Option<usize>,
    /// Maximum string length in characters.
    pub max_length: Option<usize>,
    /// Pattern the string must contain a match of.
    pub pattern: Option<Pattern>,
}

impl Constraints {
    /// Returns `true` if no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Canonical description used for cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> Value {
        json!({
            "gt": self.gt,
            "ge": self.ge,
            "lt": self.lt,
            "le": self.le,
            "min_length": self.min_length,
            "max_length": self.max_length,
            "pattern": self.pattern.as_ref().map(Pattern::as_str),
        })
    }
}

/// One field of a [`Model`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Name used in the validated output.
    pub name: String,
    /// Name used on the wire, if different from `name`.
    pub alias: Option<String>,
    /// Declared type.
    pub ty: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Value used when the field is absent.
    pub default: Option<Value>,
    /// Whether `null` is accepted.
    pub nullable: bool,
    /// Documentation title.
    pub title: Option<String>,
    /// Documentation description.
    pub description: Option<String>,
    /// Post-coercion checks.
    pub constraints: Constraints,
}

impl Field {
    /// Creates a required field.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            ty,
            required: true,
            default: None,
            nullable: false,
            title: None,
            description: None,
            constraints: Constraints::default(),
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Sets the wire name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets a default, making the field optional.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    /// Makes the field optional and nullable, defaulting to `null`.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self.nullable = true;
        self
    }

    /// Accepts `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the documentation title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the documentation description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Requires a value greater than `limit`.
    #[must_use]
    pub fn gt(mut self, limit: f64) -> Self {
        self.constraints.gt = Some(limit);
        self
    }

    /// Requires a value greater than or equal to `limit`.
    #[must_use]
    pub fn ge(mut self, limit: f64) -> Self {
        self.constraints.ge = Some(limit);
        self
    }

    /// Requires a value less than `limit`.
    #[must_use]
    pub fn lt(mut self, limit: f64) -> Self {
        self.constraints.lt = Some(limit);
        self
    }

    /// Requires a value less than or equal to `limit`.
    #[must_use]
    pub fn le(mut self, limit: f64) -> Self {
        self.constraints.le = Some(limit);
        self
    }

    /// Requires at least `len` characters.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.constraints.min_length = Some(len);
        self
    }

    /// Allows at most `len` characters.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.constraints.max_length = Some(len);
        self
    }

    /// Requires a pattern match.
    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.constraints.pattern = Some(pattern);
        self
    }

    /// Canonical description used for cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> Value {
        json!({
            "name": self.name,
            "alias": self.alias,
            "type": self.ty.fingerprint(),
            "required": self.required,
            "default": self.default,
            "nullable": self.nullable,
            "constraints": self.constraints.fingerprint(),
            "title": self.title,
            "description": self.description,
        })
    }
}

/// An ordered set of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Model name, used as the component name in documentation.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Reject undeclared keys.
    pub forbid_extra: bool,
}

impl Model {
    /// Creates an empty model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            forbid_extra: false,
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Rejects keys that match no field.
    #[must_use]
    pub fn forbid_extra(mut self) -> Self {
        self.forbid_extra = true;
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks the definition: unique names and unique wire names, recursively.
    pub fn check(&self) -> PentaResult<()> {
        let mut names = HashSet::new();
        let mut wires = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(PentaError::configuration(format!(
                    "model '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
            if !wires.insert(field.wire_name()) {
                return Err(PentaError::configuration(format!(
                    "model '{}' uses alias '{}' for more than one field",
                    self.name,
                    field.wire_name()
                )));
            }
            if field.required && field.default.is_some() {
                return Err(PentaError::configuration(format!(
                    "field '{}' of model '{}' is both required and defaulted",
                    field.name, self.name
                )));
            }
            let mut ty = &field.ty;
            while let FieldType::List(inner) = ty {
                ty = inner;
            }
            if let FieldType::Model(nested) = ty {
                nested.check()?;
            }
        }
        Ok(())
    }

    /// Canonical description used for cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> Value {
        json!({
            "model": self.name,
            "forbid_extra": self.forbid_extra,
            "fields": self.fields.iter().map(Field::fingerprint).collect::<Vec<_>>(),
        })
    }
}

//! Handler parameter declarations and their classification.
//!
//! A [`Param`] is what an operation declares; [`classify`] decides which
//! source group it is read from and freezes it into a [`ParamSpec`].
//!
//! # Example
//!
//! ```rust
//! use penta_core::ParamSource;
//! use penta_extract::{classify, FieldType, Param};
//!
//! let item_id = classify(&Param::new("item_id", FieldType::Integer), &["item_id"]).unwrap();
//! assert_eq!(item_id.source, ParamSource::Path);
//!
//! let q = classify(&Param::new("q", FieldType::String), &["item_id"]).unwrap();
//! assert_eq!(q.source, ParamSource::Query);
//!
//! let token = classify(&Param::new("x_token", FieldType::String).header(), &[]).unwrap();
//! assert_eq!(token.wire_name(), "x-token");
//! ```

use crate::model::{Constraints, Field, FieldType, Pattern};
use penta_core::{ParamSource, PentaError, PentaResult};
use serde_json::{json, Value};

/// Explicit source markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Path capture.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Cookie.
    Cookie,
    /// JSON body.
    Body,
    /// Urlencoded form body.
    Form,
}

impl Marker {
    /// Returns the source group selected by the marker.
    #[must_use]
    pub const fn source(self) -> ParamSource {
        match self {
            Self::Path => ParamSource::Path,
            Self::Query => ParamSource::Query,
            Self::Header => ParamSource::Header,
            Self::Cookie => ParamSource::Cookie,
            Self::Body => ParamSource::Body,
            Self::Form => ParamSource::Form,
        }
    }
}

/// What a parameter declares itself to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// A typed value read from the request.
    Value(FieldType),
    /// The request object.
    Request,
    /// The output of a named dependency.
    Depends(String),
}

/// A declared handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
    marker: Option<Marker>,
    alias: Option<String>,
    required: Option<bool>,
    default: Option<Value>,
    nullable: bool,
    title: Option<String>,
    description: Option<String>,
    constraints: Constraints,
    embed: bool,
    include_in_schema: bool,
}

impl Param {
    fn with_kind(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            marker: None,
            alias: None,
            required: None,
            default: None,
            nullable: false,
            title: None,
            description: None,
            constraints: Constraints::default(),
            embed: false,
            include_in_schema: true,
        }
    }

    /// Declares a typed parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self::with_kind(name, ParamKind::Value(ty))
    }

    /// Declares a parameter receiving the request object.
    #[must_use]
    pub fn request(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::Request)
    }

    /// Declares a parameter receiving the output of dependency `dependency`.
    #[must_use]
    pub fn depends(name: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::Depends(dependency.into()))
    }

    fn marked(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Reads the parameter from the path.
    #[must_use]
    pub fn path(self) -> Self {
        self.marked(Marker::Path)
    }

    /// Reads the parameter from the query string.
    #[must_use]
    pub fn query(self) -> Self {
        self.marked(Marker::Query)
    }

    /// Reads the parameter from a header.
    #[must_use]
    pub fn header(self) -> Self {
        self.marked(Marker::Header)
    }

    /// Reads the parameter from a cookie.
    #[must_use]
    pub fn cookie(self) -> Self {
        self.marked(Marker::Cookie)
    }

    /// Reads the parameter from the JSON body.
    #[must_use]
    pub fn body(self) -> Self {
        self.marked(Marker::Body)
    }

    /// Reads the parameter from an urlencoded form body.
    #[must_use]
    pub fn form(self) -> Self {
        self.marked(Marker::Form)
    }

    /// Sets the wire name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets a default, making the parameter optional.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Makes the parameter optional and nullable.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self.nullable = true;
        self
    }

    /// Marks the parameter as explicitly required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = Some(true);
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

    /// Keeps a lone body model under its parameter name on the wire.
    #[must_use]
    pub fn embed(mut self) -> Self {
        self.embed = true;
        self
    }

    /// Leaves the parameter out of the generated documentation.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.include_in_schema = false;
        self
    }

    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared kind.
    #[must_use]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }
}

/// A classified parameter. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Declared name; bound arguments use it.
    pub name: String,
    /// The single source group.
    pub source: ParamSource,
    /// Declared type, for value parameters.
    pub ty: Option<FieldType>,
    /// Dependency name, for dependency parameters.
    pub dependency: Option<String>,
    /// Explicit wire name.
    pub alias: Option<String>,
    /// Whether the value must be present.
    pub required: bool,
    /// Value used when absent.
    pub default: Option<Value>,
    /// Whether `null` is accepted.
    pub nullable: bool,
    /// Model type read from a non-body group, expanded field by field.
    pub flatten: bool,
    /// Body model kept under its parameter name.
    pub embed: bool,
    /// Value constraints.
    pub constraints: Constraints,
    /// Documentation title.
    pub title: Option<String>,
    /// Documentation description.
    pub description: Option<String>,
    /// Whether the parameter is documented.
    pub include_in_schema: bool,
}

impl ParamSpec {
    /// Returns the name used on the wire.
    ///
    /// Header parameters without an alias swap `_` for `-`.
    #[must_use]
    pub fn wire_name(&self) -> String {
        match (&self.alias, self.source) {
            (Some(alias), _) => alias.clone(),
            (None, ParamSource::Header) => self.name.replace('_', "-"),
            (None, _) => self.name.clone(),
        }
    }

    /// Builds the group field for a non-flattened value parameter.
    #[must_use]
    pub fn to_field(&self) -> Option<Field> {
        let ty = self.ty.clone()?;
        let wire = self.wire_name();
        Some(Field {
            alias: (wire != self.name).then_some(wire),
            name: self.name.clone(),
            ty,
            required: self.required,
            default: self.default.clone(),
            nullable: self.nullable,
            title: self.title.clone(),
            description: self.description.clone(),
            constraints: self.constraints.clone(),
        })
    }

    /// Canonical description used for cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> Value {
        json!({
            "name": self.name,
            "source": self.source.as_str(),
            "type": self.ty.as_ref().map(FieldType::fingerprint),
            "dependency": self.dependency,
            "alias": self.alias,
            "required": self.required,
            "default": self.default,
            "nullable": self.nullable,
            "flatten": self.flatten,
            "embed": self.embed,
            "constraints": self.constraints.fingerprint(),
            "title": self.title,
            "description": self.description,
            "include_in_schema": self.include_in_schema,
        })
    }
}

/// Classifies a declared parameter.
///
/// `path_names` are the placeholders of the operation's own path template.
pub fn classify(param: &Param, path_names: &[&str]) -> PentaResult<ParamSpec> {
    if param.name.trim().is_empty() {
        return Err(PentaError::configuration("parameter name must not be empty"));
    }
    let name = &param.name;

    let (source, ty, dependency) = match (&param.kind, param.marker) {
        (ParamKind::Request | ParamKind::Depends(_), Some(marker)) => {
            return Err(PentaError::configuration(format!(
                "parameter '{name}' cannot carry a {} marker",
                marker.source()
            )));
        }
        (ParamKind::Value(ty), Some(marker)) => (marker.source(), Some(ty.clone()), None),
        (ParamKind::Request, None) => (ParamSource::Request, None, None),
        (ParamKind::Depends(dep), None) => (ParamSource::Dependency, None, Some(dep.clone())),
        (ParamKind::Value(ty), None) if path_names.contains(&name.as_str()) => {
            (ParamSource::Path, Some(ty.clone()), None)
        }
        (ParamKind::Value(ty @ FieldType::Model(_)), None) => {
            (ParamSource::Body, Some(ty.clone()), None)
        }
        (ParamKind::Value(ty), None) => (ParamSource::Query, Some(ty.clone()), None),
    };

    if param.required == Some(true) && param.default.is_some() {
        return Err(PentaError::configuration(format!(
            "parameter '{name}' is both required and defaulted"
        )));
    }
    if source == ParamSource::Path && (param.default.is_some() || param.required == Some(false)) {
        return Err(PentaError::configuration(format!(
            "path parameter '{name}' cannot be optional or defaulted"
        )));
    }
    if param.embed && source != ParamSource::Body {
        return Err(PentaError::configuration(format!(
            "parameter '{name}' uses embed outside the body"
        )));
    }

    let flatten = source.is_group()
        && source != ParamSource::Body
        && ty.as_ref().is_some_and(FieldType::is_model);
    if flatten {
        if let Some(model) = ty.as_ref().and_then(FieldType::as_model) {
            model.check()?;
            if let Some(field) = model.fields.iter().find(|f| !f.ty.is_flat()) {
                return Err(PentaError::configuration(format!(
                    "field '{}' of '{name}' is nested and cannot be read from the {source}",
                    field.name
                )));
            }
        }
    } else if let Some(FieldType::Model(model)) = &ty {
        model.check()?;
    }

    let required = match source {
        ParamSource::Request | ParamSource::Dependency => true,
        _ => param.required.unwrap_or(param.default.is_none()),
    };

    Ok(ParamSpec {
        name: name.clone(),
        source,
        ty,
        dependency,
        alias: param.alias.clone(),
        required,
        default: param.default.clone(),
        nullable: param.nullable,
        flatten,
        embed: param.embed,
        constraints: param.constraints.clone(),
        title: param.title.clone(),
        description: param.description.clone(),
        include_in_schema: param.include_in_schema,
    })
}

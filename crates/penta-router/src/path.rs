//! Path normalization and path templates.
//!
//! Templates use `{name}` or `{converter:name}` placeholders, one per segment:
//!
//! | Converter | Matches |
//! |---|---|
//! | `str` (default) | any non-empty segment |
//! | `int` | ASCII digits |
//! | `slug` | letters, digits, `-` and `_` |
//! | `uuid` | canonical hyphenated UUID |
//! | `path` | the rest of the path, slashes included (last segment only) |

use crate::error::RouteError;
use crate::params::Params;
use std::borrow::Cow;

/// Collapses repeated `/` and strips one leading and one trailing `/`.
///
/// ```rust
/// use penta_router::normalize_path;
///
/// assert_eq!(normalize_path("//api///items/"), "api/items");
/// assert_eq!(normalize_path("/"), "");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a router prefix and a relative path.
///
/// ```rust
/// use penta_router::join_prefix;
///
/// assert_eq!(join_prefix("/api/", "/items"), "api/items");
/// assert_eq!(join_prefix("", "items/{id}"), "items/{id}");
/// ```
#[must_use]
pub fn join_prefix(prefix: &str, path: &str) -> String {
    normalize_path(&format!("{prefix}/{path}"))
}

/// How a placeholder segment is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Converter {
    /// Any non-empty segment.
    Str,
    /// ASCII digits.
    Int,
    /// Letters, digits, `-` and `_`.
    Slug,
    /// Canonical hyphenated UUID.
    Uuid,
    /// The remainder of the path.
    Path,
}

impl Converter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "slug" => Some(Self::Slug),
            "uuid" => Some(Self::Uuid),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    fn accepts(self, segment: &str) -> bool {
        if segment.is_empty() {
            return false;
        }
        match self {
            Self::Str | Self::Path => true,
            Self::Int => segment.bytes().all(|b| b.is_ascii_digit()),
            Self::Slug => segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'),
            Self::Uuid => is_uuid(segment),
        }
    }
}

fn is_uuid(segment: &str) -> bool {
    let groups: Vec<&str> = segment.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// A single template segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the request segment.
    Literal(String),
    /// Captures the request segment under `name`.
    Param {
        /// Capture name.
        name: String,
        /// Matching rule.
        converter: Converter,
    },
}

/// A parsed, normalized path template.
///
/// # Example
///
/// ```rust
/// use penta_router::PathTemplate;
///
/// let template = PathTemplate::parse("/items/{int:item_id}/").unwrap();
/// assert_eq!(template.as_str(), "items/{int:item_id}");
/// assert_eq!(template.param_names(), vec!["item_id"]);
///
/// let params = template.match_path("items/42").unwrap();
/// assert_eq!(params.get("item_id"), Some("42"));
/// assert!(template.match_path("items/abc").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses and normalizes a template.
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        let raw = normalize_path(template);
        let invalid = |reason: &str| RouteError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let parts: Vec<&str> = if raw.is_empty() {
            Vec::new()
        } else {
            raw.split('/').collect()
        };
        let last = parts.len().saturating_sub(1);

        for (index, part) in parts.iter().enumerate() {
            if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                let (converter, name) = match inner.split_once(':') {
                    Some((conv, name)) => (
                        Converter::parse(conv.trim())
                            .ok_or_else(|| invalid(&format!("unknown converter '{conv}'")))?,
                        name.trim(),
                    ),
                    None => (Converter::Str, inner.trim()),
                };
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid(&format!("invalid parameter name '{name}'")));
                }
                if converter == Converter::Path && index != last {
                    return Err(invalid("a path converter must be the last segment"));
                }
                if names.iter().any(|n| n == name) {
                    return Err(invalid(&format!("duplicate parameter '{name}'")));
                }
                names.push(name.to_string());
                segments.push(Segment::Param {
                    name: name.to_string(),
                    converter,
                });
            } else if part.contains('{') || part.contains('}') {
                return Err(invalid("placeholders must span a whole segment"));
            } else {
                segments.push(Segment::Literal((*part).to_string()));
            }
        }

        Ok(Self { raw, segments })
    }

    /// Returns the normalized template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the capture names in order.
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Returns the template in OpenAPI form: leading `/`, converters removed.
    #[must_use]
    pub fn openapi_path(&self) -> String {
        let body = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Param { name, .. } => format!("{{{name}}}"),
            })
            .collect::<Vec<_>>()
            .join("/");
        format!("/{body}")
    }

    /// Matches a normalized request path, returning the captures.
    ///
    /// Each segment is percent-decoded before it is compared or captured,
    /// so literals match their encoded spelling too. A segment that does
    /// not decode to UTF-8 never matches.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let parts: Vec<Cow<'_, str>> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/')
                .map(urlencoding::decode)
                .collect::<Result<_, _>>()
                .ok()?
        };
        let mut params = Params::new();
        let mut index = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    if parts.get(index).map(AsRef::as_ref) != Some(text.as_str()) {
                        return None;
                    }
                    index += 1;
                }
                Segment::Param {
                    name,
                    converter: Converter::Path,
                } => {
                    if index >= parts.len() {
                        return None;
                    }
                    params.push(name.clone(), parts[index..].join("/"));
                    index = parts.len();
                }
                Segment::Param { name, converter } => {
                    let part = parts.get(index)?;
                    if !converter.accepts(part) {
                        return None;
                    }
                    params.push(name.clone(), part.as_ref());
                    index += 1;
                }
            }
        }

        (index == parts.len()).then_some(params)
    }

    /// Fills the placeholders, producing a path with a leading `/`.
    ///
    /// Values are percent-encoded; a `path` value keeps its `/` separators.
    /// Returns `None` if a capture is missing or its value would not match
    /// the converter.
    #[must_use]
    pub fn render(&self, params: &Params) -> Option<String> {
        let mut parts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => parts.push(text.clone()),
                Segment::Param { name, converter } => {
                    let value = params.get(name)?;
                    if !converter.accepts(value)
                        || (*converter != Converter::Path && value.contains('/'))
                    {
                        return None;
                    }
                    let encoded: Vec<Cow<'_, str>> = value.split('/').map(urlencoding::encode).collect();
                    parts.push(encoded.join("/"));
                }
            }
        }
        Some(format!("/{}", parts.join("/")))
    }
}

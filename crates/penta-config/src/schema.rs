//! Configuration schema types.
//!
//! Every section rejects unknown keys and falls back to defaults for
//! anything left unset.

use serde::{Deserialize, Serialize};

/// `[api]` section: metadata and registration of one API instance.
///
/// # Example
///
/// ```
/// use penta_config::ApiSection;
///
/// let api = ApiSection::default();
/// assert_eq!(api.title, "Penta");
/// assert_eq!(api.namespace(), "api-1.0.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiSection {
    /// Document title.
    #[serde(default = "default_title")]
    pub title: String,

    /// API version string, also used for the default namespace.
    #[serde(default = "default_version")]
    pub version: String,

    /// Long description shown in the schema document.
    #[serde(default)]
    pub description: Option<String>,

    /// Namespace for URL reversing. Defaults to `api-<version>`.
    #[serde(default)]
    pub urls_namespace: Option<String>,

    /// Debug mode: unmatched errors are rendered as plain-text traces.
    #[serde(default)]
    pub debug: bool,

    /// Skip the duplicate-namespace check.
    #[serde(default)]
    pub skip_registry: bool,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            version: default_version(),
            description: None,
            urls_namespace: None,
            debug: false,
            skip_registry: false,
        }
    }
}

impl ApiSection {
    /// The effective namespace.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.urls_namespace
            .clone()
            .unwrap_or_else(|| format!("api-{}", self.version))
    }
}

fn default_title() -> String {
    "Penta".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A `servers` entry of the schema document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerEntry {
    /// Base URL.
    pub url: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// `[docs]` section: where the schema document and docs page are served.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DocsSection {
    /// Path of the JSON schema document.
    #[serde(default = "default_openapi_url")]
    pub openapi_url: String,

    /// Path of the interactive docs page. `None` disables it.
    #[serde(default = "default_docs_url")]
    pub docs_url: Option<String>,

    /// Servers listed in the document.
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Default for DocsSection {
    fn default() -> Self {
        Self {
            openapi_url: default_openapi_url(),
            docs_url: default_docs_url(),
            servers: Vec::new(),
        }
    }
}

fn default_openapi_url() -> String {
    "/openapi.json".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_docs_url() -> Option<String> {
    Some("/docs".to_string())
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. "info" or "penta=debug,warn").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include the module path of each event.
    #[serde(default = "default_true")]
    pub include_target: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_line_info: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_target: true,
            file_line_info: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

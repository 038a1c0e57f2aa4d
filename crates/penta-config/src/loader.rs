//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, LogFormat, PentaConfig};

/// Prefix for `PREFIX__SECTION__KEY` overrides.
pub const DEFAULT_ENV_PREFIX: &str = "PENTA";

/// Variable that disables the duplicate-namespace check when set to anything
/// other than a false value.
pub const SKIP_REGISTRY_VAR: &str = "PENTA_SKIP_REGISTRY";

/// Whether [`SKIP_REGISTRY_VAR`] asks to skip the namespace registry.
#[must_use]
pub fn skip_registry_from_env() -> bool {
    env::var(SKIP_REGISTRY_VAR).map_or(false, |value| parse_bool(&value) != Some(false))
}

/// Configuration loader.
///
/// Each file or string layer is deep-merged over the current values, so a
/// file only needs the keys it changes. Environment overrides are applied in
/// [`load`](Self::load), followed by validation.
///
/// # Example
///
/// ```
/// use penta_config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_development()
///     .with_string("[api]\ntitle = \"Shop\"", "toml")
///     .unwrap()
///     .load()
///     .unwrap();
///
/// assert_eq!(config.api.title, "Shop");
/// assert!(config.api.debug);
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: PentaConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = PentaConfig::default();
        self
    }

    /// Reset to the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PentaConfig::development();
        self
    }

    /// Reset to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = PentaConfig::production();
        self
    }

    /// Merge a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has an
    /// unsupported extension, or fails to parse (unknown keys included).
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.with_string(&content, &format)
    }

    /// Merge a file if it exists.
    ///
    /// # Errors
    ///
    /// Same as [`with_file`](Self::with_file) for an existing file.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merge configuration text in `format` ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the format is unknown or parsing fails.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = match format.to_lowercase().as_str() {
            "toml" => serde_json::to_value(toml::from_str::<toml::Table>(content)?)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        self.merge_layer(layer)?;
        Ok(self)
    }

    /// Apply `PREFIX__SECTION__KEY` variables in [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load `.env` from the working directory into the process environment.
    ///
    /// A missing file is not an error. Variables already set are kept.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!("invalid .env file: {e}"))),
        }
    }

    /// Apply environment overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation fails.
    pub fn load(mut self) -> Result<PentaConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        if skip_registry_from_env() {
            self.config.api.skip_registry = true;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> PentaConfig {
        self.config
    }

    fn merge_layer(&mut self, layer: Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&self.config)?;
        deep_merge(&mut base, layer);
        self.config = serde_json::from_value(base)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let rest = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = rest.split("__").collect();
        let flag = || parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"));

        match parts.as_slice() {
            ["API", "TITLE"] => self.config.api.title = value.to_string(),
            ["API", "VERSION"] => self.config.api.version = value.to_string(),
            ["API", "DESCRIPTION"] => self.config.api.description = non_empty(value),
            ["API", "URLS_NAMESPACE"] => self.config.api.urls_namespace = non_empty(value),
            ["API", "DEBUG"] => self.config.api.debug = flag()?,
            ["API", "SKIP_REGISTRY"] => self.config.api.skip_registry = flag()?,

            ["DOCS", "OPENAPI_URL"] => self.config.docs.openapi_url = value.to_string(),
            ["DOCS", "DOCS_URL"] => self.config.docs.docs_url = non_empty(value),

            ["LOGGING", "ENABLED"] => self.config.logging.enabled = flag()?,
            ["LOGGING", "LEVEL"] => self.config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'"))
                    }
                };
            }
            ["LOGGING", "INCLUDE_TARGET"] => self.config.logging.include_target = flag()?,
            ["LOGGING", "FILE_LINE_INFO"] => self.config.logging.file_line_info = flag()?,

            // Unknown keys belong to someone else.
            _ => {}
        }

        Ok(())
    }
}

fn deep_merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

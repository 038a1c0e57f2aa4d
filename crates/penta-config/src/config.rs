//! The root [`PentaConfig`] type.

use serde::{Deserialize, Serialize};

use crate::{ApiSection, ConfigError, DocsSection, LogFormat, LoggingSection};

/// Complete configuration of one API instance.
///
/// # Example
///
/// ```
/// use penta_config::PentaConfig;
///
/// let config = PentaConfig::default();
/// assert_eq!(config.docs.openapi_url, "/openapi.json");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct PentaConfig {
    /// API metadata.
    #[serde(default)]
    pub api: ApiSection,

    /// Schema document and docs page locations.
    #[serde(default)]
    pub docs: DocsSection,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl PentaConfig {
    /// Checks values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty title or version, or a
    /// URL not starting with `/`, and `ConfigError::ValidationError` when the
    /// docs page and the schema document share a path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.title.trim().is_empty() {
            return Err(ConfigError::invalid_value("api.title", "must not be empty"));
        }
        if self.api.version.trim().is_empty() {
            return Err(ConfigError::invalid_value("api.version", "must not be empty"));
        }
        if matches!(&self.api.urls_namespace, Some(ns) if ns.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "api.urls_namespace",
                "must not be empty",
            ));
        }

        check_url("docs.openapi_url", &self.docs.openapi_url)?;
        if let Some(docs_url) = &self.docs.docs_url {
            check_url("docs.docs_url", docs_url)?;
            if *docs_url == self.docs.openapi_url {
                return Err(ConfigError::validation_error(format!(
                    "docs.docs_url and docs.openapi_url are both '{docs_url}'"
                )));
            }
        }

        if let Some(server) = self.docs.servers.iter().find(|s| s.url.is_empty()) {
            return Err(ConfigError::invalid_value(
                "docs.servers",
                format!("server url must not be empty ({server:?})"),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        Ok(())
    }

    /// Debug mode with pretty debug-level logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.api.debug = true;
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.file_line_info = true;
        config
    }

    /// JSON logs at info level, no docs page.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.api.debug = false;
        config.docs.docs_url = None;
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, format!("'{url}' must start with '/'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerEntry;

    #[test]
    fn test_default_is_valid() {
        assert!(PentaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = PentaConfig::development();
        assert!(dev.api.debug);
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert!(dev.validate().is_ok());

        let prod = PentaConfig::production();
        assert!(!prod.api.debug);
        assert_eq!(prod.docs.docs_url, None);
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut config = PentaConfig::default();
        config.api.title = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "api.title"
        ));
    }

    #[test]
    fn test_relative_url_rejected() {
        let mut config = PentaConfig::default();
        config.docs.openapi_url = "openapi.json".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "docs.openapi_url"
        ));
    }

    #[test]
    fn test_url_clash_rejected() {
        let mut config = PentaConfig::default();
        config.docs.docs_url = Some("/openapi.json".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_empty_server_url_rejected() {
        let mut config = PentaConfig::default();
        config.docs.servers.push(ServerEntry {
            url: String::new(),
            description: None,
        });
        assert!(config.validate().is_err());
    }
}

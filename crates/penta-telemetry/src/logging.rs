//! Subscriber setup and request lifecycle events.
//!
//! [`LogConfig`] carries what the `[logging]` config section controls; build
//! it with `LogConfig::from(&config.logging)` and pass it to
//! [`init_logging`] once at startup.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use penta_config::{LogFormat, LoggingSection};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Settings for [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Install nothing when `false`.
    pub enabled: bool,
    /// `EnvFilter` directives, e.g. `penta=debug,warn`.
    pub filter: String,
    /// JSON lines or pretty output.
    pub format: LogFormat,
    /// Print each event's module path.
    pub include_target: bool,
    /// Print the source file and line of each event.
    pub file_line_info: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingSection::default())
    }
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        Self {
            enabled: section.enabled,
            filter: section.level.clone(),
            format: section.format,
            include_target: section.include_target,
            file_line_info: section.file_line_info,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for bad filter directives and
/// `TelemetryError::LoggingInit` when a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }
    let filter = create_env_filter(&config.filter)?;

    let output = tracing_subscriber::fmt::layer()
        .with_target(config.include_target)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info);
    let output = match config.format {
        LogFormat::Json => output.json().boxed(),
        LogFormat::Pretty => output.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses `EnvFilter` directives.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` naming the rejected directives.
pub fn create_env_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| TelemetryError::InvalidConfig(format!("invalid log level '{directives}': {e}")))
}

/// Field names emitted by the request lifecycle macros.
pub mod fields {
    /// UUID v7 of the request.
    pub const REQUEST_ID: &str = "request_id";
    /// Resolved operation id, `-` for docs routes and routing failures.
    pub const OPERATION_ID: &str = "operation_id";
    /// Request method.
    pub const HTTP_METHOD: &str = "http.method";
    /// Request path as received.
    pub const HTTP_PATH: &str = "http.path";
    /// Response status.
    pub const HTTP_STATUS: &str = "http.status_code";
    /// Time spent in `Api::handle`, in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// Display form of an error returned to the host.
    pub const ERROR: &str = "error";
}

/// Logs a request start event.
#[macro_export]
macro_rules! log_request_start {
    ($request_id:expr, $method:expr, $path:expr, $operation:expr) => {
        tracing::info!(
            request_id = %$request_id,
            http.method = %$method,
            http.path = %$path,
            operation_id = %$operation,
            "Request started"
        );
    };
}

/// Logs a request completion event.
#[macro_export]
macro_rules! log_request_complete {
    ($request_id:expr, $status:expr, $duration_ms:expr) => {
        tracing::info!(
            request_id = %$request_id,
            http.status_code = $status,
            duration_ms = $duration_ms,
            "Request completed"
        );
    };
}

/// Logs a request error event.
#[macro_export]
macro_rules! log_request_error {
    ($request_id:expr, $error:expr) => {
        tracing::error!(
            request_id = %$request_id,
            error = %$error,
            "Request failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_follows_logging_section() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, LoggingSection::default().level);
    }

    #[test]
    fn test_from_logging_section() {
        let section = LoggingSection {
            enabled: true,
            level: "penta=debug,warn".to_string(),
            format: LogFormat::Pretty,
            include_target: false,
            file_line_info: true,
        };
        let config = LogConfig::from(&section);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.include_target);
        assert!(config.file_line_info);
        assert_eq!(config.filter, "penta=debug,warn");
    }

    #[test]
    fn test_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("penta_core=trace,warn").is_ok());
        assert!(matches!(
            create_env_filter("penta=notalevel"),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_disabled_logging_installs_nothing() {
        let config = LogConfig {
            enabled: false,
            filter: "penta=notalevel".to_string(),
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_lifecycle_macros_expand() {
        let request_id = "req-1";
        log_request_start!(request_id, "GET", "/items/1", "get_item");
        log_request_complete!(request_id, 200u16, 3u64);
        log_request_error!(request_id, "boom");
        assert_eq!(fields::HTTP_STATUS, "http.status_code");
    }
}

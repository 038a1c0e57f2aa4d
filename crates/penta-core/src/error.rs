//! Error types for Penta.
//!
//! [`PentaError`] is the single error type flowing through registration and
//! request handling. Registration problems surface as
//! [`PentaError::Configuration`] from the builder and abort startup. Every
//! other variant is produced while handling a request and is turned into a
//! response by the application's error translator.
//!
//! | Variant | Category | Default status |
//! |---|---|---|
//! | `Configuration` | `Configuration` | 500 |
//! | `Validation` | `Validation` | 422 |
//! | `Authentication` | `Authentication` | 401 |
//! | `Authorization` | `Authorization` | 403 |
//! | `Throttled` | `RateLimited` | 429 |
//! | `Http` | `Http` | carried status |
//! | `NotFound` | `NotFound` | 404 |
//! | `MethodNotAllowed` | `MethodNotAllowed` | 405 |
//! | `Internal`, `Custom` | `Internal` | 500 |

use crate::validation::{error_items, ErrorItem, ValidationErrorContext};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`PentaError`].
pub type PentaResult<T> = Result<T, PentaError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid registration or response configuration.
    Configuration,
    /// Request validation errors.
    Validation,
    /// Authentication errors (missing or rejected credentials).
    Authentication,
    /// Authorization errors (permission denied).
    Authorization,
    /// Rate limiting.
    RateLimited,
    /// Explicit HTTP error raised by a handler or dependency.
    Http,
    /// No route matched.
    NotFound,
    /// A route matched but not for this method.
    MethodNotAllowed,
    /// Internal server errors.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Configuration | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Http => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Returns `true` for categories that behave like explicit HTTP errors
    /// (a status plus a `detail` message).
    #[must_use]
    pub const fn is_http_family(&self) -> bool {
        matches!(
            self,
            Self::Authentication | Self::Authorization | Self::RateLimited | Self::Http
        )
    }
}

/// Standard error type for Penta.
///
/// # Example
///
/// ```
/// use penta_core::{ErrorCategory, PentaError};
///
/// fn load(id: i64) -> Result<(), PentaError> {
///     if id < 0 {
///         return Err(PentaError::http(http::StatusCode::BAD_REQUEST, "negative id"));
///     }
///     Ok(())
/// }
///
/// let err = load(-1).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Http);
/// assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
/// ```
#[derive(Error, Debug)]
pub enum PentaError {
    /// Invalid registration, composition, or response configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {} invalid field(s)", .errors.len())]
    Validation {
        /// Client-facing error items.
        errors: Vec<ErrorItem>,
    },

    /// No authenticator accepted the request.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The caller is known but not allowed.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// A throttle denied the request.
    #[error("Throttled: {message}")]
    Throttled {
        /// Human-readable error message.
        message: String,
        /// Time until the request would be allowed, when known.
        wait: Option<Duration>,
    },

    /// Explicit HTTP error with a status and a client-facing message.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status.
        status: StatusCode,
        /// Client-facing message.
        message: String,
    },

    /// No route matched the request path.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The path matched but the method is not registered there.
    #[error("Method not allowed: {method}")]
    MethodNotAllowed {
        /// The rejected method.
        method: Method,
        /// Methods registered for the path.
        allowed: Vec<Method>,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A typed application error, matched by its concrete type during translation.
    #[error(transparent)]
    Custom(anyhow::Error),
}

impl PentaError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a validation error from client-facing items.
    #[must_use]
    pub fn validation(errors: Vec<ErrorItem>) -> Self {
        Self::Validation { errors }
    }

    /// Combines the failures of every group into one validation error.
    #[must_use]
    pub fn from_contexts(contexts: Vec<ValidationErrorContext>) -> Self {
        Self::Validation {
            errors: error_items(contexts),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// The standard 401 raised when every authenticator declines.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::authentication("Unauthorized")
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// The standard 403.
    #[must_use]
    pub fn forbidden() -> Self {
        Self::authorization("Forbidden")
    }

    /// Creates a throttled error with an optional wait hint.
    #[must_use]
    pub fn throttled(wait: Option<Duration>) -> Self {
        Self::Throttled {
            message: "Too many requests.".to_string(),
            wait,
        }
    }

    /// Creates an explicit HTTP error.
    #[must_use]
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method-not-allowed error.
    #[must_use]
    pub fn method_not_allowed(method: Method, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed { method, allowed }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wraps a typed application error.
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Custom(anyhow::Error::new(error))
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::Throttled { .. } => ErrorCategory::RateLimited,
            Self::Http { .. } => ErrorCategory::Http,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::Internal { .. } | Self::Custom(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            other => other.category().default_status_code(),
        }
    }

    /// Returns the message exposed to clients for HTTP-family errors.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Authentication { message }
            | Self::Authorization { message }
            | Self::Throttled { message, .. }
            | Self::Http { message, .. }
            | Self::NotFound { message }
            | Self::Configuration { message }
            | Self::Internal { message, .. } => message.clone(),
            Self::Validation { .. } => "Validation error".to_string(),
            Self::MethodNotAllowed { .. } => "Method not allowed".to_string(),
            Self::Custom(error) => error.to_string(),
        }
    }

    /// Returns the `{"detail": ...}` body used by the default translations.
    #[must_use]
    pub fn detail(&self) -> Value {
        match self {
            Self::Validation { errors } => json!({ "detail": errors }),
            other => json!({ "detail": other.client_message() }),
        }
    }

    /// Returns the validation items if this is a validation error.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&[ErrorItem]> {
        match self {
            Self::Validation { errors } => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{FieldError, ParamSource};

    #[test]
    fn test_validation_status_and_detail() {
        let error = PentaError::from_contexts(vec![ValidationErrorContext::new(
            ParamSource::Query,
            vec![FieldError::missing().at(["q"])],
        )]);
        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            error.detail(),
            json!({"detail": [{"type": "missing", "loc": ["query", "q"], "msg": "Field required"}]})
        );
        assert!(error.to_string().contains("1 invalid field"));
    }

    #[test]
    fn test_auth_errors() {
        let error = PentaError::unauthorized();
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.detail(), json!({"detail": "Unauthorized"}));

        let error = PentaError::forbidden();
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert!(error.category().is_http_family());
    }

    #[test]
    fn test_throttled_carries_wait() {
        let error = PentaError::throttled(Some(Duration::from_secs(3)));
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error.client_message(), "Too many requests.");
        match error {
            PentaError::Throttled { wait, .. } => assert_eq!(wait, Some(Duration::from_secs(3))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_http_error_uses_carried_status() {
        let error = PentaError::http(StatusCode::CONFLICT, "already exists");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.detail(), json!({"detail": "already exists"}));
    }

    #[test]
    fn test_custom_error_downcasts() {
        #[derive(Debug, thiserror::Error)]
        #[error("quota exhausted")]
        struct QuotaError;

        let error = PentaError::custom(QuotaError);
        assert_eq!(error.category(), ErrorCategory::Internal);
        match &error {
            PentaError::Custom(inner) => assert!(inner.is::<QuotaError>()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(error.to_string(), "quota exhausted");
    }

    #[test]
    fn test_all_error_categories_have_status_codes() {
        let categories = [
            ErrorCategory::Configuration,
            ErrorCategory::Validation,
            ErrorCategory::Authentication,
            ErrorCategory::Authorization,
            ErrorCategory::RateLimited,
            ErrorCategory::Http,
            ErrorCategory::NotFound,
            ErrorCategory::MethodNotAllowed,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "Category {:?} should map to error status code, got {}",
                category,
                status
            );
        }
    }
}

//! Routing errors.

use http::Method;
use thiserror::Error;

/// Errors from template parsing and route resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No template matched the path.
    #[error("no route matches path '{path}'")]
    NotFound {
        /// The request path.
        path: String,
    },

    /// A template matched but the method is not registered there.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        /// The request method.
        method: Method,
        /// Methods registered for the matched template.
        allowed: Vec<Method>,
    },

    /// A template could not be parsed.
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate {
        /// The template as given.
        template: String,
        /// What is wrong with it.
        reason: String,
    },
}

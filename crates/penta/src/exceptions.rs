//! Error translation.
//!
//! Handlers are registered against an [`ErrorMatcher`]. To translate an error
//! the translator walks the error's ancestry from most to least specific and
//! uses the first handler registered for a level:
//!
//! - a custom error: its concrete type, then [`ErrorMatcher::Any`]
//! - any other error: its [`ErrorCategory`], then the HTTP family when the
//!   category belongs to it, then [`ErrorMatcher::Any`]
//!
//! Registering a second handler for the same matcher replaces the first.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use penta_core::{ErrorCategory, PentaError, Reply, Request};
use penta_middleware::{headers, retry_after_secs};
use penta_router::allow_header;
use serde_json::json;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Turns an error into a reply.
pub type ExceptionHandler = Arc<dyn Fn(&Request, &PentaError) -> Reply + Send + Sync>;

/// Groups of error categories handled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    /// Authentication, authorization, throttling and plain HTTP errors.
    Http,
}

/// What a handler is registered for.
#[derive(Clone, Copy)]
pub enum ErrorMatcher {
    /// A concrete custom error type carried by [`PentaError::Custom`].
    Type {
        /// Type id of the error.
        id: TypeId,
        /// Type name, for logs.
        name: &'static str,
        /// Tests whether an error holds this type.
        matches: fn(&anyhow::Error) -> bool,
    },
    /// One error category.
    Kind(ErrorCategory),
    /// A family of categories.
    Family(ErrorFamily),
    /// Every error.
    Any,
}

impl ErrorMatcher {
    /// Matches custom errors of type `E`.
    #[must_use]
    pub fn of<E>() -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::Type {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
            matches: |error| error.is::<E>(),
        }
    }

    fn matches(&self, level: &Level<'_>) -> bool {
        match (self, level) {
            (Self::Type { matches, .. }, Level::Type(error)) => matches(error),
            (Self::Kind(kind), Level::Kind(category)) => kind == category,
            (Self::Family(family), Level::Family(other)) => family == other,
            (Self::Any, Level::Any) => true,
            _ => false,
        }
    }
}

impl PartialEq for ErrorMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            (Self::Kind(a), Self::Kind(b)) => a == b,
            (Self::Family(a), Self::Family(b)) => a == b,
            (Self::Any, Self::Any) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorMatcher {}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => f.debug_tuple("Type").field(name).finish(),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Family(family) => f.debug_tuple("Family").field(family).finish(),
            Self::Any => f.write_str("Any"),
        }
    }
}

enum Level<'e> {
    Type(&'e anyhow::Error),
    Kind(ErrorCategory),
    Family(ErrorFamily),
    Any,
}

fn ancestry(error: &PentaError) -> Vec<Level<'_>> {
    if let PentaError::Custom(inner) = error {
        return vec![Level::Type(inner), Level::Any];
    }
    let category = error.category();
    let mut levels = vec![Level::Kind(category)];
    if category.is_http_family() {
        levels.push(Level::Family(ErrorFamily::Http));
    }
    levels.push(Level::Any);
    levels
}

/// Ordered exception handlers.
#[derive(Clone, Default)]
pub struct ErrorTranslator {
    handlers: Vec<(ErrorMatcher, ExceptionHandler)>,
}

impl ErrorTranslator {
    /// Creates a translator with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a translator with the built-in handlers.
    ///
    /// In debug mode a catch-all handler renders the error chain as text.
    #[must_use]
    pub fn with_defaults(debug: bool) -> Self {
        let mut translator = Self::new();
        translator.add(ErrorMatcher::Kind(ErrorCategory::Validation), Arc::new(detail_reply));
        translator.add(ErrorMatcher::Family(ErrorFamily::Http), Arc::new(http_reply));
        translator.add(
            ErrorMatcher::Kind(ErrorCategory::NotFound),
            Arc::new(move |_: &Request, error: &PentaError| not_found_reply(error, debug)),
        );
        translator.add(
            ErrorMatcher::Kind(ErrorCategory::MethodNotAllowed),
            Arc::new(method_not_allowed_reply),
        );
        translator.add(
            ErrorMatcher::Kind(ErrorCategory::Configuration),
            Arc::new(configuration_reply),
        );
        if debug {
            translator.add(ErrorMatcher::Any, Arc::new(debug_reply));
        }
        translator
    }

    /// Registers `handler`, replacing any handler for the same matcher.
    pub fn add(&mut self, matcher: ErrorMatcher, handler: ExceptionHandler) {
        match self.handlers.iter_mut().find(|(m, _)| *m == matcher) {
            Some(slot) => slot.1 = handler,
            None => self.handlers.push((matcher, handler)),
        }
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Finds the handler for `error` and runs it.
    ///
    /// # Errors
    ///
    /// Hands `error` back unchanged when no handler matches.
    pub fn translate(&self, request: &Request, error: PentaError) -> Result<Reply, PentaError> {
        let reply = ancestry(&error).iter().find_map(|level| {
            self.handlers
                .iter()
                .find(|(matcher, _)| matcher.matches(level))
                .map(|(matcher, handler)| {
                    tracing::trace!(matcher = ?matcher, "exception handler selected");
                    handler(request, &error)
                })
        });
        reply.ok_or(error)
    }
}

impl fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(matcher, _)| matcher))
            .finish()
    }
}

fn detail_reply(_: &Request, error: &PentaError) -> Reply {
    Reply::with_status(error.status_code(), error.detail())
}

fn http_reply(request: &Request, error: &PentaError) -> Reply {
    let reply = detail_reply(request, error);
    match error {
        PentaError::Throttled { wait: Some(wait), .. } => {
            reply.header(headers::RETRY_AFTER, &retry_after_secs(*wait).to_string())
        }
        _ => reply,
    }
}

fn not_found_reply(error: &PentaError, debug: bool) -> Reply {
    let detail = match error {
        PentaError::NotFound { message } if debug => format!("Not Found: {message}"),
        _ => "Not Found".to_string(),
    };
    Reply::with_status(StatusCode::NOT_FOUND, json!({ "detail": detail }))
}

fn method_not_allowed_reply(_: &Request, error: &PentaError) -> Reply {
    let reply = Reply::with_status(
        StatusCode::METHOD_NOT_ALLOWED,
        json!({ "detail": "Method not allowed" }),
    );
    match error {
        PentaError::MethodNotAllowed { allowed, .. } => {
            reply.header(http::header::ALLOW.as_str(), &allow_header(allowed))
        }
        _ => reply,
    }
}

fn configuration_reply(request: &Request, error: &PentaError) -> Reply {
    tracing::error!(
        error = %error,
        http.path = request.path(),
        "configuration error while handling request"
    );
    Reply::with_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "detail": "Internal configuration error" }),
    )
}

fn debug_reply(_: &Request, error: &PentaError) -> Reply {
    let mut text = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push_str("\n\nCaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }

    let mut response = http::Response::new(Bytes::from(text));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Reply::raw(response)
}

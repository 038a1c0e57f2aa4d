//! Request context types.
//!
//! The [`RequestContext`] carries per-request state from authentication,
//! through binding, into the handler.

use crate::args::BoundArgs;
use crate::identity::Identity;
use crate::validation::ValidationErrorContext;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request sortable.
///
/// # Example
///
/// ```
/// use penta_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request state.
///
/// Created by the dispatcher when a route matches. Authentication sets the
/// identity, binding fills the arguments or the error contexts, and the
/// handler receives the finished context inside its [`Call`](crate::Call).
///
/// # Example
///
/// ```
/// use penta_core::{Identity, RequestContext};
///
/// let ctx = RequestContext::new()
///     .with_operation_id("items_get_item")
///     .with_identity(Identity::user("u1"));
/// assert_eq!(ctx.operation_id(), Some("items_get_item"));
/// assert!(ctx.identity().is_authenticated());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    identity: Identity,
    operation_id: Option<String>,
    args: BoundArgs,
    error_contexts: Vec<ValidationErrorContext>,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a new request context with a fresh request ID and an anonymous caller.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a new request context with the specified request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: Identity::Anonymous,
            operation_id: None,
            args: BoundArgs::new(),
            error_contexts: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the caller identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    /// Returns a new context with the specified identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Returns the operation ID if set.
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    /// Returns a new context with the specified operation ID.
    #[must_use]
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Returns the bound handler arguments.
    #[must_use]
    pub const fn args(&self) -> &BoundArgs {
        &self.args
    }

    /// Replaces the bound handler arguments.
    pub fn set_args(&mut self, args: BoundArgs) {
        self.args = args;
    }

    /// Returns the validation failures recorded for this request.
    #[must_use]
    pub fn error_contexts(&self) -> &[ValidationErrorContext] {
        &self.error_contexts
    }

    /// Records the failures of one source group.
    pub fn push_error_context(&mut self, context: ValidationErrorContext) {
        self.error_contexts.push(context);
    }

    /// Removes and returns all recorded failures.
    pub fn take_error_contexts(&mut self) -> Vec<ValidationErrorContext> {
        std::mem::take(&mut self.error_contexts)
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{FieldError, ParamSource};

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2, "Each RequestId should be unique");
    }

    #[test]
    fn test_request_id_display() {
        let display = RequestId::new().to_string();
        assert_eq!(display.len(), 36, "UUID string should be 36 characters");
    }

    #[test]
    fn test_request_context_defaults() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.identity(), &Identity::Anonymous);
        assert!(ctx.operation_id().is_none());
        assert!(ctx.args().is_empty());
        assert!(ctx.error_contexts().is_empty());
    }

    #[test]
    fn test_error_contexts_accumulate_and_drain() {
        let mut ctx = RequestContext::new();
        ctx.push_error_context(ValidationErrorContext::new(
            ParamSource::Query,
            vec![FieldError::missing().at(["q"])],
        ));
        ctx.push_error_context(ValidationErrorContext::new(
            ParamSource::Header,
            vec![FieldError::missing().at(["x-token"])],
        ));
        assert_eq!(ctx.error_contexts().len(), 2);

        let drained = ctx.take_error_contexts();
        assert_eq!(drained.len(), 2);
        assert!(ctx.error_contexts().is_empty());
    }

    #[test]
    fn test_request_context_elapsed() {
        let ctx = RequestContext::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed() >= std::time::Duration::from_millis(10));
    }
}

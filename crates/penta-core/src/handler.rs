//! Handler abstraction.
//!
//! Handlers receive a [`Call`] holding the request context (identity, bound
//! arguments) and the shared request. Both plain functions and functions
//! returning futures are supported; [`Invocation`] tells the dispatcher which
//! one it got so that only async handlers are awaited.
//!
//! # Example
//!
//! ```rust
//! use penta_core::{sync_handler, Call, PentaResult, Reply};
//! use serde_json::json;
//!
//! let handler = sync_handler("items::get_item", |call: Call| -> PentaResult<Reply> {
//!     let item_id: i64 = call.arg("item_id")?;
//!     Ok(Reply::new(json!({ "item_id": item_id })))
//! });
//! assert_eq!(handler.name(), "items::get_item");
//! ```

use crate::args::BoundArgs;
use crate::context::RequestContext;
use crate::error::PentaResult;
use crate::identity::Identity;
use crate::reply::Reply;
use crate::request::Request;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stable identity of a handler: the concrete function type plus its name.
///
/// Two registrations of the same function share an id, which lets schema
/// synthesis reuse earlier work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId {
    type_id: TypeId,
    name: String,
}

impl HandlerId {
    /// Builds the id for a function type.
    #[must_use]
    pub fn of<F: 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            name: name.into(),
        }
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Everything a handler gets for one request.
#[derive(Debug)]
pub struct Call {
    ctx: RequestContext,
    request: Arc<Request>,
}

impl Call {
    /// Creates a call.
    #[must_use]
    pub fn new(ctx: RequestContext, request: Arc<Request>) -> Self {
        Self { ctx, request }
    }

    /// Returns the request context.
    #[must_use]
    pub fn ctx(&self) -> &RequestContext {
        &self.ctx
    }

    /// Returns the bound arguments.
    #[must_use]
    pub fn args(&self) -> &BoundArgs {
        self.ctx.args()
    }

    /// Returns the authenticated identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        self.ctx.identity()
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns a shared handle to the request.
    #[must_use]
    pub fn request_arc(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    /// Deserializes a bound value argument.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> PentaResult<T> {
        self.ctx.args().get(name)
    }

    /// Returns a dependency output.
    pub fn dep<T: Any + Send + Sync>(&self, name: &str) -> PentaResult<Arc<T>> {
        self.ctx.args().injected(name)
    }

    /// Splits the call into its parts.
    #[must_use]
    pub fn into_parts(self) -> (RequestContext, Arc<Request>) {
        (self.ctx, self.request)
    }
}

/// The outcome of invoking a handler.
pub enum Invocation {
    /// A sync handler finished.
    Ready(PentaResult<Reply>),
    /// An async handler must be awaited.
    Pending(BoxFuture<'static, PentaResult<Reply>>),
}

impl Invocation {
    /// Returns `true` if the handler suspended.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Awaits the result if needed.
    pub async fn resolve(self) -> PentaResult<Reply> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A request handler.
pub trait Handler: Send + Sync + 'static {
    /// Returns the handler identity used for schema caching.
    fn id(&self) -> HandlerId;

    /// Returns the handler name (for example `module::function`).
    fn name(&self) -> &str;

    /// Runs the handler.
    fn invoke(&self, call: Call) -> Invocation;
}

/// Wraps a plain function as a handler.
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Call) -> PentaResult<Reply> + Send + Sync + 'static,
{
    /// Creates a handler from a sync function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Call) -> PentaResult<Reply> + Send + Sync + 'static,
{
    fn id(&self) -> HandlerId {
        HandlerId::of::<F>(self.name.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, call: Call) -> Invocation {
        Invocation::Ready((self.func)(call))
    }
}

/// Wraps a function returning a future as a handler.
pub struct AsyncFnHandler<F> {
    name: String,
    func: F,
}

impl<F, Fut> AsyncFnHandler<F>
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PentaResult<Reply>> + Send + 'static,
{
    /// Creates a handler from an async function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F, Fut> Handler for AsyncFnHandler<F>
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PentaResult<Reply>> + Send + 'static,
{
    fn id(&self) -> HandlerId {
        HandlerId::of::<F>(self.name.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, call: Call) -> Invocation {
        Invocation::Pending(Box::pin((self.func)(call)))
    }
}

/// Shorthand for a shared sync handler.
pub fn sync_handler<F>(name: impl Into<String>, func: F) -> Arc<dyn Handler>
where
    F: Fn(Call) -> PentaResult<Reply> + Send + Sync + 'static,
{
    Arc::new(FnHandler::new(name, func))
}

/// Shorthand for a shared async handler.
pub fn async_handler<F, Fut>(name: impl Into<String>, func: F) -> Arc<dyn Handler>
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PentaResult<Reply>> + Send + 'static,
{
    Arc::new(AsyncFnHandler::new(name, func))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PentaError;
    use serde_json::json;

    fn call_with(name: &str, value: serde_json::Value) -> Call {
        let mut ctx = RequestContext::new();
        let mut args = BoundArgs::new();
        args.insert_value(name, value);
        ctx.set_args(args);
        Call::new(ctx, Arc::new(Request::builder().build()))
    }

    fn echo(call: Call) -> PentaResult<Reply> {
        let q: String = call.arg("q")?;
        Ok(Reply::new(json!({ "q": q })))
    }

    #[test]
    fn test_sync_handler_is_ready() {
        let handler = sync_handler("echo", echo);
        let invocation = handler.invoke(call_with("q", json!("hi")));
        assert!(!invocation.is_pending());
        let reply = tokio_test::block_on(invocation.resolve()).unwrap();
        assert!(matches!(reply, Reply::Data { body, .. } if body == json!({"q": "hi"})));
    }

    #[tokio::test]
    async fn test_async_handler_is_pending() {
        let handler = async_handler("later", |call: Call| async move {
            let n: i64 = call.arg("n")?;
            Ok(Reply::new(json!(n * 2)))
        });
        let invocation = handler.invoke(call_with("n", json!(21)));
        assert!(invocation.is_pending());
        match invocation.resolve().await.unwrap() {
            Reply::Data { body, .. } => assert_eq!(body, json!(42)),
            Reply::Raw(_) => panic!("expected data"),
        }
    }

    #[test]
    fn test_handler_errors_propagate() {
        let handler = sync_handler("boom", |_call: Call| -> PentaResult<Reply> {
            Err(PentaError::forbidden())
        });
        let result = tokio_test::block_on(handler.invoke(call_with("x", json!(1))).resolve());
        assert!(matches!(result, Err(PentaError::Authorization { .. })));
    }

    #[test]
    fn test_handler_ids() {
        let a = sync_handler("echo", echo);
        let b = sync_handler("echo", echo);
        let c = sync_handler("other", |_call: Call| -> PentaResult<Reply> { Ok(Reply::empty()) });
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}

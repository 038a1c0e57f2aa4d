//! # Penta Core
//!
//! Core types shared by every Penta crate:
//!
//! - [`PentaError`] - The error taxonomy and its status mapping
//! - [`RequestContext`] - Per-request identity, bound arguments and validation failures
//! - [`Request`] - Transport-neutral incoming request
//! - [`Identity`] - Caller identity established by authentication
//! - [`Handler`] - Sync and async handler abstraction
//! - [`FieldError`] / [`ValidationErrorContext`] - Group-relative validation failures

#![doc(html_root_url = "https://docs.rs/penta-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod args;
mod context;
mod cookie;
mod error;
mod handler;
mod identity;
pub mod naming;
mod reply;
mod request;
mod validation;

pub use args::{Bound, BoundArgs, Injected};
pub use context::{RequestContext, RequestId};
pub use cookie::Cookies;
pub use error::{ErrorCategory, PentaError, PentaResult};
pub use handler::{
    async_handler, sync_handler, AsyncFnHandler, BoxFuture, Call, FnHandler, Handler, HandlerId,
    Invocation,
};
pub use identity::Identity;
pub use reply::Reply;
pub use request::{normalize_header_name, Request, RequestBuilder};
pub use validation::{
    error_items, ErrorItem, ErrorKind, FieldError, LocPart, ParamSource, ValidationErrorContext,
};

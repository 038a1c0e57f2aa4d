//! # Penta
//!
//! **Declarative HTTP operations with validation, auth, throttling and OpenAPI docs**
//!
//! Penta turns handler declarations into a request pipeline:
//!
//! - **Parameter classification** – each declared parameter gets exactly one
//!   source: path, query, header, cookie, body, form, a dependency, or the
//!   request itself
//! - **Validation** – request groups are validated field by field, and every
//!   failure is reported with its location
//! - **Auth and throttling** – authenticator chains and rate throttles
//!   inherited from the API through nested routers
//! - **Response shaping** – payloads are validated against declared models
//!   per status code
//! - **Schema document** – an OpenAPI 3.1 document generated from the same
//!   schemas the binder validates with
//!
//! ## Quick Start
//!
//! ```rust
//! use penta::prelude::*;
//! use serde_json::json;
//!
//! fn get_item(call: Call) -> PentaResult<Reply> {
//!     let item_id: i64 = call.arg("item_id")?;
//!     let q: String = call.arg("q")?;
//!     Ok(Reply::new(json!({ "item_id": item_id, "q": q })))
//! }
//!
//! # tokio_test::block_on(async {
//! let api = Api::builder()
//!     .urls_namespace("quick-start")
//!     .get(
//!         "/items/{item_id}",
//!         Operation::sync("items::get_item", get_item)
//!             .param(Param::new("item_id", FieldType::Integer))
//!             .param(Param::new("q", FieldType::String)),
//!     )
//!     .build()?;
//!
//! let request = Request::builder().uri("/items/123?q=test").build();
//! let response = api.handle(request).await?;
//! assert_eq!(response.status(), 200);
//! # Ok::<(), PentaError>(())
//! # }).unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → Route → Auth → Throttle → Bind/Validate → Dependencies → Handler
//!                                                                      ↓
//! Response ← Render ← Response shaping ←──────────────────────────────┘
//!     ↑
//!     └── Exception handlers (any step)
//! ```

#![doc(html_root_url = "https://docs.rs/penta/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod dispatch;
mod exceptions;
mod operation;
pub mod registry;
mod renderer;
mod responses;
mod routers;

// Re-export core types
pub use penta_core as core;

// Re-export path routing
pub use penta_router as router;

// Re-export parameter extraction
pub use penta_extract as extract;

// Re-export auth and throttling
pub use penta_middleware as middleware;

// Re-export schema document generation
pub use penta_docs as docs;

// Re-export configuration
pub use penta_config as config;

// Re-export logging
pub use penta_telemetry as telemetry;

pub use api::{Api, ApiBuilder};
pub use exceptions::{ErrorFamily, ErrorMatcher, ErrorTranslator, ExceptionHandler};
pub use operation::{AuthSetting, Operation};
pub use renderer::{JsonRenderer, Renderer};
pub use responses::{
    DumpOptions, ResponseModel, Responses, CODES_1XX, CODES_2XX, CODES_3XX, CODES_4XX, CODES_5XX,
};
pub use routers::Router;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use penta::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Api, ApiBuilder, ErrorMatcher, Operation, Responses, Router, CODES_4XX,
    };

    pub use penta_core::{
        Call, Identity, PentaError, PentaResult, Reply, Request, RequestContext,
    };

    pub use penta_extract::{Dependency, Field, FieldType, Model, Param, Resolved};

    pub use penta_middleware::{
        ApiKeyCookie, ApiKeyHeader, ApiKeyQuery, HttpBasic, HttpBearer, RateThrottle, ThrottleKey,
    };
}

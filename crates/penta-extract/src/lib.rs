//! # Penta Extract
//!
//! Declarative request parameters for Penta operations.
//!
//! - [`Model`] / [`Field`] / [`FieldType`] - Field models with lax coercion and constraints
//! - [`Param`] / [`classify`] - Parameter declarations and their source group
//! - [`Dependency`] / [`DependencyRegistry`] - Named providers resolved per request
//! - [`SchemaSynthesizer`] - Cached per-group validation schemas
//! - [`bind`] - Reads, validates, and maps a request onto parameter names
//!
//! ## Example
//!
//! ```rust
//! use penta_core::{HandlerId, Request};
//! use penta_extract::{bind, classify, FieldType, Param, SchemaSynthesizer};
//! use serde_json::json;
//!
//! struct ListItems;
//!
//! let specs = vec![
//!     classify(&Param::new("q", FieldType::String), &[]).unwrap(),
//!     classify(&Param::new("limit", FieldType::Integer).default(json!(10)), &[]).unwrap(),
//! ];
//! let schemas = SchemaSynthesizer::global()
//!     .synthesize(&HandlerId::of::<ListItems>("list_items"), &specs)
//!     .unwrap();
//!
//! let request = Request::builder().uri("/items?q=hat").build();
//! let values = bind(&schemas, &request).unwrap();
//! assert_eq!(values["q"], json!("hat"));
//! assert_eq!(values["limit"], json!(10));
//! ```

#![doc(html_root_url = "https://docs.rs/penta-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod dependency;
mod model;
mod param;
mod raw;
mod schema;
mod validate;

pub use binder::{bind, BoundValues};
pub use dependency::{resolve_plan, Dependency, DependencyRegistry, Resolved};
pub use model::{Constraints, Field, FieldType, Model, Pattern};
pub use param::{classify, Marker, Param, ParamKind, ParamSpec};
pub use raw::MultiMap;
pub use schema::{merge_specs, Binding, OperationSchema, OperationSchemas, SchemaSynthesizer};
pub use validate::{parse_bool, validate_field};

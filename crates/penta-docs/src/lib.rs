//! # Penta Docs
//!
//! OpenAPI 3.1 generation for Penta operations.
//!
//! This crate provides:
//! - **OpenAPI types** covering what Penta emits
//! - **[`SchemaDocGenerator`]** turning operation descriptors and their
//!   group schemas into a document
//! - **[`DocsPage`]** rendering Swagger UI or ReDoc against the served
//!   document
//!
//! Parameters are derived from the same group schemas the binder validates
//! against, so the document lists exactly what a request may carry.

#![doc(html_root_url = "https://docs.rs/penta-docs/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod generator;
mod openapi;
mod pages;

pub use error::{DocsError, DocsResult};
pub use generator::{OperationDoc, SchemaDocGenerator};
pub use openapi::{
    Components, Info, MediaType, OpenApi, Operation, Parameter, ParameterIn, PathItem,
    RequestBody, Response, Schema, SchemaType, SecurityRequirement, SecurityScheme, Server, Tag,
};
pub use pages::{DocExpansion, DocsPage, RedocSettings, SwaggerSettings};

//! Ordered path-template routing for Penta.
//!
//! This crate resolves a request method and path to the value registered for
//! it (in Penta, an operation handle):
//!
//! - [`normalize_path`] / [`join_prefix`] - path and prefix composition
//! - [`PathTemplate`] - `{name}` and `{converter:name}` placeholders
//! - [`MethodTable`] - the methods registered under one template
//! - [`RouteTree`] - first-match resolution in registration order
//!
//! # Example
//!
//! ```rust
//! use penta_router::{join_prefix, RouteTree};
//! use http::Method;
//!
//! let mut tree = RouteTree::new();
//! let full = join_prefix("/api/v1/", "/users/{id}");
//! tree.insert(&full, &[Method::GET, Method::DELETE], 7_usize).unwrap();
//!
//! let found = tree.resolve(&Method::DELETE, "/api/v1/users/42").unwrap();
//! assert_eq!(*found.value, 7);
//! assert_eq!(found.params.get("id"), Some("42"));
//! ```

#![doc(html_root_url = "https://docs.rs/penta-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method_table;
mod params;
mod path;
mod tree;

pub use error::RouteError;
pub use method_table::{allow_header, MethodTable};
pub use params::Params;
pub use path::{join_prefix, normalize_path, Converter, PathTemplate, Segment};
pub use tree::{RouteEntry, RouteMatch, RouteTree};

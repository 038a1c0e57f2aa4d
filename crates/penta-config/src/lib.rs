//! # Penta Config
//!
//! Typed configuration for Penta APIs.
//!
//! Configuration is layered, later layers winning:
//!
//! 1. defaults or a preset ([`PentaConfig::development`], [`PentaConfig::production`])
//! 2. a TOML or JSON file
//! 3. a `.env` file
//! 4. `PENTA__SECTION__KEY` environment variables
//!
//! Unknown keys are rejected at every layer.
//!
//! # Example
//!
//! ```no_run
//! use penta_config::ConfigLoader;
//!
//! # fn main() -> Result<(), penta_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("penta.toml")?
//!     .with_env_prefix("PENTA")
//!     .load()?;
//!
//! println!("schema served at {}", config.docs.openapi_url);
//! # Ok(())
//! # }
//! ```
//!
//! # File Format
//!
//! ```toml
//! [api]
//! title = "Shop API"
//! version = "2.1.0"
//! urls_namespace = "shop"
//! debug = false
//!
//! [docs]
//! openapi_url = "/openapi.json"
//! docs_url = "/docs"
//! servers = [{ url = "https://shop.example.com" }]
//!
//! [logging]
//! level = "penta=debug,info"
//! format = "pretty"
//! ```
//!
//! # Environment Overrides
//!
//! - `PENTA__API__TITLE=Shop`
//! - `PENTA__API__DEBUG=true`
//! - `PENTA__DOCS__DOCS_URL=` (empty disables the docs page)
//! - `PENTA__LOGGING__FORMAT=json`
//! - `PENTA_SKIP_REGISTRY=1`

#![doc(html_root_url = "https://docs.rs/penta-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::PentaConfig;
pub use error::ConfigError;
pub use loader::{skip_registry_from_env, ConfigLoader, DEFAULT_ENV_PREFIX, SKIP_REGISTRY_VAR};
pub use schema::{ApiSection, DocsSection, LogFormat, LoggingSection, ServerEntry};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

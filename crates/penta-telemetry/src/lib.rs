//! Structured logging for Penta.
//!
//! Penta emits `tracing` events throughout dispatch, binding, auth and
//! throttling. This crate installs a `tracing-subscriber` for them, either
//! as JSON lines or in a human-readable format, and provides macros that log
//! request lifecycle events with the standard [`fields`](logging::fields).
//!
//! # Example
//!
//! ```rust,no_run
//! use penta_telemetry::{init_logging, LogConfig, LogFormat};
//!
//! let config = LogConfig {
//!     format: LogFormat::Pretty,
//!     ..LogConfig::default()
//! };
//! init_logging(&config).expect("logging");
//! tracing::info!(operation_id = "get_item", "ready");
//! ```

#![doc(html_root_url = "https://docs.rs/penta-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};
pub use penta_config::LogFormat;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

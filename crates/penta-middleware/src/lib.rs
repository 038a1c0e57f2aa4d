//! # Penta Middleware
//!
//! Request gates that run between routing and binding.
//!
//! ```text
//! RouteTree → AuthGate → ThrottleGate → RequestBinder → Handler
//! ```
//!
//! | Gate | Failure |
//! |------|---------|
//! | [`AuthGate`] | 401 when every authenticator declines |
//! | [`ThrottleGate`] | 429 with the longest known wait |
//!
//! Both gates are built once per operation from the inherited chains and
//! are shared by every request to it.

#![doc(html_root_url = "https://docs.rs/penta-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod throttle;

pub use auth::{
    ApiKeyCookie, ApiKeyHeader, ApiKeyQuery, AuthGate, Authenticator, BasicVerifier, HttpBasic,
    HttpBearer, Verifier, AUTHORIZATION_HEADER,
};
pub use throttle::{
    headers, parse_rate, retry_after_secs, RateThrottle, Throttle, ThrottleDecision, ThrottleGate,
    ThrottleKey,
};

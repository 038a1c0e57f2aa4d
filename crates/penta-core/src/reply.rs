//! Handler results before response shaping.

use crate::error::{PentaError, PentaResult};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// What a handler returns.
///
/// `Data` is validated against the operation's response shapes and rendered.
/// `Raw` bypasses shaping and is sent as-is.
#[derive(Debug)]
pub enum Reply {
    /// A JSON-like payload with an optional explicit status.
    Data {
        /// Explicit status; `None` uses the operation's default.
        status: Option<StatusCode>,
        /// Payload, `Null` for "no content".
        body: Value,
        /// Extra response headers.
        headers: HeaderMap,
    },
    /// A fully built response.
    Raw(http::Response<Bytes>),
}

impl Reply {
    /// A payload rendered with the operation's default status.
    #[must_use]
    pub fn new(body: Value) -> Self {
        Self::Data {
            status: None,
            body,
            headers: HeaderMap::new(),
        }
    }

    /// A payload with an explicit status.
    #[must_use]
    pub fn with_status(status: StatusCode, body: Value) -> Self {
        Self::Data {
            status: Some(status),
            body,
            headers: HeaderMap::new(),
        }
    }

    /// Serializes a value into a payload.
    pub fn serialize<T: Serialize>(value: &T) -> PentaResult<Self> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(|e| PentaError::internal_with_source("handler result is not serializable", e))
    }

    /// An empty payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Value::Null)
    }

    /// A response returned without shaping.
    #[must_use]
    pub fn raw(response: http::Response<Bytes>) -> Self {
        Self::Raw(response)
    }

    /// Adds a response header to a `Data` reply. Invalid pairs are skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Self::Data { headers, .. } = &mut self {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        self
    }

    /// Returns the explicit status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Data { status, .. } => *status,
            Self::Raw(response) => Some(response.status()),
        }
    }
}

impl From<Value> for Reply {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

impl From<(StatusCode, Value)> for Reply {
    fn from((status, body): (StatusCode, Value)) -> Self {
        Self::with_status(status, body)
    }
}

//! Payload renderers.

use bytes::Bytes;
use http::StatusCode;
use penta_core::{PentaError, PentaResult, Request};
use serde_json::Value;

/// Turns a shaped payload into response bytes.
pub trait Renderer: Send + Sync + 'static {
    /// Media type of the rendered bytes.
    fn media_type(&self) -> &str;

    /// Character set of the rendered bytes.
    fn charset(&self) -> &str {
        "utf-8"
    }

    /// Value of the `Content-Type` header.
    fn content_type(&self) -> String {
        format!("{}; charset={}", self.media_type(), self.charset())
    }

    /// Renders `data` for a response with `status`.
    fn render(&self, request: &Request, data: &Value, status: StatusCode) -> PentaResult<Bytes>;
}

/// Compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn media_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, _request: &Request, data: &Value, _status: StatusCode) -> PentaResult<Bytes> {
        serde_json::to_vec(data)
            .map(Bytes::from)
            .map_err(|e| PentaError::internal_with_source("failed to render JSON payload", e))
    }
}

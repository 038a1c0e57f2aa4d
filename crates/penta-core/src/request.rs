//! The incoming-request abstraction the layer consumes.
//!
//! [`Request`] is deliberately transport-neutral. A host server converts its
//! own request into one (usually through [`Request::from_http`]) and hands it
//! to the application.

use crate::cookie::Cookies;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use penta_router::Params;
use std::net::IpAddr;

/// An HTTP request as seen by authentication, throttling and binding.
///
/// # Example
///
/// ```rust
/// use penta_core::Request;
/// use http::Method;
///
/// let request = Request::builder()
///     .method(Method::GET)
///     .uri("/items/5?q=test")
///     .header("x-token", "secret")
///     .build();
///
/// assert_eq!(request.path(), "/items/5");
/// assert_eq!(request.query_string(), Some("q=test"));
/// assert_eq!(request.header("X_Token"), Some("secret"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<IpAddr>,
    path_params: Params,
}

impl Request {
    /// Creates a request from its parts.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            remote_addr: None,
            path_params: Params::new(),
        }
    }

    /// Converts an `http` request with a buffered body.
    #[must_use]
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    /// Starts a request builder.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the path portion of the URI.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the raw query string if present.
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Looks up a header, ignoring case and treating `_` and `-` as equal.
    ///
    /// Returns the last value when the header repeats.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let wanted = normalize_header_name(name);
        self.headers
            .iter()
            .filter(|(key, _)| normalize_header_name(key.as_str()) == wanted)
            .filter_map(|(_, value)| value.to_str().ok())
            .last()
    }

    /// Returns the `Content-Type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parses every `Cookie` header.
    #[must_use]
    pub fn cookies(&self) -> Cookies {
        let mut cookies = Cookies::new();
        for value in self.headers.get_all(header::COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.extend_from(value);
            }
        }
        cookies
    }

    /// Returns the peer address reported by the host transport.
    #[must_use]
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// Sets the peer address.
    pub fn set_remote_addr(&mut self, addr: IpAddr) {
        self.remote_addr = Some(addr);
    }

    /// Best-effort client IP: first `X-Forwarded-For` entry, then `X-Real-IP`,
    /// then the peer address.
    #[must_use]
    pub fn client_ip(&self) -> Option<String> {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
        if let Some(real_ip) = self.header("x-real-ip") {
            return Some(real_ip.trim().to_string());
        }
        self.remote_addr.map(|addr| addr.to_string())
    }

    /// Returns the captures of the matched path template.
    #[must_use]
    pub fn path_params(&self) -> &Params {
        &self.path_params
    }

    /// Stores the captures of the matched path template.
    pub fn set_path_params(&mut self, params: Params) {
        self.path_params = params;
    }
}

/// Lowercases a header name and maps `_` to `-`.
#[must_use]
pub fn normalize_header_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Builder for constructing a [`Request`], mostly in tests and host adapters.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<Uri>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<IpAddr>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP method. Defaults to `GET`.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the URI. Invalid URIs are ignored and `/` is used.
    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.parse().ok();
        self
    }

    /// Appends a header. Invalid names or values are skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets a JSON body and content type.
    #[must_use]
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }

    /// Sets an urlencoded form body and content type.
    #[must_use]
    pub fn form(self, encoded: &str) -> Self {
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(encoded.to_string())
    }

    /// Sets the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Builds the request.
    #[must_use]
    pub fn build(self) -> Request {
        let mut request = Request::new(
            self.method.unwrap_or(Method::GET),
            self.uri.unwrap_or_else(|| Uri::from_static("/")),
            self.headers,
            self.body,
        );
        request.remote_addr = self.remote_addr;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_header_lookup_is_normalized() {
        let request = Request::builder()
            .header("User-Agent", "curl")
            .header("x_custom", "raw")
            .build();
        assert_eq!(request.header("user_agent"), Some("curl"));
        assert_eq!(request.header("USER-AGENT"), Some("curl"));
        assert_eq!(request.header("X-Custom"), Some("raw"));
        assert_eq!(request.header("missing"), None);
    }

    #[test]
    fn test_cookies_from_multiple_headers() {
        let request = Request::builder()
            .header("cookie", "a=1")
            .header("cookie", "b=2")
            .build();
        let cookies = request.cookies();
        assert_eq!(cookies.get("a"), Some("1"));
        assert_eq!(cookies.get("b"), Some("2"));
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let request = Request::builder().remote_addr(peer).build();
        assert_eq!(request.client_ip().as_deref(), Some("10.0.0.1"));

        let request = Request::builder()
            .remote_addr(peer)
            .header("x-real-ip", "192.168.1.2")
            .build();
        assert_eq!(request.client_ip().as_deref(), Some("192.168.1.2"));

        let request = Request::builder()
            .header("x-real-ip", "192.168.1.2")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .build();
        assert_eq!(request.client_ip().as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_from_http() {
        let http_request = http::Request::builder()
            .method(Method::POST)
            .uri("/items?x=1")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let request = Request::from_http(http_request);
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.query_string(), Some("x=1"));
        assert_eq!(request.body().as_ref(), b"{}");
    }

    #[test]
    fn test_builder_defaults() {
        let request = Request::builder().build();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/");
        assert!(request.path_params().is_empty());
        assert!(request.client_ip().is_none());
    }
}

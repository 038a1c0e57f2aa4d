//! Request cookie parsing.

use std::collections::HashMap;

/// Cookies sent with a request.
///
/// # Example
///
/// ```rust
/// use penta_core::Cookies;
///
/// let cookies = Cookies::parse("session=abc123; theme=\"dark\"");
/// assert_eq!(cookies.get("session"), Some("abc123"));
/// assert_eq!(cookies.get("theme"), Some("dark"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    cookies: HashMap<String, String>,
}

impl Cookies {
    /// Create an empty Cookies instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse cookies from a `Cookie` header value.
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let mut cookies = Self::new();
        cookies.extend_from(header_value);
        cookies
    }

    /// Adds the pairs of another `Cookie` header value. Later values win.
    pub fn extend_from(&mut self, header_value: &str) {
        for pair in header_value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim().trim_matches('"');
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Get a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Check if a cookie exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Get an iterator over all cookies.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get the number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Check if there are no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

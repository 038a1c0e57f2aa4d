//! Multi-value maps for query strings and urlencoded form bodies.

use indexmap::IndexMap;

/// Ordered `key -> values` pairs decoded from `application/x-www-form-urlencoded`
/// text.
///
/// # Example
///
/// ```rust
/// use penta_extract::MultiMap;
///
/// let query = MultiMap::parse("tag=a&q=rust+lang&tag=b");
/// assert_eq!(query.get_all("tag"), ["a", "b"]);
/// assert_eq!(query.last("q"), Some("rust lang"));
/// assert!(query.get_all("missing").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap {
    entries: IndexMap<String, Vec<String>>,
}

impl MultiMap {
    /// Decodes urlencoded text. Pairs that fail to decode are dropped.
    #[must_use]
    pub fn parse(encoded: &str) -> Self {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded).unwrap_or_default();
        pairs.into_iter().collect()
    }

    /// Decodes an urlencoded body; invalid UTF-8 yields an empty map.
    #[must_use]
    pub fn parse_bytes(body: &[u8]) -> Self {
        std::str::from_utf8(body).map(Self::parse).unwrap_or_default()
    }

    /// Returns every value of `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Returns the last value of `key`.
    #[must_use]
    pub fn last(&self, key: &str) -> Option<&str> {
        self.get_all(key).last().map(String::as_str)
    }

    /// Returns `true` if `key` occurred at least once.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over distinct keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for MultiMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut entries: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in iter {
            entries.entry(key).or_default().push(value);
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decoding() {
        let map = MultiMap::parse("name=John%20Doe&city=New+York&empty=");
        assert_eq!(map.last("name"), Some("John Doe"));
        assert_eq!(map.last("city"), Some("New York"));
        assert_eq!(map.last("empty"), Some(""));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_repeated_keys_keep_order() {
        let map = MultiMap::parse("id=3&id=1&id=2");
        assert_eq!(map.get_all("id"), ["3", "1", "2"]);
        assert_eq!(map.last("id"), Some("2"));
    }

    #[test]
    fn test_empty_and_invalid_input() {
        assert!(MultiMap::parse("").is_empty());
        assert!(MultiMap::parse_bytes(&[0xff, 0xfe]).is_empty());
        assert_eq!(MultiMap::parse_bytes(b"a=1").last("a"), Some("1"));
    }
}

//! HTTP header map with case-insensitive name lookup and structural equality.
//!
//! Headers take part in cache matching, so two maps compare equal when they
//! carry the same values under the same (case-insensitive) names, regardless
//! of how different names were interleaved when the maps were built.

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name,
/// matching the semantics of HTTP/1.1 header fields (RFC 9110 §5.3).
///
/// # Examples
///
/// ```
/// use fetchmemo::http::Headers;
///
/// let a = Headers::new()
///     .with("Accept", "application/json")
///     .with("X-Trace", "1");
/// let b = Headers::new()
///     .with("x-trace", "1")
///     .with("accept", "application/json");
///
/// assert_eq!(a.get("accept"), Some("application/json"));
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry and returns the map, for building descriptors inline.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all entries with the given header name (case-insensitive).
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // Lowercased names, stably sorted so per-name value order survives.
    fn normalized(&self) -> Vec<(String, &str)> {
        let mut pairs: Vec<(String, &str)> = self
            .inner
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len() && self.normalized() == other.normalized()
    }
}

impl Eq for Headers {}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn multi_value() {
        let h = Headers::new().with("Set-Cookie", "a=1").with("Set-Cookie", "b=2");
        let vals: Vec<_> = h.get_all("set-cookie").collect();
        assert_eq!(vals, vec!["a=1", "b=2"]);
    }

    #[test]
    fn remove() {
        let mut h = Headers::new().with("X-Foo", "bar").with("X-Foo", "baz");
        assert!(h.remove("x-foo"));
        assert!(h.is_empty());
        assert!(!h.remove("x-foo"));
    }

    #[test]
    fn equality_ignores_name_case_and_interleaving() {
        let a = Headers::new().with("A", "1").with("B", "2");
        let b = Headers::new().with("b", "2").with("a", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn equality_respects_value_order_within_a_name() {
        let a = Headers::new().with("Accept", "x").with("Accept", "y");
        let b = Headers::new().with("Accept", "y").with("Accept", "x");
        assert_ne!(a, b);
    }

    #[test]
    fn equality_detects_differing_values() {
        let a = Headers::new().with("Authorization", "Bearer one");
        let b = Headers::new().with("Authorization", "Bearer two");
        assert_ne!(a, b);
        assert_ne!(a, Headers::new());
    }

    #[test]
    fn collects_from_pairs() {
        let h: Headers = [("Host", "example.com")].into_iter().collect();
        assert_eq!(h.get("host"), Some("example.com"));
    }
}

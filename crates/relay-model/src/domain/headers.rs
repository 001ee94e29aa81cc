use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Response headers a worker asks the front end to set.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(pub BTreeMap<String, String>);

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns `true` if no headers are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Insert or overwrite a header.
    ///
    /// Returns `self` for chaining.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), val.into());
        self
    }

    /// Get the value for a header name, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    /// Iterate through all headers as `(&str, &str)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::Headers;

    #[test]
    fn insert_overwrites_and_chains() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain")
            .insert("X-Worker", "a")
            .insert("X-Worker", "b");

        assert_eq!(h.len(), 2);
        assert_eq!(h.get("X-Worker"), Some("b"));
        assert!(h.get("missing").is_none());
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut h = Headers::new();
        h.insert("a", "1");

        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"a":"1"}"#);
    }
}

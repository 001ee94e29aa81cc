use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named, multi-valued call arguments (`?k=v&k=w` becomes `{"k": ["v", "w"]}`).
///
/// Serialized as a transparent object of string arrays.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VArgs(pub BTreeMap<String, Vec<String>>);

impl VArgs {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Number of distinct argument names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a value under `key`, keeping earlier values.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// All values recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(|v| v.as_slice())
    }

    /// First value recorded for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for VArgs
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = VArgs::new();
        for (k, v) in iter {
            out.push(k, v);
        }
        out
    }
}

//! Ordered, multi-valued query parameters.

use url::Url;
use url::form_urlencoded;

/// An ordered multi-valued string map that serializes to a URL query.
///
/// Keys keep the position of their first insertion; values of a key keep
/// their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, keeping any values already present for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
        self
    }

    /// Replaces every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => *values = vec![value],
            None => self.entries.push((key, vec![value])),
        }
        self
    }

    /// Consuming variant of [`QueryParams::append`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Every value of `key`, empty when absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Removes `key` and returns its values.
    pub fn remove(&mut self, key: &str) -> Vec<String> {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(idx) => self.entries.remove(idx).1,
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattened `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Merges every pair of `other` into `self` with [`QueryParams::append`].
    pub fn extend(&mut self, other: &QueryParams) {
        for (k, v) in other.iter() {
            self.append(k, v);
        }
    }

    /// Form-urlencoded query string in insertion order (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.iter() {
            ser.append_pair(k, v);
        }
        ser.finish()
    }

    /// Query string with keys sorted, used wherever two equivalent parameter
    /// sets must compare equal. Values of one key keep their order.
    pub fn canonical(&self) -> String {
        let mut entries: Vec<&(String, Vec<String>)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, vs) in entries {
            for v in vs {
                ser.append_pair(k, v);
            }
        }
        ser.finish()
    }

    /// Appends these parameters to `url`'s existing query.
    pub fn apply_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        let mut qp = url.query_pairs_mut();
        for (k, v) in self.iter() {
            qp.append_pair(k, v);
        }
    }

    /// Collects the query of `url`.
    pub fn from_url(url: &Url) -> Self {
        url.query_pairs().fold(Self::new(), |acc, (k, v)| acc.with(k, v))
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.append(k, v);
        }
        params
    }
}

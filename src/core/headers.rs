//! Case-insensitive header collection with content-negotiation helpers.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::core::error::{CcError, TransportErrorCode};

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
pub const LAST_EVENT_ID: &str = "Last-Event-Id";

pub const MIME_JSON: &str = "application/json";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_EVENT_STREAM: &str = "text/event-stream";

/// Header names match case-insensitively; output keeps the casing the name
/// was first inserted with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Sets `name`, overwriting any previous value but keeping its original casing.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Adds a value to `name`, joining with `", "` when already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => {
                let current = &mut self.entries[idx].1;
                current.push_str(", ");
                current.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Sets `name` only when no value is present. Returns whether it was set.
    pub fn set_if_missing(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, value.into()));
        true
    }

    /// Like [`HeaderSet::set_if_missing`] but places the header first.
    pub fn prepend_if_missing(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.insert(0, (name, value.into()));
        true
    }

    /// Consuming variant of [`HeaderSet::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(name, value)` pairs in insertion order, with original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /* -------- content negotiation -------- */

    pub fn accept_json(&mut self) -> &mut Self {
        self.set(ACCEPT, MIME_JSON)
    }

    pub fn accept_text(&mut self) -> &mut Self {
        self.set(ACCEPT, MIME_TEXT)
    }

    pub fn accept_event_stream(&mut self) -> &mut Self {
        self.set(ACCEPT, MIME_EVENT_STREAM)
    }

    pub fn content_type_json(&mut self) -> &mut Self {
        self.set(CONTENT_TYPE, MIME_JSON)
    }

    pub fn content_type_text(&mut self) -> &mut Self {
        self.set(CONTENT_TYPE, MIME_TEXT)
    }

    /// The media type of `Content-Type`, lowercased and without parameters.
    pub fn content_type(&self) -> Option<String> {
        self.get(CONTENT_TYPE).map(media_type)
    }

    /// Converts into a transport header map.
    pub fn to_header_map(&self) -> Result<HeaderMap, CcError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CcError::transport(TransportErrorCode::UnexpectedError, e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CcError::transport(TransportErrorCode::UnexpectedError, e))?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// Collects a transport header map. Values that are not valid UTF-8 are skipped.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            if let Ok(v) = value.to_str() {
                headers.append(name.as_str(), v);
            }
        }
        headers
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderSet
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (n, v) in iter {
            headers.set(n, v);
        }
        headers
    }
}

pub(crate) fn media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

pub(crate) fn is_json_media_type(media: &str) -> bool {
    media == MIME_JSON || media.ends_with("+json")
}

//! Request and response descriptors exchanged with the executor.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::core::cache::CacheConfig;
use crate::core::error::{CcError, ClientErrorCode};
use crate::core::headers::{CONTENT_TYPE, HeaderSet, MIME_JSON, MIME_TEXT};
use crate::core::query::QueryParams;

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
}

/// Everything needed to perform one HTTP round trip.
///
/// `url` may be a path relative to the client's base URL until the client
/// resolves it; the executor only accepts absolute URLs.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: HeaderSet,
    pub query: QueryParams,
    pub body: Option<RequestBody>,
    /// Explicit cross-origin mode. Never inferred from the URL.
    pub cors: bool,
    /// `Duration::ZERO` disables the timeout.
    pub timeout: Duration,
    /// `None` bypasses the cache entirely.
    pub cache: Option<CacheConfig>,
    pub debug: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderSet::new(),
            query: QueryParams::new(),
            body: None,
            cors: false,
            timeout: Duration::ZERO,
            cache: None,
            debug: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(key, value);
        self
    }

    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// JSON body. Sets `Content-Type: application/json` unless already present.
    pub fn json_body(mut self, body: Value) -> Self {
        self.headers.set_if_missing(CONTENT_TYPE, MIME_JSON);
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Plain text body. Sets `Content-Type: text/plain` unless already present.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.headers.set_if_missing(CONTENT_TYPE, MIME_TEXT);
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn binary_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Binary(body));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(mut self, cache: Option<CacheConfig>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cors(mut self, yes: bool) -> Self {
        self.cors = yes;
        self
    }

    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = yes;
        self
    }

    /// The absolute URL with `query` merged in.
    pub fn full_url(&self) -> Result<Url, CcError> {
        let mut url = Url::parse(&self.url)?;
        self.query.apply_to(&mut url);
        Ok(url)
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(t) => t.is_empty(),
            Self::Json(_) => false,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Deserializes a JSON body into `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, CcError> {
        let value = match self {
            Self::Json(v) => v,
            Self::Empty => Value::Null,
            Self::Text(t) => serde_json::from_str(&t).map_err(|e| {
                CcError::client(ClientErrorCode::ResponseDecodeError, format!("json parse: {e}"))
            })?,
        };
        serde_json::from_value(value).map_err(|e| {
            CcError::client(ClientErrorCode::ResponseDecodeError, format!("json shape: {e}"))
        })
    }
}

/// The outcome of a successful round trip.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub url: String,
    pub headers: HeaderSet,
    pub body: ResponseBody,
    /// Time spent on the network round trip (the original one for cache hits).
    pub duration: Duration,
    pub cache_hit: bool,
}

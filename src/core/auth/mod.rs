//! Pluggable request and URL signing.

mod oauth;

use std::fmt;

use url::Url;

use crate::core::error::CcError;
use crate::core::headers::AUTHORIZATION;
use crate::core::request::RequestDescriptor;

pub use oauth::{OAuth1Auth, OAuth1Credentials};

/// Signs outgoing requests and URLs.
///
/// Both methods receive absolute targets: the client joins the base URL before
/// calling them. Implementations return new values instead of editing shared state.
pub trait AuthStrategy: Send + Sync + fmt::Debug {
    /// Adds credentials to a request about to be sent.
    fn apply_on_request_params(
        &self,
        request: RequestDescriptor,
    ) -> Result<RequestDescriptor, CcError>;

    /// Adds credentials to a URL handed out without being fetched.
    fn apply_on_url(&self, url: Url) -> Result<Url, CcError>;
}

/// Leaves requests untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthStrategy for NoAuth {
    fn apply_on_request_params(
        &self,
        request: RequestDescriptor,
    ) -> Result<RequestDescriptor, CcError> {
        Ok(request)
    }

    fn apply_on_url(&self, url: Url) -> Result<Url, CcError> {
        Ok(url)
    }
}

/// `Authorization: Bearer <token>` on requests.
///
/// URLs are left as is unless a query parameter name is configured with
/// [`BearerAuth::url_param`], in which case the token is appended under it.
#[derive(Clone)]
pub struct BearerAuth {
    token: String,
    url_param: Option<String>,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            url_param: None,
        }
    }

    /// Carry the token in `name` when signing URLs.
    pub fn url_param(mut self, name: impl Into<String>) -> Self {
        self.url_param = Some(name.into());
        self
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth")
            .field("token", &"<redacted>")
            .field("url_param", &self.url_param)
            .finish()
    }
}

impl AuthStrategy for BearerAuth {
    fn apply_on_request_params(
        &self,
        mut request: RequestDescriptor,
    ) -> Result<RequestDescriptor, CcError> {
        request
            .headers
            .set_if_missing(AUTHORIZATION, format!("Bearer {}", self.token));
        Ok(request)
    }

    fn apply_on_url(&self, mut url: Url) -> Result<Url, CcError> {
        if let Some(name) = &self.url_param {
            url.query_pairs_mut().append_pair(name, &self.token);
        }
        Ok(url)
    }
}

//! OAuth 1.0a (HMAC-SHA1) request signing.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha1::Sha1;
use url::Url;

use crate::core::error::{CcError, TransportErrorCode};
use crate::core::headers::AUTHORIZATION;
use crate::core::query::QueryParams;
use crate::core::request::RequestDescriptor;

use super::AuthStrategy;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

/// Consumer and access-token pairs.
#[derive(Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: Option<String>,
    pub token_secret: Option<String>,
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signs requests with an `Authorization: OAuth ...` header and URLs with
/// `oauth_*` query parameters.
#[derive(Debug, Clone)]
pub struct OAuth1Auth {
    creds: OAuth1Credentials,
}

impl OAuth1Auth {
    pub fn new(creds: OAuth1Credentials) -> Self {
        Self { creds }
    }

    /// The protocol parameters for `method url`, signature included, in a fixed order.
    pub fn oauth_params(
        &self,
        method: &Method,
        url: &Url,
        nonce: &str,
        timestamp: i64,
    ) -> Result<Vec<(String, String)>, CcError> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.creds.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
        ];
        if let Some(token) = &self.creds.token {
            params.push(("oauth_token".to_string(), token.clone()));
        }
        params.push(("oauth_version".to_string(), VERSION.to_string()));

        let signature = self.signature(method, url, &params)?;
        params.push(("oauth_signature".to_string(), signature));
        Ok(params)
    }

    /// Base64 HMAC-SHA1 of the signature base string.
    pub fn signature(
        &self,
        method: &Method,
        url: &Url,
        oauth: &[(String, String)],
    ) -> Result<String, CcError> {
        let base = signature_base_string(method, url, oauth);
        let key = format!(
            "{}&{}",
            encode(&self.creds.consumer_secret),
            encode(self.creds.token_secret.as_deref().unwrap_or(""))
        );
        let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes()).map_err(|e| {
            CcError::transport(TransportErrorCode::UnexpectedError, format!("hmac key: {e}"))
        })?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn fresh_params(&self, method: &Method, url: &Url) -> Result<Vec<(String, String)>, CcError> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        self.oauth_params(method, url, &nonce, timestamp)
    }
}

/// `METHOD&enc(base uri)&enc(sorted params)` as defined by RFC 5849 §3.4.1.
pub(crate) fn signature_base_string(
    method: &Method,
    url: &Url,
    oauth: &[(String, String)],
) -> String {
    let mut pairs: Vec<(String, String)> = QueryParams::from_url(url)
        .iter()
        .chain(oauth.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    pairs.sort();
    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_uri = url.clone();
    base_uri.set_query(None);
    base_uri.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        encode(base_uri.as_str()),
        encode(&normalized)
    )
}

fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

impl AuthStrategy for OAuth1Auth {
    fn apply_on_request_params(
        &self,
        mut request: RequestDescriptor,
    ) -> Result<RequestDescriptor, CcError> {
        let url = request.full_url()?;
        let params = self.fresh_params(&request.method, &url)?;
        let header = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        request.headers.set(AUTHORIZATION, format!("OAuth {header}"));
        Ok(request)
    }

    fn apply_on_url(&self, mut url: Url) -> Result<Url, CcError> {
        if url.cannot_be_a_base() {
            return Err(CcError::transport(
                TransportErrorCode::InvalidUrl,
                format!("cannot sign non-hierarchical URL {url}"),
            ));
        }
        let params = self.fresh_params(&Method::GET, &url)?;
        {
            let mut qp = url.query_pairs_mut();
            for (k, v) in &params {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

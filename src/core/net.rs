//! Single round-trip executor: descriptor in, decoded response or classified error out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::core::error::{CcError, ClientErrorCode};
use crate::core::headers::{HeaderSet, is_json_media_type, media_type};
use crate::core::request::{RequestBody, RequestDescriptor, ResponseBody, ResponseDescriptor};

/// Performs one HTTP round trip.
///
/// Never fails for a 2xx status. A non-2xx status yields [`CcError::Http`] with the
/// decoded body. When `request.timeout` is non-zero the whole round trip (headers and
/// body) must fit in it; on expiry the in-flight call is dropped and
/// `TIMEOUT_EXCEEDED` is returned.
pub async fn send_request(
    http: &reqwest::Client,
    request: &RequestDescriptor,
) -> Result<ResponseDescriptor, CcError> {
    let url = request.full_url()?;
    let started = Instant::now();
    log_request(request, &url);

    let round_trip = async {
        let resp = build(http, request, url.clone())?.send().await?;
        let status = resp.status().as_u16();
        let headers = HeaderSet::from_header_map(resp.headers());
        let final_url = resp.url().to_string();
        let bytes = resp.bytes().await?;
        Ok::<_, CcError>((status, headers, final_url, bytes))
    };

    let (status, headers, final_url, bytes) = with_timeout(request.timeout, round_trip).await?;
    let duration = started.elapsed();
    log_response(request, status, duration);

    if !(200..300).contains(&status) {
        let body = decode_body(&headers, &bytes).unwrap_or_else(|_| {
            ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        });
        return Err(CcError::Http {
            status,
            url: final_url,
            body,
        });
    }

    let body = decode_body(&headers, &bytes)?;
    Ok(ResponseDescriptor {
        status,
        url: final_url,
        headers,
        body,
        duration,
        cache_hit: false,
    })
}

/// Upper bound on reading the error body of a rejected stream head when the
/// request itself carries no timeout.
const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends `request` and hands back the live response once its headers arrived.
///
/// Used by the stream engine: the timeout (if any) only covers the wait for the
/// response head. Any status other than 200 becomes [`CcError::Http`]; the error body
/// is read within the request timeout (or [`ERROR_BODY_TIMEOUT`]) and left empty when
/// it cannot be read in time.
pub async fn open_stream(
    http: &reqwest::Client,
    request: &RequestDescriptor,
) -> Result<reqwest::Response, CcError> {
    let url = request.full_url()?;
    log_request(request, &url);

    let resp = with_timeout(request.timeout, async {
        Ok::<_, CcError>(build(http, request, url.clone())?.send().await?)
    })
    .await?;

    let status = resp.status().as_u16();
    if status == 200 {
        return Ok(resp);
    }

    let headers = HeaderSet::from_header_map(resp.headers());
    let final_url = resp.url().to_string();
    let read_for = if request.timeout.is_zero() {
        ERROR_BODY_TIMEOUT
    } else {
        request.timeout
    };
    let read = async { Ok::<_, CcError>(resp.bytes().await?) };
    let body = match with_timeout(read_for, read).await {
        Ok(bytes) => decode_body(&headers, &bytes).unwrap_or_else(|_| {
            ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        }),
        Err(e) => {
            tracing::debug!(status, url = %final_url, "error body unreadable: {e}");
            ResponseBody::Empty
        }
    };
    Err(CcError::Http {
        status,
        url: final_url,
        body,
    })
}

fn build(
    http: &reqwest::Client,
    request: &RequestDescriptor,
    url: Url,
) -> Result<reqwest::RequestBuilder, CcError> {
    let mut rb = http
        .request(request.method.clone(), url)
        .headers(request.headers.to_header_map()?);
    rb = match &request.body {
        Some(RequestBody::Text(t)) => rb.body(t.clone()),
        Some(RequestBody::Json(v)) => rb.body(serde_json::to_vec(v).map_err(|e| {
            CcError::client(ClientErrorCode::InvalidCommand, format!("json body: {e}"))
        })?),
        Some(RequestBody::Binary(b)) => rb.body(b.clone()),
        None => rb,
    };
    Ok(rb)
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, CcError>
where
    F: Future<Output = Result<T, CcError>>,
{
    if timeout.is_zero() {
        return fut.await;
    }
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(CcError::client(
            ClientErrorCode::TimeoutExceeded,
            format!("no response within {}ms", timeout.as_millis()),
        )),
    }
}

/// Content-type driven decoding: JSON media types are parsed, everything else is text.
pub(crate) fn decode_body(headers: &HeaderSet, bytes: &[u8]) -> Result<ResponseBody, CcError> {
    if bytes.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    let media = headers.content_type().unwrap_or_default();
    if is_json_media_type(&media) {
        return serde_json::from_slice(bytes).map(ResponseBody::Json).map_err(|e| {
            CcError::client(
                ClientErrorCode::ResponseDecodeError,
                format!("invalid JSON body: {e}"),
            )
        });
    }
    Ok(ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()))
}

pub(crate) fn is_event_stream(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .is_some_and(|m| m == crate::core::headers::MIME_EVENT_STREAM)
}

fn log_request(request: &RequestDescriptor, url: &Url) {
    if request.debug {
        tracing::debug!(method = %request.method, %url, cors = request.cors, "request");
    } else {
        tracing::trace!(method = %request.method, %url, "request");
    }
}

fn log_response(request: &RequestDescriptor, status: u16, duration: Duration) {
    if request.debug {
        tracing::debug!(method = %request.method, status, ?duration, "response");
    } else {
        tracing::trace!(method = %request.method, status, ?duration, "response");
    }
}

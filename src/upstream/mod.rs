//! Shared HTTP client and stream-opening utilities.

use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::error::{Result, WeftError};
use crate::util::with_timeout;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Bound on connection establishment.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on opening a stream (request sent to response headers received).
const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Get (or create) the shared reqwest client.
///
/// No total request timeout: a session streams for as long as the provider
/// keeps talking, and stalls are policed per-session by the decoder's idle
/// timeout instead.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build x-api-key style headers, with the version header messages-shaped
/// APIs require.
pub fn api_key_headers(api_key: &str, version: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Some(version) = version {
        if let Ok(val) = HeaderValue::from_str(version) {
            headers.insert("anthropic-version", val);
        }
    }
    headers
}

/// POST `body` to `url` and hand back the raw response byte stream, ready
/// for [`decode_events`](crate::decode::decode_events).
pub async fn open_stream(
    url: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
) -> Result<BoxStream<'static, Result<Bytes>>> {
    debug!(url, "opening upstream stream");

    let resp = with_timeout(OPEN_TIMEOUT, async {
        let resp = shared_client()
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;
        Ok(resp)
    })
    .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }

    Ok(resp
        .bytes_stream()
        .map(|chunk| chunk.map_err(WeftError::Network))
        .boxed())
}

/// Extract a retryable error from an HTTP status code.
pub fn status_to_error(status: u16, body: &str) -> WeftError {
    match status {
        401 | 403 => WeftError::Authentication(body.to_string()),
        429 => WeftError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => WeftError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse retry-after from JSON error body
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

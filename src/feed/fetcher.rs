use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use thiserror::Error;

use crate::storage::Feed;

/// Response bodies above this size are rejected outright.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

// ============================================================================
// Error Types
// ============================================================================

/// Errors from fetching a single feed.
///
/// Always scoped to one feed: the sync engine logs these at the per-feed
/// boundary and moves on, so one feed's failure never aborts the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Feed url is not a well-formed absolute http(s) URL
    #[error("Invalid feed url: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the per-fetch timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with a non-2xx, non-304 status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Result of one conditional fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server returned new content plus (possibly) fresh cache
    /// validators for the next fetch.
    Updated {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
        fetched_at: DateTime<Utc>,
    },
    /// HTTP 304: the stored validators still match, nothing to parse.
    NotModified { fetched_at: DateTime<Utc> },
}

/// Perform one conditional HTTP GET for a feed.
///
/// Stored `etag`/`last_modified` are sent as `If-None-Match` /
/// `If-Modified-Since` so an unchanged feed costs a 304 instead of a
/// re-download. The timeout bounds the whole exchange, body read included,
/// so a server stalling mid-body cannot hold a fetch open indefinitely.
/// The feed record itself is never mutated here - the caller applies the
/// returned validators during the merge step.
pub async fn fetch(
    client: &reqwest::Client,
    feed: &Feed,
    timeout: Duration,
) -> Result<FetchOutcome, FetchError> {
    let parsed = url::Url::parse(&feed.url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    let mut request = client.get(&feed.url);
    if let Some(etag) = &feed.etag {
        request = request.header(IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = &feed.last_modified {
        request = request.header(IF_MODIFIED_SINCE, last_modified);
    }

    tokio::time::timeout(timeout, execute(request))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn execute(request: reqwest::RequestBuilder) -> Result<FetchOutcome, FetchError> {
    let response = request.send().await.map_err(FetchError::Network)?;
    let fetched_at = Utc::now();

    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        return Ok(FetchOutcome::NotModified { fetched_at });
    }
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let header_str = |name| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let etag = header_str(ETAG);
    let last_modified = header_str(LAST_MODIFIED);

    let body = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    Ok(FetchOutcome::Updated {
        body,
        etag,
        last_modified,
        fetched_at,
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

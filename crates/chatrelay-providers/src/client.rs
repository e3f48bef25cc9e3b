//! Shared HTTP client for the provider APIs
//!
//! Every adapter talks to a JSON API with bearer authentication. The
//! [`ApiClient`] builds authenticated requests relative to a base URL and
//! turns non-success responses into [`ProviderError`]s.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::ProviderError;

/// Longest Retry-After honoured when given as an HTTP date
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Error bodies are truncated to this many characters in error messages
const MAX_ERROR_BODY: usize = 512;

/// Authenticated JSON client bound to one API base URL
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl ApiClient {
    /// Creates a client for `base_url` (no trailing slash required)
    pub fn new(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for `path` (e.g. `/files/list_folder`)
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Builds `base_url` + `segments`, percent-encoding each segment, with an
    /// already-encoded `query`
    ///
    /// Use this when path segments carry ids supplied by the API or config.
    pub fn url(&self, segments: &[&str], query: Option<&str>) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::InvalidUrl(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.set_query(query);
        Ok(url)
    }

    /// Creates an authenticated request builder for a URL from [`url`](Self::url)
    pub fn request_url(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.access_token)
    }

    /// Sends a request and decodes a JSON body from a success response
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse response: {} (body: {})",
                e,
                truncate(&body)
            ))
        })
    }
}

/// Returns the response unchanged when the status is a success, otherwise
/// consumes the body and classifies the failure
pub async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = truncate(&body);

    debug!(%status, path = %url, "Provider request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(message),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::CONFLICT => ProviderError::Conflict(message),
        StatusCode::GONE => ProviderError::CursorExpired(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::TooManyRequests { retry_after },
        s if s.is_server_error() => ProviderError::ServerError(format!("{}: {}", s, message)),
        s => ProviderError::Api {
            status: s.as_u16(),
            message,
        },
    })
}

/// Parses a Retry-After header value
///
/// Accepts delay-seconds ("30") or an HTTP date. Dates in the past or more
/// than an hour ahead are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(delay) = diff.to_std() {
            if delay <= MAX_RETRY_AFTER {
                return Some(delay);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header");
    None
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", head)
    }
}

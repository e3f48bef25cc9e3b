//! ChatRelay Providers - HTTP adapters for the upstream and downstream APIs
//!
//! - [`storage`] - file-storage change feed (list_folder / continue)
//! - [`tasks`] - task-tracker activity feed and task directory
//! - [`chat`] - chat messaging sink (`chat.postMessage`)
//! - [`render`] - plain-text message renderer
//! - [`provider`] - assembles all adapters from a [`Config`](chatrelay_core::config::Config)

pub mod chat;
pub mod client;
pub mod provider;
pub mod render;
pub mod storage;
pub mod tasks;

use std::time::Duration;

use chatrelay_core::ports::FetchError;
use thiserror::Error;

pub use provider::ProviderSet;

/// Errors returned by the provider HTTP APIs
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials are missing, invalid or lack the required scope (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicted with server state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The cursor is no longer accepted by the server
    #[error("Cursor expired: {0}")]
    CursorExpired(String),

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests { retry_after: Option<Duration> },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A request URL could not be built from the base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<ProviderError> for FetchError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized(msg) => FetchError::Unauthorized(msg),
            ProviderError::CursorExpired(msg) => FetchError::CursorExpired(msg),
            ProviderError::TooManyRequests { retry_after } => FetchError::RateLimited { retry_after },
            ProviderError::ServerError(msg) => FetchError::Transient(msg),
            ProviderError::NetworkError(e) => FetchError::Transient(e.to_string()),
            ProviderError::InvalidResponse(msg) => FetchError::InvalidResponse(msg),
            other @ (ProviderError::NotFound(_)
            | ProviderError::Conflict(_)
            | ProviderError::Api { .. }
            | ProviderError::InvalidUrl(_)) => FetchError::InvalidResponse(other.to_string()),
        }
    }
}

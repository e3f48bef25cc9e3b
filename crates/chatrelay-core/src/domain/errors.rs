//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures raised when constructing newtypes and rules.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid cursor token
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Invalid feed identifier
    #[error("Invalid feed id: {0}")]
    InvalidFeedId(String),

    /// Invalid chat channel name
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// Invalid route rule
    #[error("Invalid route rule: {0}")]
    InvalidRouteRule(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

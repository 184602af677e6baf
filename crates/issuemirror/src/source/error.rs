//! Errors raised by the remote issue source.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when reading from or writing to GitHub.
#[derive(Debug, Error)]
pub enum SourceError {
    #[cfg(feature = "github")]
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Authentication required")]
    AuthRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The timeline contained an item kind the classifier does not know.
    /// Signals a schema mismatch with GitHub and must abort the sync.
    #[error("Unexpected timeline item type: {typename}")]
    UnrecognizedEventType { typename: String },
}

impl SourceError {
    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the failure is a rate limit that a transport may retry.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            #[cfg(feature = "github")]
            SourceError::Api(e) => is_rate_limit_error(e),
            SourceError::RateLimited { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

/// Check if an octocrab error indicates a rate limit (403/429 or JSON parse error from empty response).
#[cfg(feature = "github")]
pub fn is_rate_limit_error(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 403 || status == 429
        }
        // Empty response body (EOF) often indicates rate limiting
        octocrab::Error::Json { .. } => true,
        _ => false,
    }
}

/// First line of an error's message, for compact log output.
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

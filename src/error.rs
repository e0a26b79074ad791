// Error kinds at the social-network boundary.
//
// The pipeline decides what to do with a failure purely from its kind:
// transient errors are retried with backoff, permanent and malformed ones
// end processing for that notification. Application plumbing (config, CLI,
// database setup) keeps using anyhow.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocialError {
    /// Network failure, rate limit, or 5xx. Safe to retry.
    #[error("transient API error: {message}")]
    Transient {
        message: String,
        /// Server-provided hint for how long to wait (429 responses).
        retry_after: Option<Duration>,
    },

    /// Auth failure, blocked or deleted account. Retrying will not help.
    #[error("permanent API error: {0}")]
    Permanent(String),

    /// The API answered with data that failed validation.
    #[error("malformed API data: {0}")]
    Malformed(String),
}

impl SocialError {
    pub fn transient(message: impl Into<String>) -> Self {
        SocialError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SocialError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SocialError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short label for logs and the attempts table.
    pub fn kind(&self) -> &'static str {
        match self {
            SocialError::Transient { .. } => "transient",
            SocialError::Permanent(_) => "permanent",
            SocialError::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for SocialError {
    fn from(err: reqwest::Error) -> Self {
        // Anything reqwest reports before we have a status (connect, timeout,
        // body read) is a transport problem.
        SocialError::transient(err.to_string())
    }
}

impl From<serde_json::Error> for SocialError {
    fn from(err: serde_json::Error) -> Self {
        SocialError::Malformed(err.to_string())
    }
}

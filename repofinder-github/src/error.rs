//! Errors from the GitHub API

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Authentication rejected (check GITHUB_TOKEN)")]
    Unauthorized,

    #[error("Repository is empty: {0}")]
    Conflict(String),

    #[error("Request rejected as invalid: {0}")]
    Invalid(String),

    #[error("Rate limit still exhausted after {waits} waits for {url}")]
    RateLimited { url: String, waits: u32 },

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Max retries ({attempts}) exceeded for {url}: {last}")]
    MaxRetries { attempts: u32, url: String, last: String },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// The resource is gone or closed to us; retrying will not help
    pub fn is_permanent(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::Forbidden(_))
    }

    /// The whole run cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::ClientBuild(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

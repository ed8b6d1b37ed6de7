//! Error types for the boletos client

use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or connectivity failure, surfaced untouched
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credential storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A 401 that survived one refresh-and-retry, or came from the refresh endpoint
    #[error("Unauthorized")]
    Unauthorized,

    /// No refresh token was available to renew the session
    #[error("Session expired")]
    SessionExpired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Non-2xx response from a resource endpoint
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Returns true when the session is gone and the caller should route to login.
    ///
    /// `SessionExpired` and `RefreshFailed` are only returned after the
    /// credential store and auth state have been cleared.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized | ClientError::SessionExpired | ClientError::RefreshFailed(_)
        )
    }
}

/// Outcome of a failed refresh, shared with every request queued behind it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    SessionExpired,

    #[error("{0}")]
    Failed(String),
}

impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::SessionExpired => ClientError::SessionExpired,
            RefreshError::Failed(reason) => ClientError::RefreshFailed(reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

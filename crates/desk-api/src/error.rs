//! Error types for desk-api

use thiserror::Error;

/// Result type alias using desk-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the support backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connection refused, timeout, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Backend answered 404 for the addressed entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if the operator can reasonably resend the same request.
    ///
    /// Nothing in this workspace retries on its own; this only drives what the
    /// front end tells the operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_decode() && !e.is_builder(),
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if this error means the backend could not be reached or refused
    /// the request, as opposed to a local or decoding problem.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Api { .. } | Error::NotFound(_))
    }
}

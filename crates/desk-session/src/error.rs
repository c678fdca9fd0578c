//! Error types for desk-session

use thiserror::Error;

use crate::status::CloseReason;

/// Result type alias using desk-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a conversation session
#[derive(Error, Debug)]
pub enum Error {
    /// The message was empty after trimming
    #[error("message is empty")]
    EmptyInput,

    /// No agent has been selected yet
    #[error("no agent selected")]
    NoAgentSelected,

    /// The conversation ended; a new query must be started first
    #[error("conversation is {0}; start a new query to continue")]
    Closed(CloseReason),

    /// Another turn or resolve is still waiting on the backend
    #[error("a request is already in flight")]
    Busy,

    /// The operation does not apply to the current state
    #[error("cannot {operation} while the session is {status}")]
    InvalidState {
        operation: &'static str,
        status: &'static str,
    },

    /// The reply belongs to a session that has since been reset
    #[error("discarded reply from generation {issued} (session is at {current})")]
    StaleResponse { issued: u64, current: u64 },

    /// The reply belongs to a call that already completed
    #[error("discarded reply for call {call}, which is no longer in flight")]
    NotInFlight { call: u64 },

    /// An error from the support backend
    #[error(transparent)]
    Backend(#[from] desk_api::Error),
}

impl Error {
    /// Input was rejected before anything was sent
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput | Error::NoAgentSelected | Error::Closed(_) | Error::Busy
        )
    }

    /// Stale replies are dropped quietly and never shown to the operator
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            Error::StaleResponse { .. } | Error::NotInFlight { .. }
        )
    }

    /// Whether resending by hand is likely to help
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Backend(e) => e.is_retryable(),
            Error::Busy => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::EmptyInput.is_validation());
        assert!(Error::Closed(CloseReason::Escalated).is_validation());
        assert!(!Error::StaleResponse { issued: 1, current: 2 }.is_validation());
        assert!(Error::StaleResponse { issued: 1, current: 2 }.is_stale());
        assert!(Error::NotInFlight { call: 3 }.is_stale());
        assert!(!Error::NotInFlight { call: 3 }.is_validation());
        assert!(Error::Backend(desk_api::Error::api(503, "down")).is_retryable());
        assert!(!Error::Backend(desk_api::Error::api(400, "bad")).is_retryable());
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let e = Error::from(desk_api::Error::api(500, "boom"));
        assert_eq!(e.to_string(), "API error (500): boom");
    }
}

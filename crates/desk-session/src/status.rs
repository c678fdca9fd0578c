//! Session lifecycle states

use desk_api::{ConversationId, ConversationStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a conversation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The operator resolved it
    Resolved,
    /// The backend handed it to a human
    Escalated,
}

impl CloseReason {
    /// Status the backend records for a conversation closed this way
    pub fn backend_status(&self) -> ConversationStatus {
        match self {
            CloseReason::Resolved => ConversationStatus::Resolved,
            CloseReason::Escalated => ConversationStatus::Escalated,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloseReason::Resolved => "resolved",
            CloseReason::Escalated => "escalated",
        })
    }
}

/// Where the session is in its lifecycle.
///
/// The conversation id lives inside `Open`, so a session holds one exactly
/// when it is open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// No conversation yet
    #[default]
    Idle,
    /// Conversation assigned by the backend and accepting turns
    Open { conversation_id: ConversationId },
    /// Terminal until the operator starts a new query or switches agents
    Closed { reason: CloseReason },
}

impl SessionStatus {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            SessionStatus::Open { conversation_id } => Some(conversation_id),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionStatus::Closed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Open { .. } => "open",
            SessionStatus::Closed { .. } => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => f.write_str("idle"),
            SessionStatus::Open { conversation_id } => write!(f, "open ({conversation_id})"),
            SessionStatus::Closed { reason } => write!(f, "closed ({reason})"),
        }
    }
}

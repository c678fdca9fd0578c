//! Session event types

use desk_api::{AgentId, ConversationId};
use serde::{Deserialize, Serialize};

use crate::{status::SessionStatus, turn::Turn};

/// Events emitted while a session changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn was added to the transcript
    TurnAppended { turn: Turn },

    /// Lifecycle transition
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// A backend call started or finished
    BusyChanged { busy: bool },

    /// The session was reset for another agent
    AgentSwitched {
        agent_id: AgentId,
        /// Open conversation left behind without resolving it
        abandoned: Option<ConversationId>,
    },

    /// The transcript was cleared for a new query
    Restarted { generation: u64 },

    /// A reply arrived for a session generation that no longer exists
    ResponseDiscarded { issued: u64, current: u64 },

    /// A backend call failed
    Error { message: String },
}

impl SessionEvent {
    /// Events a front end should not show the operator
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            SessionEvent::BusyChanged { .. } | SessionEvent::ResponseDiscarded { .. }
        )
    }
}

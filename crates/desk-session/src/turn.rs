//! Transcript entries: who said what, and what the agent reported about it.

use desk_api::TurnReply;
use serde::{Deserialize, Serialize};

/// Placeholder shown in place of an agent reply when the backend call failed
pub const UNREACHABLE_AGENT_TEXT: &str = "Error: Could not reach agent.";

/// Note appended once the operator resolves a conversation
pub const RESOLVED_NOTE_TEXT: &str = "Conversation marked as resolved.";

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human operator
    User,
    /// The automated support agent
    Agent,
    /// Notes produced by the session itself
    System,
}

/// What the agent reported alongside a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub intent: String,
    /// `0.0..=1.0`
    pub confidence_score: f64,
    pub escalated: bool,
}

/// One entry of the session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
    /// Set on the placeholder turn appended after a failed send
    #[serde(default)]
    pub is_error: bool,
    /// Unix millis
    pub timestamp: i64,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>, metadata: Option<TurnMetadata>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            metadata,
            is_error: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    /// Agent turn built from a backend reply
    pub fn agent(reply: &TurnReply) -> Self {
        Self::new(
            Role::Agent,
            reply.text.clone(),
            Some(TurnMetadata {
                intent: reply.intent.clone(),
                confidence_score: reply.confidence,
                escalated: reply.escalated,
            }),
        )
    }

    /// Inline error shown where the agent reply would have been
    pub fn unreachable() -> Self {
        let mut turn = Self::new(Role::Agent, UNREACHABLE_AGENT_TEXT, None);
        turn.is_error = true;
        turn
    }

    pub fn resolved_note() -> Self {
        Self::new(
            Role::System,
            RESOLVED_NOTE_TEXT,
            Some(TurnMetadata {
                intent: "resolved".to_string(),
                confidence_score: 1.0,
                escalated: false,
            }),
        )
    }

    pub fn is_escalation(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.escalated)
    }
}

/// Read-only views over a list of turns
pub trait Transcript {
    fn count_role(&self, role: Role) -> usize;

    /// Metadata of the most recent real agent reply
    fn last_agent_metadata(&self) -> Option<&TurnMetadata>;

    fn error_count(&self) -> usize;
}

impl Transcript for [Turn] {
    fn count_role(&self, role: Role) -> usize {
        self.iter().filter(|t| t.role == role).count()
    }

    fn last_agent_metadata(&self) -> Option<&TurnMetadata> {
        self.iter()
            .rev()
            .filter(|t| t.role == Role::Agent && !t.is_error)
            .find_map(|t| t.metadata.as_ref())
    }

    fn error_count(&self) -> usize {
        self.iter().filter(|t| t.is_error).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_api::ConversationId;

    fn reply(escalated: bool) -> TurnReply {
        TurnReply {
            conversation_id: Some(ConversationId::new("c1")),
            text: "It has shipped.".into(),
            intent: "order_status".into(),
            confidence: 0.92,
            escalated,
            tool_calls: None,
        }
    }

    #[test]
    fn test_agent_turn_carries_metadata() {
        let turn = Turn::agent(&reply(false));
        assert_eq!(turn.role, Role::Agent);
        let meta = turn.metadata.as_ref().unwrap();
        assert_eq!(meta.intent, "order_status");
        assert_eq!(meta.confidence_score, 0.92);
        assert!(!turn.is_escalation());
        assert!(Turn::agent(&reply(true)).is_escalation());
    }

    #[test]
    fn test_turn_ids_are_unique() {
        assert_ne!(Turn::user("a").id, Turn::user("a").id);
    }

    #[test]
    fn test_transcript_views() {
        let turns = vec![
            Turn::user("hi"),
            Turn::agent(&reply(false)),
            Turn::user("again"),
            Turn::unreachable(),
            Turn::resolved_note(),
        ];
        assert_eq!(turns.count_role(Role::User), 2);
        assert_eq!(turns.count_role(Role::Agent), 2);
        assert_eq!(turns.count_role(Role::System), 1);
        assert_eq!(turns.error_count(), 1);
        assert_eq!(
            turns.last_agent_metadata().map(|m| m.intent.as_str()),
            Some("order_status")
        );
    }

    #[test]
    fn test_unreachable_turn_text() {
        let turn = Turn::unreachable();
        assert!(turn.is_error);
        assert_eq!(turn.content, UNREACHABLE_AGENT_TEXT);
        assert!(turn.metadata.is_none());
    }
}

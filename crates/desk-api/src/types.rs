//! Core types for the support backend

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::loose;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        // Sheet rows sometimes hand back numeric-looking ids as numbers.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                loose::string(deserializer).map(Self)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a configured support agent
    AgentId
);

opaque_id!(
    /// Backend-assigned identifier of one conversation
    ConversationId
);

/// Body of `POST /chat/`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub agent_id: &'a AgentId,
    pub query: &'a str,
    /// `None` asks the backend to open a new conversation
    pub conversation_id: Option<&'a ConversationId>,
}

/// Raw reply of `POST /chat/`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default, deserialize_with = "loose::f64")]
    pub confidence_score: f64,
    #[serde(default, deserialize_with = "loose::bool")]
    pub escalated: bool,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub tool_calls: Option<serde_json::Value>,
}

/// Agent reply to one chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    /// Conversation the turn was recorded under (assigned on the first turn)
    pub conversation_id: Option<ConversationId>,
    /// Agent response text (markdown)
    pub text: String,
    /// Free-text intent label
    pub intent: String,
    /// Confidence in `[0.0, 1.0]`
    pub confidence: f64,
    /// Backend decided a human must take over
    pub escalated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
}

impl From<ChatResponse> for TurnReply {
    fn from(raw: ChatResponse) -> Self {
        let confidence = if raw.confidence_score.is_nan() {
            0.0
        } else {
            raw.confidence_score.clamp(0.0, 1.0)
        };
        Self {
            conversation_id: raw.conversation_id.filter(|id| !id.is_empty()),
            text: raw.response,
            intent: raw.intent,
            confidence,
            escalated: raw.escalated,
            tool_calls: raw.tool_calls,
        }
    }
}

/// Conversation status as stored by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Escalated,
    Closed,
    Resolved,
    #[serde(other)]
    Unknown,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Escalated => "escalated",
            ConversationStatus::Closed => "closed",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Unknown => "unknown",
        }
    }

    /// Whether the conversation has ended on the backend
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConversationStatus::Active | ConversationStatus::Unknown)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the conversation listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub agent_id: AgentId,
    /// Only filled in by the all-agents listing
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub agent_name: Option<String>,
    pub status: ConversationStatus,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub started_at: Option<String>,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub ended_at: Option<String>,
    #[serde(default, deserialize_with = "loose::u32")]
    pub total_messages: u32,
}

impl ConversationSummary {
    /// Wall-clock length of the conversation, when both ends are known
    pub fn duration(&self) -> Option<chrono::Duration> {
        let started = parse_timestamp(self.started_at.as_deref()?)?;
        let ended = parse_timestamp(self.ended_at.as_deref()?)?;
        (ended >= started).then(|| ended - started)
    }
}

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// One stored message of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub message_id: Option<String>,
    pub role: MessageRole,
    #[serde(default, deserialize_with = "loose::string")]
    pub content: String,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub intent: Option<String>,
    #[serde(default, deserialize_with = "loose::opt_f64")]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "loose::bool")]
    pub escalated: bool,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub timestamp: Option<String>,
}

/// A configured support agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(alias = "agent_id")]
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub system_instructions: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Replies below this confidence are escalated by the backend
    #[serde(default = "default_escalation_threshold", deserialize_with = "loose::f64")]
    pub escalation_threshold: f64,
    #[serde(default = "default_max_attempts", deserialize_with = "loose::u32")]
    pub max_attempts: u32,
}

fn default_escalation_threshold() -> f64 {
    0.5
}

fn default_max_attempts() -> u32 {
    3
}

impl AgentProfile {
    /// Case-insensitive match on name or persona, as the agent picker filters
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.persona.to_lowercase().contains(&term)
    }
}

/// One entry of the escalation queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "loose::string")]
    pub query: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub reason: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub status: String,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub created_at: Option<String>,
}

/// Parse the backend's ISO-8601 timestamps, with or without an offset.
pub fn parse_timestamp(s: &str) -> Option<chrono::NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

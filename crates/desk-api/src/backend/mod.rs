//! Support backend contract

pub mod http;

use async_trait::async_trait;

use crate::{
    AgentId, AgentProfile, ConversationId, ConversationSummary, EscalationRecord, MessageRecord,
    Result, TurnReply,
};

/// Operations the console consumes from the remote support backend.
///
/// The backend owns agents, conversations, messages and the escalation queue.
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait SupportBackend: Send + Sync {
    /// Send one operator turn to an agent.
    ///
    /// A `None` conversation id starts a new conversation; the reply carries the
    /// id the backend assigned or echoed.
    async fn send_turn(
        &self,
        agent_id: &AgentId,
        text: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<TurnReply>;

    /// Mark a conversation resolved. Resolving twice is not an error.
    async fn resolve_conversation(&self, conversation_id: &ConversationId) -> Result<()>;

    /// List conversations, newest first, optionally restricted to one agent.
    async fn list_conversations(
        &self,
        agent_id: Option<&AgentId>,
    ) -> Result<Vec<ConversationSummary>>;

    /// Messages of one conversation in timestamp order.
    async fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<MessageRecord>>;

    async fn list_agents(&self) -> Result<Vec<AgentProfile>>;

    async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentProfile>;

    /// Current escalation queue.
    async fn list_escalations(&self) -> Result<Vec<EscalationRecord>>;
}

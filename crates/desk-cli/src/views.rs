//! Plain-text rendering of transcripts, history listings and the escalation
//! queue

use desk_api::{
    AgentId, AgentProfile, ConversationId, ConversationSummary, EscalationRecord, MessageRecord,
    MessageRole,
};
use desk_session::{CloseReason, Role, SessionEvent, SessionStatus, Turn, TurnMetadata};

use crate::utils::{cell, percent, truncate_chars};

/// "Intent: billing | 87% Confidence", or "Escalated" in place of the score
pub fn turn_badge(meta: &TurnMetadata) -> String {
    let intent = if meta.intent.trim().is_empty() {
        "unknown"
    } else {
        meta.intent.as_str()
    };
    if meta.escalated {
        format!("Intent: {} | Escalated", intent)
    } else {
        format!(
            "Intent: {} | {} Confidence",
            intent,
            percent(meta.confidence_score)
        )
    }
}

pub fn render_turn(turn: &Turn) -> String {
    match turn.role {
        Role::User => format!("you> {}", turn.content),
        Role::Agent if turn.is_error => format!("agent> [{}]", turn.content),
        Role::Agent => match &turn.metadata {
            Some(meta) => format!("agent> {}\n       [{}]", turn.content, turn_badge(meta)),
            None => format!("agent> {}", turn.content),
        },
        Role::System => format!("-- {} --", turn.content),
    }
}

/// One-line notice for a lifecycle transition worth telling the operator
pub fn render_status_change(from: &SessionStatus, to: &SessionStatus) -> Option<String> {
    match (from, to) {
        (SessionStatus::Idle, SessionStatus::Open { conversation_id }) => {
            Some(format!("[conversation {} started]", conversation_id))
        }
        (
            SessionStatus::Open { conversation_id: old },
            SessionStatus::Open { conversation_id: new },
        ) if old != new => Some(format!("[conversation {} continued as {}]", old, new)),
        (_, SessionStatus::Closed { reason }) => Some(match reason {
            CloseReason::Escalated => {
                "[escalated to a human agent; use /new to ask something else]".to_string()
            }
            CloseReason::Resolved => "[resolved; use /new to ask something else]".to_string(),
        }),
        _ => None,
    }
}

/// What the interactive loop prints for a session event, if anything.
/// User turns are skipped since the operator just typed them.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    if event.is_silent() {
        return None;
    }
    match event {
        SessionEvent::TurnAppended { turn } if turn.role == Role::User => None,
        SessionEvent::TurnAppended { turn } => Some(render_turn(turn)),
        SessionEvent::StatusChanged { from, to } => render_status_change(from, to),
        SessionEvent::AgentSwitched {
            agent_id,
            abandoned,
        } => Some(match abandoned {
            Some(conversation) => format!(
                "[now chatting with {}; conversation {} left open on the backend]",
                agent_id, conversation
            ),
            None => format!("[now chatting with {}]", agent_id),
        }),
        SessionEvent::Restarted { .. } => Some("[new query]".to_string()),
        SessionEvent::Error { message } => Some(format!("Error: {}", message)),
        _ => None,
    }
}

pub fn agents_table(agents: &[AgentProfile], current: Option<&AgentId>) -> String {
    if agents.is_empty() {
        return "No agents configured.".to_string();
    }
    let mut out = format!(
        "  {:<14} {:<24} {:<8} {:<6} {}\n",
        "ID", "Name", "Thresh", "Tries", "Persona"
    );
    out.push_str(&"-".repeat(90));
    out.push('\n');
    for agent in agents {
        let marker = if current == Some(&agent.id) { '*' } else { ' ' };
        out.push_str(&format!(
            "{} {:<14} {:<24} {:<8} {:<6} {}\n",
            marker,
            cell(agent.id.as_str(), 14),
            cell(&agent.name, 24),
            percent(agent.escalation_threshold),
            agent.max_attempts,
            cell(&agent.persona, 30),
        ));
    }
    out
}

pub fn conversations_table(conversations: &[ConversationSummary]) -> String {
    if conversations.is_empty() {
        return "No conversations found.".to_string();
    }
    let mut out = format!(
        "{:<38} {:<20} {:<10} {:<6} {:<20} {}\n",
        "Conversation", "Agent", "Status", "Msgs", "Started", "Duration"
    );
    out.push_str(&"-".repeat(110));
    out.push('\n');
    for conversation in conversations {
        let agent = conversation
            .agent_name
            .as_deref()
            .unwrap_or(conversation.agent_id.as_str());
        let started = conversation
            .started_at
            .as_deref()
            .and_then(desk_api::parse_timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let duration = match conversation.duration() {
            Some(duration) => format_duration(duration),
            None if !conversation.status.is_terminal() => "ongoing".to_string(),
            None => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<38} {:<20} {:<10} {:<6} {:<20} {}\n",
            cell(conversation.conversation_id.as_str(), 38),
            cell(agent, 20),
            conversation.status.as_str(),
            conversation.total_messages,
            started,
            duration,
        ));
    }
    out
}

pub fn messages_view(conversation_id: &ConversationId, messages: &[MessageRecord]) -> String {
    if messages.is_empty() {
        return format!("No messages in conversation {}.", conversation_id);
    }
    let mut out = format!("Conversation {}\n", conversation_id);
    out.push_str(&"-".repeat(60));
    out.push('\n');
    for message in messages {
        let who = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "agent",
            MessageRole::Other => "other",
        };
        out.push_str(&format!("{}> {}\n", who, message.content));
        if message.role == MessageRole::Assistant {
            let meta = TurnMetadata {
                intent: message.intent.clone().unwrap_or_default(),
                confidence_score: message.confidence_score.unwrap_or(0.0),
                escalated: message.escalated,
            };
            out.push_str(&format!("       [{}]\n", turn_badge(&meta)));
        }
    }
    out
}

pub fn escalations_table(escalations: &[EscalationRecord]) -> String {
    if escalations.is_empty() {
        return "Escalation queue is empty.".to_string();
    }
    let mut out = format!(
        "{:<38} {:<10} {:<30} {}\n",
        "Conversation", "Status", "Reason", "Query"
    );
    out.push_str(&"-".repeat(110));
    out.push('\n');
    for escalation in escalations {
        let conversation = escalation
            .conversation_id
            .as_ref()
            .map(|c| c.as_str())
            .unwrap_or("-");
        out.push_str(&format!(
            "{:<38} {:<10} {:<30} {}\n",
            cell(conversation, 38),
            cell(&escalation.status, 10),
            cell(&escalation.reason, 30),
            truncate_chars(&escalation.query.replace('\n', " "), 40),
        ));
    }
    out
}

fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

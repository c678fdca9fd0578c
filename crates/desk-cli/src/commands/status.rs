//! /status command - show where the session stands

use super::CommandResult;
use desk_session::{Role, SessionSnapshot, SessionStatus, Transcript};

use crate::views::turn_badge;

pub struct StatusCommand;

impl StatusCommand {
    pub fn execute(snapshot: &SessionSnapshot) -> CommandResult {
        let turns = snapshot.turns.as_slice();

        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        let agent = snapshot
            .agent_id
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "none".to_string());
        output.push_str(&format!("Agent:      {}\n", agent));
        output.push_str(&format!("Status:     {}\n", snapshot.status));
        if let SessionStatus::Closed { reason } = &snapshot.status {
            output.push_str(&format!("Backend:    {}\n", reason.backend_status()));
        }
        if snapshot.busy {
            output.push_str("            (waiting on the backend)\n");
        }
        output.push('\n');

        output.push_str(&format!("Turns:      {} total\n", turns.len()));
        output.push_str(&format!(
            "            {} user, {} agent, {} failed\n",
            turns.count_role(Role::User),
            turns.count_role(Role::Agent) - turns.error_count(),
            turns.error_count()
        ));

        if let Some(meta) = turns.last_agent_metadata() {
            output.push_str(&format!("Last reply: {}\n", turn_badge(meta)));
        }

        CommandResult::Message(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_api::{AgentId, ConversationId, TurnReply};
    use desk_session::{SessionStatus, Turn};

    #[test]
    fn test_status_counts_turns() {
        let reply = TurnReply {
            conversation_id: Some(ConversationId::new("c1")),
            text: "ok".into(),
            intent: "billing".into(),
            confidence: 0.75,
            escalated: false,
            tool_calls: None,
        };
        let snapshot = SessionSnapshot {
            agent_id: Some(AgentId::new("a1")),
            status: SessionStatus::Open {
                conversation_id: ConversationId::new("c1"),
            },
            turns: vec![
                Turn::user("hi"),
                Turn::unreachable(),
                Turn::user("hi again"),
                Turn::agent(&reply),
            ],
            generation: 0,
            busy: false,
        };

        let CommandResult::Message(out) = StatusCommand::execute(&snapshot) else {
            panic!("expected a message");
        };
        assert!(out.contains("Agent:      a1"));
        assert!(out.contains("Status:     open (c1)"));
        assert!(out.contains("2 user, 1 agent, 1 failed"));
        assert!(out.contains("Last reply: Intent: billing | 75% Confidence"));
        assert!(!out.contains("Backend:"));
    }

    #[test]
    fn test_status_shows_backend_status_once_closed() {
        let snapshot = SessionSnapshot {
            agent_id: Some(AgentId::new("a1")),
            status: SessionStatus::Closed {
                reason: desk_session::CloseReason::Escalated,
            },
            turns: Vec::new(),
            generation: 1,
            busy: false,
        };

        let CommandResult::Message(out) = StatusCommand::execute(&snapshot) else {
            panic!("expected a message");
        };
        assert!(out.contains("Status:     closed (escalated)"));
        assert!(out.contains("Backend:    escalated"));
    }
}

//! Slash commands for interactive mode

mod status;

pub use status::StatusCommand;

use desk_api::AgentId;
use desk_session::SessionSnapshot;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Resolve the open conversation
    Resolve,
    /// Switch to another agent
    SwitchAgent(AgentId),
    /// List the backend's agents, optionally filtered by name or persona
    ListAgents(Option<String>),
    /// Clear a closed conversation and start over
    NewQuery,
    /// Show a message to the user (not sent to the agent)
    Message(String),
    /// Leave, through the exit guard
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, snapshot: &SessionSnapshot) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "resolve" | "r" => CommandResult::Resolve,

        "agent" | "a" => {
            if args.is_empty() {
                let current = snapshot
                    .agent_id
                    .as_ref()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "none".to_string());
                CommandResult::Message(format!(
                    "Current agent: {}\nUsage: /agent <id>  (see /agents)",
                    current
                ))
            } else {
                CommandResult::SwitchAgent(AgentId::new(args))
            }
        }

        "agents" => CommandResult::ListAgents((!args.is_empty()).then(|| args.to_string())),

        "new" | "n" => CommandResult::NewQuery,

        "status" | "s" => StatusCommand::execute(snapshot),

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /resolve, /r         Mark the open conversation as resolved
  /agent, /a <id>      Switch to another agent (drops the current transcript)
  /agents [term]       List available agents, filtered by name or persona
  /new, /n             Start a new query after a conversation has closed
  /status, /s          Show session status
  /quit, /exit, /q     Exit desk

Anything else is sent to the agent as a message."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_session::SessionStatus;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            agent_id: Some(AgentId::new("a1")),
            status: SessionStatus::Idle,
            turns: Vec::new(),
            generation: 0,
            busy: false,
        }
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(execute_command("where is my order?", &snapshot()).is_none());
    }

    #[test]
    fn test_parse_commands() {
        let s = snapshot();
        assert_eq!(execute_command("/resolve", &s), Some(CommandResult::Resolve));
        assert_eq!(execute_command("  /Q ", &s), Some(CommandResult::Exit));
        assert_eq!(execute_command("/new", &s), Some(CommandResult::NewQuery));
        assert_eq!(execute_command("/agents", &s), Some(CommandResult::ListAgents(None)));
        assert_eq!(
            execute_command("/agents billing", &s),
            Some(CommandResult::ListAgents(Some("billing".into())))
        );
        assert_eq!(
            execute_command("/agent  billing-2 ", &s),
            Some(CommandResult::SwitchAgent(AgentId::new("billing-2")))
        );
        assert_eq!(
            execute_command("/frobnicate", &s),
            Some(CommandResult::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn test_agent_without_id_shows_current() {
        let Some(CommandResult::Message(msg)) = execute_command("/agent", &snapshot()) else {
            panic!("expected a message");
        };
        assert!(msg.starts_with("Current agent: a1"));
    }
}

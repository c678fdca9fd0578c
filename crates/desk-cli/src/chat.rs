//! Interactive chat tester and one-shot mode

use std::future::Future;
use std::io::Write;

use anyhow::Result;
use desk_api::{AgentId, AgentProfile};
use desk_session::{
    ConversationSession, Error as SessionError, ExitChoice, ResolveOutcome, SessionEvent,
    SwitchOutcome,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::commands::{self, CommandResult};
use crate::views;

/// Line-oriented operator input
struct Input<R = BufReader<Stdin>> {
    lines: Lines<R>,
}

impl Input {
    fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Input<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }

    /// Print `question` and read the answer. `None` on EOF; Ctrl-C answers
    /// `on_interrupt`.
    async fn ask(&mut self, question: &str, on_interrupt: &str) -> Result<Option<String>> {
        self.ask_until(question, tokio::signal::ctrl_c(), on_interrupt)
            .await
    }

    async fn ask_until<F: Future>(
        &mut self,
        question: &str,
        interrupt: F,
        on_interrupt: &str,
    ) -> Result<Option<String>> {
        print!("{} ", question);
        std::io::stdout().flush()?;
        tokio::select! {
            answer = self.next_line() => Ok(answer?.map(|a| a.trim().to_lowercase())),
            _ = interrupt => {
                println!();
                Ok(Some(on_interrupt.to_string()))
            }
        }
    }
}

enum Line {
    Text(String),
    Interrupt,
    Eof,
}

/// Run the interactive chat loop until the operator leaves
pub async fn run_interactive(
    session: &ConversationSession,
    agent: &AgentProfile,
    api_url: &str,
) -> Result<()> {
    let mut events = session.subscribe();
    let mut input = Input::stdin();

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("desk: {} ({}) at {}", agent.name, agent.id, api_url);
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = input.next_line() => match line? {
                Some(text) => Line::Text(text),
                None => Line::Eof,
            },
            _ = tokio::signal::ctrl_c() => Line::Interrupt,
        };

        let text = match line {
            Line::Text(text) => text,
            Line::Eof | Line::Interrupt => {
                println!();
                if leave(session, &mut input, &mut events).await? {
                    break;
                }
                continue;
            }
        };

        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(text, &session.snapshot()) {
            match result {
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
                CommandResult::Exit => {
                    if leave(session, &mut input, &mut events).await? {
                        break;
                    }
                }
                CommandResult::Resolve => match session.resolve().await {
                    Ok(ResolveOutcome::Resolved) => {}
                    Ok(ResolveOutcome::NotOpen) => println!("No open conversation to resolve."),
                    Err(e) => report(&e),
                },
                CommandResult::NewQuery => {
                    if let Err(e) = session.start_new_query() {
                        println!("{}", e);
                    }
                }
                CommandResult::ListAgents(filter) => match session.backend().list_agents().await {
                    Ok(mut agents) => {
                        if let Some(term) = filter {
                            agents.retain(|a| a.matches(&term));
                        }
                        let current = session.agent_id();
                        println!(
                            "{}",
                            views::agents_table(&agents, current.as_ref()).trim_end()
                        );
                    }
                    Err(e) => println!("Error: {}", e),
                },
                CommandResult::SwitchAgent(agent_id) => {
                    switch_agent(session, &mut input, agent_id).await?;
                }
            }
            drain(&mut events);
            println!();
            continue;
        }

        if let Err(e) = session.submit_turn(text).await {
            report(&e);
        }
        drain(&mut events);
        println!();
    }

    Ok(())
}

/// Send one message, print the reply and resolve whatever it opened
pub async fn run_command(session: &ConversationSession, text: &str) -> Result<()> {
    let mut events = session.subscribe();
    println!("you> {}", text);

    let result = session.submit_turn(text).await;
    drain(&mut events);

    if session.intercept_exit().is_blocked() {
        session.settle_exit(ExitChoice::ResolveAndLeave).await;
        drain(&mut events);
    }

    result?;
    Ok(())
}

/// Run the exit guard. `true` when the loop may end.
async fn leave(
    session: &ConversationSession,
    input: &mut Input,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<bool> {
    if !session.intercept_exit().is_blocked() {
        return Ok(true);
    }

    let open = session
        .conversation_id()
        .map(|c| c.to_string())
        .unwrap_or_default();
    let question = format!(
        "Conversation {} is still open. [s]tay or [r]esolve & leave?",
        open
    );
    let choice = loop {
        match input.ask(&question, "s").await? {
            // Nobody left to answer
            None => break ExitChoice::ResolveAndLeave,
            Some(answer) => {
                if let Some(choice) = parse_exit_choice(&answer) {
                    break choice;
                }
            }
        }
    };

    let decision = session.settle_exit(choice).await;
    drain(events);
    Ok(!decision.is_blocked())
}

async fn switch_agent(
    session: &ConversationSession,
    input: &mut Input,
    agent_id: AgentId,
) -> Result<()> {
    let profile = match session.backend().get_agent(&agent_id).await {
        Ok(profile) => profile,
        Err(desk_api::Error::NotFound(_)) => {
            println!("Unknown agent: {}", agent_id);
            return Ok(());
        }
        Err(e) => {
            println!("Error: {}", e);
            return Ok(());
        }
    };

    let approved = match session.conversation_id() {
        Some(open) => {
            let question = format!("Leave conversation {} without resolving it? [y/N]", open);
            let answer = input.ask(&question, "n").await?;
            answer.as_deref().is_some_and(is_yes).then_some(open)
        }
        None => None,
    };

    let outcome = session.switch_agent(profile.id, |open| approved.as_ref() == Some(open));
    if outcome == SwitchOutcome::Declined {
        println!("Staying in the current conversation.");
    }
    Ok(())
}

/// Print session events the operator should see
fn drain(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(line) = views::render_event(&event) {
                    println!("{}", line);
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "session events dropped");
            }
            Err(_) => break,
        }
    }
}

/// Backend failures already surface as session events
fn report(error: &SessionError) {
    match error {
        SessionError::Backend(_) => {}
        e if e.is_stale() => {}
        e if e.is_validation() => println!("{}", e),
        e => println!("Error: {}", e),
    }
}

fn parse_exit_choice(answer: &str) -> Option<ExitChoice> {
    match answer.trim().to_lowercase().as_str() {
        "s" | "stay" => Some(ExitChoice::Stay),
        "r" | "resolve" => Some(ExitChoice::ResolveAndLeave),
        _ => None,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_api::{HttpBackend, SupportBackend};
    use desk_session::{CloseReason, SessionStatus};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn session(server: &MockServer) -> ConversationSession {
        let backend: Arc<dyn SupportBackend> =
            Arc::new(HttpBackend::new(server.base_url()).unwrap());
        ConversationSession::with_agent(backend, "a1")
    }

    #[test]
    fn test_parse_exit_choice() {
        assert_eq!(parse_exit_choice("s"), Some(ExitChoice::Stay));
        assert_eq!(parse_exit_choice(" Resolve "), Some(ExitChoice::ResolveAndLeave));
        assert_eq!(parse_exit_choice("later"), None);
    }

    #[tokio::test]
    async fn test_interrupted_prompt_gives_cancel_answer() {
        // Nothing is ever typed on the other end
        let (_keyboard, terminal) = tokio::io::duplex(64);
        let mut input = Input::new(BufReader::new(terminal));

        let answer = input
            .ask_until("[s]tay or [r]esolve & leave?", std::future::ready(()), "s")
            .await
            .unwrap();
        assert_eq!(answer.as_deref(), Some("s"));
        assert_eq!(parse_exit_choice("s"), Some(ExitChoice::Stay));

        let answer = input
            .ask_until("[y/N]", std::future::ready(()), "n")
            .await
            .unwrap();
        assert!(!answer.as_deref().is_some_and(is_yes));
    }

    #[tokio::test]
    async fn test_prompt_reads_typed_answer() {
        let mut input = Input::new(BufReader::new(&b" R \n"[..]));
        let answer = input
            .ask_until("[s]tay or [r]esolve & leave?", std::future::pending::<()>(), "s")
            .await
            .unwrap();
        assert_eq!(answer.as_deref(), Some("r"));

        // EOF after the answer
        let answer = input
            .ask_until("again?", std::future::pending::<()>(), "s")
            .await
            .unwrap();
        assert!(answer.is_none());
    }

    #[test]
    fn test_is_yes_defaults_to_no() {
        assert!(is_yes("Y"));
        assert!(is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
    }

    #[tokio::test]
    async fn test_run_command_resolves_opened_conversation() {
        let server = MockServer::start();
        let chat = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/")
                .json_body(json!({"agent_id": "a1", "query": "hello", "conversation_id": null}));
            then.status(200).json_body(json!({
                "response": "Hi, how can I help?",
                "intent": "greeting",
                "confidence_score": 0.9,
                "escalated": false,
                "conversation_id": "c1"
            }));
        });
        let resolve = server.mock(|when, then| {
            when.method(PUT).path("/conversations/c1/resolve");
            then.status(200).json_body(json!({"status": "resolved"}));
        });

        let session = session(&server);
        run_command(&session, "hello").await.unwrap();

        chat.assert();
        resolve.assert();
        assert_eq!(
            session.status(),
            SessionStatus::Closed {
                reason: CloseReason::Resolved
            }
        );
    }

    #[tokio::test]
    async fn test_run_command_leaves_even_if_resolve_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/");
            then.status(200).json_body(json!({
                "response": "Let me check.",
                "intent": "order_status",
                "confidence_score": 0.8,
                "escalated": false,
                "conversation_id": "c2"
            }));
        });
        let resolve = server.mock(|when, then| {
            when.method(PUT).path("/conversations/c2/resolve");
            then.status(500).json_body(json!({"detail": "sheet unavailable"}));
        });

        let session = session(&server);
        run_command(&session, "where is my order").await.unwrap();

        resolve.assert();
        assert!(session.status().is_open());
    }

    #[tokio::test]
    async fn test_run_command_skips_resolve_after_escalation() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/");
            then.status(200).json_body(json!({
                "response": "Connecting you to a human.",
                "intent": "complaint",
                "confidence_score": 0.1,
                "escalated": true,
                "conversation_id": "c3"
            }));
        });
        let resolve = server.mock(|when, then| {
            when.method(PUT).path("/conversations/c3/resolve");
            then.status(200);
        });

        let session = session(&server);
        run_command(&session, "this is unacceptable").await.unwrap();

        resolve.assert_hits(0);
        assert_eq!(
            session.status(),
            SessionStatus::Closed {
                reason: CloseReason::Escalated
            }
        );
    }

    #[tokio::test]
    async fn test_run_command_reports_unreachable_backend() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/");
            then.status(502).body("bad gateway");
        });

        let session = session(&server);
        let err = run_command(&session, "hello").await.unwrap_err();

        assert!(err.to_string().contains("502"));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.turns().last().unwrap().is_error);
    }
}

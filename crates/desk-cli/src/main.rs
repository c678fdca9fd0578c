//! desk - interactive tester for automated support agents

mod chat;
mod commands;
mod config;
mod utils;
mod views;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use desk_api::{AgentId, AgentProfile, ConversationId, DEFAULT_TIMEOUT, HttpBackend, SupportBackend};
use desk_session::ConversationSession;

/// desk - chat with support agents and inspect their history
#[derive(Parser, Debug)]
#[command(name = "desk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent to chat with (also filters --conversations)
    #[arg(short, long)]
    agent: Option<String>,

    /// Send one message, print the reply, then resolve the conversation
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// List available agents
    #[arg(long)]
    agents: bool,

    /// List past conversations
    #[arg(long)]
    conversations: bool,

    /// Show the messages of a conversation
    #[arg(long, value_name = "CONVERSATION")]
    messages: Option<String>,

    /// Show the escalation queue
    #[arg(long)]
    escalations: bool,

    /// Mark a conversation as resolved
    #[arg(long, value_name = "CONVERSATION")]
    resolve: Option<String>,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Support backend URL (overrides DESK_API_URL and the config file)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("desk=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        let path = config::Config::init().context("creating config file")?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    // Merge config with env and CLI args (CLI takes precedence)
    let cfg = config::Config::load();
    let api_url = config::pick_api_url(
        args.api_url.clone(),
        std::env::var("DESK_API_URL").ok(),
        cfg.api_url.clone(),
    );
    let timeout = cfg.request_timeout().unwrap_or(DEFAULT_TIMEOUT);
    tracing::debug!(%api_url, ?timeout, "using support backend");

    let backend: Arc<dyn SupportBackend> = Arc::new(
        HttpBackend::with_timeout(api_url.clone(), timeout)
            .with_context(|| format!("invalid backend URL {api_url:?}"))?,
    );

    let failed = |e: desk_api::Error| backend_error(e, &api_url);

    // History and escalation views
    if args.agents {
        let agents = backend.list_agents().await.map_err(failed)?;
        println!("{}", views::agents_table(&agents, None).trim_end());
        return Ok(());
    }

    if args.conversations {
        let agent = args.agent.as_deref().map(AgentId::from);
        let conversations = backend
            .list_conversations(agent.as_ref())
            .await
            .map_err(failed)?;
        println!("{}", views::conversations_table(&conversations).trim_end());
        return Ok(());
    }

    if let Some(id) = args.messages {
        let conversation = ConversationId::new(id);
        let messages = backend.get_messages(&conversation).await.map_err(failed)?;
        println!("{}", views::messages_view(&conversation, &messages).trim_end());
        return Ok(());
    }

    if args.escalations {
        let escalations = backend.list_escalations().await.map_err(failed)?;
        println!("{}", views::escalations_table(&escalations).trim_end());
        return Ok(());
    }

    if let Some(id) = args.resolve {
        let conversation = ConversationId::new(id);
        backend
            .resolve_conversation(&conversation)
            .await
            .map_err(failed)?;
        println!("Conversation {} marked as resolved.", conversation);
        return Ok(());
    }

    // Chat modes
    let agent = select_agent(backend.as_ref(), args.agent.or(cfg.default_agent)).await?;
    let session = ConversationSession::with_agent(Arc::clone(&backend), agent.id.clone());

    if let Some(command) = args.command {
        return chat::run_command(&session, &command).await;
    }

    chat::run_interactive(&session, &agent, &api_url).await
}

/// The requested agent, or the first one the backend lists
async fn select_agent(
    backend: &dyn SupportBackend,
    requested: Option<String>,
) -> anyhow::Result<AgentProfile> {
    match requested {
        Some(id) => backend
            .get_agent(&AgentId::new(id.as_str()))
            .await
            .with_context(|| format!("agent {id} is not available")),
        None => backend
            .list_agents()
            .await?
            .into_iter()
            .next()
            .context("the backend has no agents configured"),
    }
}

/// Name the backend in errors that came back from it or never reached it
fn backend_error(error: desk_api::Error, api_url: &str) -> anyhow::Error {
    if error.is_transport() {
        anyhow::Error::new(error)
            .context(format!("request to the support backend at {api_url} failed"))
    } else {
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_names_the_backend() {
        let err = backend_error(desk_api::Error::api(503, "down"), "http://desk.test");
        assert_eq!(
            err.to_string(),
            "request to the support backend at http://desk.test failed"
        );
        assert_eq!(err.root_cause().to_string(), "API error (503): down");
    }

    #[test]
    fn test_decoding_errors_are_passed_through() {
        let err = backend_error(
            desk_api::Error::UnexpectedResponse("expected a list".into()),
            "http://desk.test",
        );
        assert_eq!(err.to_string(), "Unexpected response: expected a list");
    }
}

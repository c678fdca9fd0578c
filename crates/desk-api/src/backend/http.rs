//! REST implementation of [`SupportBackend`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::SupportBackend;
use crate::{
    AgentId, AgentProfile, ChatRequest, ChatResponse, ConversationId, ConversationSummary,
    EscalationRecord, MessageRecord, TurnReply,
    error::{Error, Result},
};

/// Where the backend listens when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Support backend reached over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client for `base_url` with a custom per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&ChatRequest<'_>>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "backend request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), %url, "backend response");

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = error_detail(&text).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("{path}: {message}")));
        }
        Err(Error::api(status.as_u16(), message))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None).await?;
        decode(response).await
    }
}

#[async_trait]
impl SupportBackend for HttpBackend {
    async fn send_turn(
        &self,
        agent_id: &AgentId,
        text: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<TurnReply> {
        let request = ChatRequest {
            agent_id,
            query: text,
            conversation_id,
        };
        let response = self.send(Method::POST, "/chat/", Some(&request)).await?;
        let raw: ChatResponse = decode(response).await?;
        let reply = TurnReply::from(raw);
        tracing::debug!(
            conversation = ?reply.conversation_id,
            intent = %reply.intent,
            confidence = reply.confidence,
            escalated = reply.escalated,
            "chat turn answered"
        );
        Ok(reply)
    }

    async fn resolve_conversation(&self, conversation_id: &ConversationId) -> Result<()> {
        let path = format!("/conversations/{}/resolve", segment(conversation_id.as_str()));
        self.send(Method::PUT, &path, None).await?;
        Ok(())
    }

    async fn list_conversations(
        &self,
        agent_id: Option<&AgentId>,
    ) -> Result<Vec<ConversationSummary>> {
        let path = match agent_id {
            Some(agent) => format!("/conversations/agent/{}", segment(agent.as_str())),
            None => "/conversations/".to_string(),
        };
        self.get_json(&path).await
    }

    async fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<MessageRecord>> {
        let path = format!("/conversations/{}/messages", segment(conversation_id.as_str()));
        self.get_json(&path).await
    }

    async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
        self.get_json("/agents/").await
    }

    async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentProfile> {
        let path = format!("/agents/{}", segment(agent_id.as_str()));
        self.get_json(&path).await
    }

    async fn list_escalations(&self) -> Result<Vec<EscalationRecord>> {
        self.get_json("/analytics/escalations").await
    }
}

/// Read the full body and decode it, keeping the body text in the error
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::warn!("undecodable backend body: {}", text);
        Error::UnexpectedResponse(e.to_string())
    })
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidConfig("backend URL is empty".into()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::InvalidConfig(format!(
            "backend URL must start with http:// or https://, got {trimmed:?}"
        )));
    }
    Ok(trimmed.to_string())
}

fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Pull `detail` out of an error body, or fall back to the trimmed body
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(body.to_string()),
        },
        Err(_) => Some(body.to_string()),
    }
}

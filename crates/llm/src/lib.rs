//! LLM completion contract and the OpenRouter provider client.
//!
//! The orchestrator only needs one operation from a provider: send a system
//! prompt + message history + tool schema, get back either plain text or a
//! single tool invocation request.  [`CompletionClient`] captures that, the
//! OpenAI-compatible wire mapping lives in [`OpenRouterClient`], and
//! [`ScriptedClient`] replays canned outcomes for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No credential configured.  Fatal for the turn: there is no meaningful
    /// degraded behavior for a chat request without a model.
    #[error("missing LLM credential: set {0}")]
    MissingApiKey(&'static str),
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("malformed LLM response: {0}")]
    Malformed(String),
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseRequest {
    /// Provider-assigned call id, echoed back in the tool-result message.
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// One message in the loop's history, in provider-neutral form.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    User(String),
    Assistant(String),
    /// The assistant's request to run a tool, preserved in history so the
    /// provider can associate the following tool result with it.
    AssistantToolUse(ToolUseRequest),
    /// The JSON result of executing a tool, fed back to the model.
    ToolResult { call_id: String, content: String },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(content.into())
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    /// OpenAI chat/completions wire form.
    fn to_wire(&self) -> serde_json::Value {
        match self {
            Self::User(content) => json!({"role": "user", "content": content}),
            Self::Assistant(content) => json!({"role": "assistant", "content": content}),
            Self::AssistantToolUse(call) => json!({
                "role": "assistant",
                "content": serde_json::Value::Null,
                "tool_calls": [{
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.input.to_string(),
                    }
                }]
            }),
            Self::ToolResult { call_id, content } => json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": content,
            }),
        }
    }
}

/// Everything a provider needs for one round-trip of the tool loop.  The tool
/// schema is supplied verbatim on every call within a turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// OpenAI-format `tools` array entries.  Empty = no tools offered.
    pub tools: Vec<serde_json::Value>,
    pub messages: Vec<ChatMessage>,
}

/// What the model produced: a final text answer or a tool invocation.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Text(String),
    ToolUse(ToolUseRequest),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutcome, LlmError>;
}

// ── OpenRouter ───────────────────────────────────────────────────────────────

/// OpenAI-compatible chat/completions client via OpenRouter.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Read the credential from `OPENROUTER_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey(API_KEY_ENV))?;
        Ok(Self::new(api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_payload(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(json!({"role": "system", "content": request.system_prompt}));
        messages.extend(request.messages.iter().map(ChatMessage::to_wire));

        let mut payload = json!({
            "model": self.model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            payload["tools"] = serde_json::Value::Array(request.tools.clone());
        }
        payload
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutcome, LlmError> {
        let payload = self.build_payload(request);
        debug!(model = %self.model, messages = request.messages.len(), "sending completion request");

        let response = self
            .http
            .post(OPENROUTER_ENDPOINT)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://stride.local")
            .header("X-Title", "Stride")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        parse_completion(&body)
    }
}

/// Parse an OpenAI-format completion body into a [`CompletionOutcome`].
///
/// Tool-call arguments arrive as a JSON-encoded string; some providers send
/// the object directly, so both shapes are accepted.  When the model requests
/// several calls at once only the first is taken — the loop re-prompts, so the
/// model simply asks again for the rest.
pub fn parse_completion(body: &serde_json::Value) -> Result<CompletionOutcome, LlmError> {
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::Malformed("response has no choices[0].message".into()))?;

    if let Some(call) = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .and_then(|t| t.first())
    {
        let id = call
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let function = call
            .get("function")
            .ok_or_else(|| LlmError::Malformed("tool call has no function".into()))?;
        let name = function
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LlmError::Malformed("tool call has no name".into()))?
            .to_string();
        let input = match function.get("arguments") {
            Some(serde_json::Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| LlmError::Malformed(format!("tool arguments not valid JSON: {e}")))?,
            Some(value) => value.clone(),
            None => json!({}),
        };
        return Ok(CompletionOutcome::ToolUse(ToolUseRequest { id, name, input }));
    }

    let text = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(CompletionOutcome::Text(text))
}

// ── Scripted client ──────────────────────────────────────────────────────────

/// Replays a fixed sequence of outcomes.  Test double for the orchestrator
/// loop; also records every request it sees.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<CompletionOutcome>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(outcomes: impl IntoIterator<Item = CompletionOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutcome, LlmError> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| LlmError::Malformed("scripted client exhausted".into()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

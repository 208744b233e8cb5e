//! Provider contract (§6): the kernel talks to every LLM backend through this
//! trait, never through a language-magic proxy. Two reference implementations
//! ship so the resilience layer (R) has something concrete to wrap in tests;
//! richer wire adapters are out of scope (§1).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub args_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// Usage as reported by the provider itself (§6). `cache_read_tokens`,
/// `cache_write_tokens` and `cost` are optional because not every provider
/// reports them; the economics core (B) and cache tracker (C) treat a
/// missing value as zero/unknown respectively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub request_timeout: Option<Duration>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self { model: "default".to_string(), max_tokens: None, temperature: None, request_timeout: None }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub stop_reason: StopReason,
    pub usage: ProviderUsage,
}

#[derive(Debug, Clone)]
pub struct ChatWithToolsResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub stop_reason: StopReason,
    pub usage: ProviderUsage,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("request timed out")]
    Timeout,
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether `agentcore-resilience`'s retry loop should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::RateLimited | ProviderError::Timeout)
            || matches!(self, ProviderError::Http { status, .. } if *status >= 500)
    }
}

/// §6 provider contract. Implementors are opaque callables from the kernel's
/// point of view — it never inspects provider internals, only the typed
/// response.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse, ProviderError>;

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatWithToolsResponse, ProviderError>;
}

/// Deterministic provider with no network calls, used in tests and as a
/// zero-dependency smoke-test target for the kernel loop.
pub struct LocalEchoProvider {
    id: String,
}

impl LocalEchoProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    fn estimate_usage(messages: &[ChatMessage], output: &str) -> ProviderUsage {
        let input_tokens: u64 = messages.iter().map(|m| (m.content.len() as u64 / 4).max(1)).sum();
        let output_tokens = (output.len() as u64 / 4).max(1);
        ProviderUsage { input_tokens, output_tokens, cache_read_tokens: Some(0), cache_write_tokens: Some(0), cost: Some(0.0) }
    }
}

#[async_trait]
impl Provider for LocalEchoProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse, ProviderError> {
        let last = messages.iter().rev().find(|m| m.role == MessageRole::User);
        let content = match last {
            Some(m) => format!("echo: {}", m.content),
            None => "echo: (no user message)".to_string(),
        };
        let usage = Self::estimate_usage(messages, &content);
        Ok(ChatResponse { content, stop_reason: StopReason::EndTurn, usage })
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        _options: &ChatOptions,
    ) -> Result<ChatWithToolsResponse, ProviderError> {
        let content = "echo: no tool use".to_string();
        let usage = Self::estimate_usage(messages, &content);
        Ok(ChatWithToolsResponse { content, tool_calls: Vec::new(), stop_reason: StopReason::EndTurn, usage })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<OpenAiPromptDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiPromptDetails {
    #[serde(default)]
    cached_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiCompletion {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

fn stop_reason_from_finish(finish: Option<&str>) -> StopReason {
    match finish {
        Some("tool_calls") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

fn usage_from_openai(usage: Option<OpenAiUsage>) -> ProviderUsage {
    match usage {
        None => ProviderUsage::default(),
        Some(u) => ProviderUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            cache_read_tokens: u.prompt_tokens_details.and_then(|d| d.cached_tokens),
            cache_write_tokens: None,
            cost: None,
        },
    }
}

/// Non-streaming adapter for any OpenAI-compatible `/chat/completions`
/// endpoint. Streaming (SSE) is intentionally out of scope here: the kernel
/// only needs settled responses to feed the economics core and cache
/// tracker a complete usage record per call.
pub struct OpenAiCompatibleProvider {
    id: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { id: id.into(), base_url: base_url.into(), api_key, client: reqwest::Client::new() }
    }

    fn to_wire(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::Tool => "tool",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect()
    }

    async fn post(&self, body: serde_json::Value, timeout: Option<Duration>) -> Result<OpenAiCompletion, ProviderError> {
        let mut req = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status: status.as_u16(), body });
        }

        resp.json::<OpenAiCompletion>().await.map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse, ProviderError> {
        let body = serde_json::json!({
            "model": options.model,
            "messages": Self::to_wire(messages),
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });
        let completion = self.post(body, options.request_timeout).await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("empty choices array".to_string()))?;
        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            stop_reason: stop_reason_from_finish(choice.finish_reason.as_deref()),
            usage: usage_from_openai(completion.usage),
        })
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatWithToolsResponse, ProviderError> {
        let wire_tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.args_schema },
                })
            })
            .collect();
        let body = serde_json::json!({
            "model": options.model,
            "messages": Self::to_wire(messages),
            "tools": wire_tools,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });
        let completion = self.post(body, options.request_timeout).await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("empty choices array".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let args = serde_json::from_str(&tc.function.arguments).unwrap_or(serde_json::Value::Null);
                ToolCallRequest { id: tc.id, name: tc.function.name, args }
            })
            .collect();

        Ok(ChatWithToolsResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            stop_reason: stop_reason_from_finish(choice.finish_reason.as_deref()),
            usage: usage_from_openai(completion.usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_echo_reflects_last_user_message() {
        let provider = LocalEchoProvider::new("echo");
        let messages = vec![ChatMessage { role: MessageRole::User, content: "hello there".to_string() }];
        let resp = provider.chat(&messages, &ChatOptions::default()).await.unwrap();
        assert_eq!(resp.content, "echo: hello there");
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert!(resp.usage.input_tokens > 0);
    }

    #[tokio::test]
    async fn local_echo_chat_with_tools_never_calls_a_tool() {
        let provider = LocalEchoProvider::new("echo");
        let messages = vec![ChatMessage { role: MessageRole::User, content: "hi".to_string() }];
        let resp = provider.chat_with_tools(&messages, &[], &ChatOptions::default()).await.unwrap();
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn retryable_errors_match_taxonomy() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(!ProviderError::Http { status: 400, body: String::new() }.is_retryable());
    }
}

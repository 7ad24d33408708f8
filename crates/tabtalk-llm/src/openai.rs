//! OpenAI-compatible chat-completion client
//!
//! Talks to any endpoint speaking the `/chat/completions` wire format
//! (OpenAI, SiliconFlow, DeepSeek, vLLM, ...). One POST per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use tabtalk_core::{Error, ProviderSettings, Result};

use crate::provider::CompletionProvider;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, TokenUsage, ToolCall};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(settings.api_key.clone(), settings.base_url.clone())
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::from_settings(&ProviderSettings::from_env()?))
    }

    /// Build the request body in the chat/completions wire format.
    fn build_body(&self, model: &str, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| t.to_openai_format())
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = request.tool_choice.to_api_format();
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }
}

/// Serialize one transcript message for the wire.
///
/// Assistant tool-call arguments go out re-serialized as a JSON string,
/// which is how the chat/completions format carries them.
fn message_to_wire(m: &ChatMessage) -> Value {
    let mut msg = json!({
        "role": m.role,
        "content": m.content
    });

    if let Some(ref id) = m.tool_call_id {
        msg["tool_call_id"] = json!(id);
    }

    if let Some(ref calls) = m.tool_calls {
        msg["tool_calls"] = json!(calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": serde_json::to_string(&tc.arguments).unwrap_or_default()
                    }
                })
            })
            .collect::<Vec<_>>());
    }

    msg
}

/// Parse the assistant message out of a completion response body.
fn parse_response(model: &str, response_json: &Value) -> Result<ChatResponse> {
    let choice = response_json
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| Error::malformed("no choices in response"))?;

    let message = choice
        .get("message")
        .ok_or_else(|| Error::malformed("no message in first choice"))?;

    let role = message
        .get("role")
        .and_then(|r| r.as_str())
        .unwrap_or("assistant")
        .to_string();

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());

    let tool_calls = match message.get("tool_calls").and_then(|tc| tc.as_array()) {
        Some(calls) => {
            let mut parsed = Vec::with_capacity(calls.len());
            for call in calls {
                parsed.push(parse_tool_call(call)?);
            }
            Some(parsed)
        }
        None => None,
    };

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .map(|s| s.to_string());

    let usage = response_json.get("usage").map(|u| TokenUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(ChatResponse {
        message: ChatMessage {
            role,
            content,
            tool_calls,
            tool_call_id: None,
        },
        model: model.to_string(),
        finish_reason,
        usage,
    })
}

/// Parse one wire tool call. Any missing field or unparseable arguments
/// payload fails the whole response.
fn parse_tool_call(call: &Value) -> Result<ToolCall> {
    let id = call
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::malformed("tool call without id"))?
        .to_string();

    let function = call
        .get("function")
        .ok_or_else(|| Error::malformed(format!("tool call {} without function", id)))?;

    let name = function
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::malformed(format!("tool call {} without name", id)))?
        .to_string();

    let args_str = function
        .get("arguments")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::malformed(format!("tool call {} without arguments", id)))?;

    let arguments: Value = serde_json::from_str(args_str).map_err(|e| {
        Error::malformed(format!("tool call {} arguments do not parse: {}", id, e))
    })?;

    Ok(ToolCall {
        id,
        name,
        arguments,
    })
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    async fn complete(&self, model: &str, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(model, &request);

        debug!(
            "Completion request to {} with {} messages, {} tools",
            url,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!(
            "Completion response ({}): {}",
            status,
            &response_text[..response_text.len().min(500)]
        );

        if !status.is_success() {
            return Err(Error::transport(status.as_u16(), response_text));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| Error::malformed(format!("response body is not JSON: {}", e)))?;

        parse_response(model, &response_json)
    }
}

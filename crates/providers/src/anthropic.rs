//! Anthropic Messages API adapter (§4.8).

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use orc_domain::capability::{LlmCapabilities, ToolSupport};
use orc_domain::config::llm::ProviderEntry;
use orc_domain::error::{Error, Result};
use orc_domain::stream::{BoxStream, StreamEvent, Usage};
use orc_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::Value;
use std::collections::HashMap;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderEntry) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?.ok_or_else(|| Error::ConfigurationError {
            missing: vec![format!("providers.entries[{}].auth", cfg.id)],
        })?;

        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-sonnet-4-5".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::StrictJson,
            supports_streaming: true,
            supports_attachments: true,
            supported_mime_types: vec![
                "image/png".into(),
                "image/jpeg".into(),
                "image/webp".into(),
            ],
            supports_image_generation: false,
            context_window_tokens: Some(200_000),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_messages_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let mut system_parts: Vec<String> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.extract_all_text()),
                Role::User => messages.push(user_msg_to_anthropic(msg)),
                Role::Assistant => messages.push(assistant_msg_to_anthropic(msg)),
                Role::Tool => messages.push(tool_result_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "stream": stream,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn user_msg_to_anthropic(msg: &Message) -> Value {
    serde_json::json!({
        "role": "user",
        "content": content_to_anthropic_parts(&msg.content),
    })
}

fn assistant_msg_to_anthropic(msg: &Message) -> Value {
    serde_json::json!({
        "role": "assistant",
        "content": content_to_anthropic_parts(&msg.content),
    })
}

fn tool_result_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            for part in parts {
                if let ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } = part
                {
                    return serde_json::json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": tool_use_id,
                            "content": content,
                            "is_error": is_error,
                        }]
                    });
                }
            }
            serde_json::json!({"role": "user", "content": []})
        }
        MessageContent::Text(t) => serde_json::json!({
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": "", "content": t}],
        }),
    }
}

fn content_to_anthropic_parts(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(t) => Value::String(t.clone()),
        MessageContent::Parts(parts) => {
            let out: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => {
                        Some(serde_json::json!({"type": "text", "text": text}))
                    }
                    ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input,
                    })),
                    ContentPart::Image { url, media_type } => Some(serde_json::json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": media_type.clone().unwrap_or_else(|| "image/png".into()),
                            "data": url,
                        }
                    })),
                    ContentPart::ToolResult { .. } => None,
                })
                .collect();
            Value::Array(out)
        }
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Non-streaming response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_response(body: &Value) -> Result<ChatResponse> {
    let content_blocks = body
        .get("content")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &content_blocks {
        match block.get("type").and_then(|v| v.as_str()) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                if let (Some(id), Some(name)) = (
                    block.get("id").and_then(|v| v.as_str()),
                    block.get("name").and_then(|v| v.as_str()),
                ) {
                    tool_calls.push(ToolCall {
                        call_id: id.to_string(),
                        tool_name: name.to_string(),
                        arguments: block.get("input").cloned().unwrap_or(Value::Null),
                    });
                }
            }
            _ => {}
        }
    }

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let finish_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(String::from);
    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse {
        content: text,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct StreamState {
    active_tool_calls: HashMap<u64, (String, String, String)>,
    usage: Option<Usage>,
}

fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };
    let event_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");

    match event_type {
        "message_start" => {
            if let Some(usage) = v
                .get("message")
                .and_then(|m| m.get("usage"))
                .and_then(parse_anthropic_usage)
            {
                state.usage = Some(usage);
            }
            Vec::new()
        }
        "content_block_start" => {
            let index = v.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            let block = v.get("content_block").unwrap_or(&Value::Null);
            if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                let id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                state
                    .active_tool_calls
                    .insert(index, (id.clone(), name.clone(), String::new()));
                return vec![Ok(StreamEvent::ToolCallStarted {
                    call_id: id,
                    tool_name: name,
                })];
            }
            Vec::new()
        }
        "content_block_delta" => {
            let index = v.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            let delta = v.get("delta").unwrap_or(&Value::Null);
            match delta.get("type").and_then(|t| t.as_str()) {
                Some("text_delta") => {
                    let text = delta.get("text").and_then(|v| v.as_str()).unwrap_or("");
                    if text.is_empty() {
                        Vec::new()
                    } else {
                        vec![Ok(StreamEvent::Token {
                            text: text.to_string(),
                        })]
                    }
                }
                Some("thinking_delta") => {
                    let text = delta.get("thinking").and_then(|v| v.as_str()).unwrap_or("");
                    if text.is_empty() {
                        Vec::new()
                    } else {
                        vec![Ok(StreamEvent::Thinking {
                            text: text.to_string(),
                        })]
                    }
                }
                Some("input_json_delta") => {
                    let partial = delta
                        .get("partial_json")
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    if let Some((id, _, buf)) = state.active_tool_calls.get_mut(&index) {
                        buf.push_str(partial);
                        vec![Ok(StreamEvent::ToolCallDelta {
                            call_id: id.clone(),
                            delta: partial.to_string(),
                        })]
                    } else {
                        Vec::new()
                    }
                }
                _ => Vec::new(),
            }
        }
        "content_block_stop" => {
            let index = v.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            if let Some((id, name, buf)) = state.active_tool_calls.remove(&index) {
                let arguments: Value =
                    serde_json::from_str(&buf).unwrap_or(Value::Object(Default::default()));
                return vec![Ok(StreamEvent::ToolCallFinished {
                    call_id: id,
                    tool_name: name,
                    arguments,
                })];
            }
            Vec::new()
        }
        "message_delta" => {
            if let Some(usage) = v.get("usage").and_then(parse_anthropic_usage) {
                state.usage = Some(usage);
            }
            Vec::new()
        }
        "message_stop" => vec![Ok(StreamEvent::Done {
            usage: state.usage.clone(),
            finish_reason: Some("stop".into()),
            cancelled: false,
        })],
        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown anthropic stream error")
                .to_string();
            vec![Ok(StreamEvent::Error { message })]
        }
        _ => Vec::new(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "anthropic chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::ProviderError {
                provider: self.id.clone(),
                status: status.as_u16(),
                detail: resp_text,
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "anthropic stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::ProviderError {
                provider: provider_id,
                status: status.as_u16(),
                detail,
            });
        }

        let mut state = StreamState::default();
        Ok(crate::sse::sse_response_stream(resp, move |data| {
            parse_anthropic_sse(data, &mut state)
        }))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

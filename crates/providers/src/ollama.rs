//! Ollama adapter (§4.8).
//!
//! Ollama's `/api/chat` speaks newline-delimited JSON, not SSE, and takes no
//! auth header — it is assumed to run on trusted localhost/LAN infrastructure.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::from_reqwest;
use orc_domain::capability::{LlmCapabilities, ToolSupport};
use orc_domain::config::llm::ProviderEntry;
use orc_domain::error::{Error, Result};
use orc_domain::stream::{BoxStream, StreamEvent, Usage};
use orc_domain::tool::{Message, Role, ToolDefinition};
use serde_json::Value;

pub struct OllamaProvider {
    id: String,
    base_url: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn from_config(cfg: &ProviderEntry) -> Result<Self> {
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "llama3.1".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::Basic,
            supports_streaming: true,
            supports_attachments: false,
            supported_mime_types: Vec::new(),
            supports_image_generation: false,
            context_window_tokens: None,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            default_model,
            capabilities,
            client,
        })
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_ollama).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_ollama).collect();
            body["tools"] = Value::Array(tools);
        }

        let mut options = serde_json::Map::new();
        if let Some(temp) = req.temperature {
            options.insert("temperature".into(), serde_json::json!(temp));
        }
        if let Some(max) = req.max_tokens {
            options.insert("num_predict".into(), serde_json::json!(max));
        }
        if !options.is_empty() {
            body["options"] = Value::Object(options);
        }
        body
    }
}

fn msg_to_ollama(msg: &Message) -> Value {
    serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content.extract_all_text(),
    })
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn tool_to_ollama(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_chat_response(provider: &str, body: &Value) -> Result<ChatResponse> {
    let message = body.get("message").ok_or_else(|| Error::ProviderError {
        provider: provider.into(),
        status: 200,
        detail: "no message in response".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let usage = parse_ollama_usage(body);

    Ok(ChatResponse {
        content,
        tool_calls: Vec::new(),
        usage,
        model,
        finish_reason: body
            .get("done_reason")
            .and_then(|v| v.as_str())
            .map(String::from),
    })
}

fn parse_ollama_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("prompt_eval_count")?.as_u64()? as u32;
    let completion = v.get("eval_count")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    })
}

/// Build the streaming event(s) for a single NDJSON line from `/api/chat`.
fn parse_ndjson_line(line: &str) -> Vec<Result<StreamEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let v: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if v.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        return vec![Ok(StreamEvent::Done {
            usage: parse_ollama_usage(&v),
            finish_reason: v
                .get("done_reason")
                .and_then(|r| r.as_str())
                .map(String::from)
                .or_else(|| Some("stop".into())),
            cancelled: false,
        })];
    }

    let text = v
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("");
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Ok(StreamEvent::Token {
            text: text.to_string(),
        })]
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "ollama chat request");

        let resp = self
            .client
            .post(&url)
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
        parse_chat_response(&self.id, &resp_json)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_body(req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "ollama stream request");

        let resp = self
            .client
            .post(&url)
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

        let stream = async_stream::stream! {
            let mut response = resp;
            let mut buffer = String::new();
            let mut done_emitted = false;

            loop {
                match response.chunk().await {
                    Ok(Some(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(pos) = buffer.find('\n') {
                            let line: String = buffer.drain(..=pos).collect();
                            for event in parse_ndjson_line(&line) {
                                if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                    done_emitted = true;
                                }
                                yield event;
                            }
                        }
                    }
                    Ok(None) => {
                        if !buffer.trim().is_empty() {
                            for event in parse_ndjson_line(&buffer) {
                                if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                    done_emitted = true;
                                }
                                yield event;
                            }
                        }
                        break;
                    }
                    Err(e) => {
                        yield Err(from_reqwest(e));
                        break;
                    }
                }
            }

            if !done_emitted {
                yield Ok(StreamEvent::Done {
                    usage: None,
                    finish_reason: Some("stop".into()),
                    cancelled: false,
                });
            }
        };

        Ok(Box::pin(stream))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

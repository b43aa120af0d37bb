use std::time::Duration;

use serde_json::{Value, json};

use crate::message::{ChatMessage, ChatRole, ToolCall, ToolCallFunction};
use crate::usage::Usage;

/// The normalized result of one provider call. A populated `error` means
/// the call failed in a way the caller should surface as text rather than
/// propagate — network failure, non-2xx status, or a response shape we
/// couldn't parse — matching the "errors are returned as strings" contract.
pub(crate) struct ProviderReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: String,
    pub usage: Option<Usage>,
    pub generation_id: Option<String>,
    pub error: Option<String>,
}

impl ProviderReply {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![],
            finish_reason: "error".to_string(),
            usage: None,
            generation_id: None,
            error: Some(message.into()),
        }
    }
}

/// Talks to the vendor-native Messages API (Anthropic shape).
pub(crate) struct VendorClient {
    http: reqwest::Client,
}

impl VendorClient {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { http: reqwest::Client::builder().timeout(timeout).build().unwrap_or_default() }
    }

    pub(crate) async fn complete(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        tools: Option<&Value>,
    ) -> ProviderReply {
        let endpoint = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        let mut payload = json!({
            "model": model,
            "max_tokens": max_tokens,
            "system": system_prompt,
            "messages": messages_to_vendor(messages),
        });
        if let Some(tools) = tools {
            payload["tools"] = tools.clone();
        }

        let response = self
            .http
            .post(endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => return ProviderReply::failed(format!("vendor request failed: {error}")),
        };

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => return ProviderReply::failed(format!("vendor response unparsable: {error}")),
        };

        if !status.is_success() {
            return ProviderReply::failed(format!("vendor error ({status}): {body}"));
        }

        parse_vendor_response(&body)
    }
}

fn messages_to_vendor(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| message.role != ChatRole::System)
        .map(|message| {
            json!({
                "role": if message.role == ChatRole::Assistant { "assistant" } else { "user" },
                "content": message.content.clone().unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_vendor_response(body: &Value) -> ProviderReply {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    let arguments = block.get("input").cloned().unwrap_or(json!({}));
                    tool_calls.push(ToolCall { id, r#type: "function".to_string(), function: ToolCallFunction { name, arguments } });
                }
                _ => {}
            }
        }
    }

    let finish_reason = body.get("stop_reason").and_then(Value::as_str).unwrap_or("stop").to_string();
    let usage = body.get("usage").and_then(Usage::from_provider_json);
    let generation_id = body.get("id").and_then(Value::as_str).map(ToString::to_string);

    ProviderReply { content, tool_calls, finish_reason, usage, generation_id, error: None }
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint (the shape
/// OpenRouter and similar proxies expose).
pub(crate) struct ProxyClient {
    http: reqwest::Client,
}

impl ProxyClient {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { http: reqwest::Client::builder().timeout(timeout).build().unwrap_or_default() }
    }

    pub(crate) async fn complete(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        tools: Option<&Value>,
    ) -> ProviderReply {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let mut full_messages = vec![json!({ "role": "system", "content": system_prompt })];
        full_messages.extend(messages_to_openai(messages));

        let mut payload = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": full_messages,
        });
        if let Some(tools) = tools {
            payload["tools"] = tools.clone();
        }

        let response = self.http.post(endpoint).bearer_auth(api_key).json(&payload).send().await;

        let response = match response {
            Ok(response) => response,
            Err(error) => return ProviderReply::failed(format!("proxy request failed: {error}")),
        };

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => return ProviderReply::failed(format!("proxy response unparsable: {error}")),
        };

        if !status.is_success() {
            return ProviderReply::failed(format!("proxy error ({status}): {body}"));
        }

        parse_proxy_response(&body)
    }
}

fn messages_to_openai(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let role = match message.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::Tool => "tool",
            };
            let mut entry = json!({ "role": role, "content": message.content.clone() });
            if let Some(tool_call_id) = &message.tool_call_id {
                entry["tool_call_id"] = json!(tool_call_id);
            }
            if !message.tool_calls.is_empty() {
                entry["tool_calls"] = json!(
                    message
                        .tool_calls
                        .iter()
                        .map(|call| json!({
                            "id": call.id,
                            "type": call.r#type,
                            "function": { "name": call.function.name, "arguments": call.function.arguments.to_string() },
                        }))
                        .collect::<Vec<_>>()
                );
            }
            entry
        })
        .collect()
}

fn parse_proxy_response(body: &Value) -> ProviderReply {
    let choice = body.get("choices").and_then(|choices| choices.get(0));
    let Some(choice) = choice else {
        return ProviderReply::failed(format!("proxy response missing choices: {body}"));
    };
    let message = choice.get("message");

    let content = message
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .and_then(|message| message.get("tool_calls"))
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let function = call.get("function")?;
                    let name = function.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    let arguments = function
                        .get("arguments")
                        .and_then(Value::as_str)
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or(json!({}));
                    Some(ToolCall { id, r#type: "function".to_string(), function: ToolCallFunction { name, arguments } })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = choice.get("finish_reason").and_then(Value::as_str).unwrap_or("stop").to_string();
    let usage = body.get("usage").and_then(Usage::from_provider_json);
    let generation_id = body.get("id").and_then(Value::as_str).map(ToString::to_string);

    ProviderReply { content, tool_calls, finish_reason, usage, generation_id, error: None }
}

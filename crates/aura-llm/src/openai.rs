use async_trait::async_trait;
use aura_core::{AuraError, Message, Result, Role, ToolCall};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::provider::*;

/// OpenAI-compatible chat completions provider (DeepSeek, OpenAI, vLLM, ...).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    /// Create a provider for the given base URL, e.g. "https://api.deepseek.com".
    pub fn new(api_key: String, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuraError::LlmConnection(format!("failed to build http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let provider_name = provider_name_for(&base_url);
        Ok(Self {
            client,
            api_key,
            base_url,
            provider_name,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = encode_request(request);
        debug!(
            provider = %self.provider_name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0);
            return Err(AuraError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuraError::LlmStatus {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = resp.json().await.map_err(classify_transport_error)?;
        decode_response(&data)
    }
}

/// Label a provider by its host so logs say "deepseek" rather than a URL.
fn provider_name_for(base_url: &str) -> String {
    if base_url.contains("deepseek") {
        "deepseek".into()
    } else if base_url.contains("openai.com") {
        "openai".into()
    } else {
        "openai-compatible".into()
    }
}

fn classify_transport_error(e: reqwest::Error) -> AuraError {
    if e.is_timeout() {
        AuraError::LlmTimeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        AuraError::LlmConnection(e.to_string())
    } else {
        AuraError::LlmProvider(e.to_string())
    }
}

/// Serialize one conversation message into the wire format.
pub(crate) fn encode_message(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({ "role": "system", "content": msg.text() }),
        Role::User => json!({ "role": "user", "content": msg.text() }),
        Role::Assistant if msg.tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": msg.text() })
        }
        Role::Assistant => {
            // Arguments go back byte-for-byte as the model produced them.
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": tc.arguments },
                    })
                })
                .collect();
            json!({
                "role": "assistant",
                "content": msg.content.as_deref().map_or(Value::Null, |t| json!(t)),
                "tool_calls": calls,
            })
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
            "content": msg.text(),
        }),
    }
}

pub(crate) fn encode_request(request: &LlmRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(encode_message).collect();
    let mut body = json!({
        "model": &request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
        body["tool_choice"] = json!(request.tool_choice);
    }
    body
}

/// Decode a chat completion body into a [`Completion`].
pub(crate) fn decode_response(data: &Value) -> Result<LlmResponse> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| AuraError::LlmProvider(format!("response has no choices: {data}")))?;
    let message = &choice["message"];

    let text = message["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    Some(ToolCall::new(
                        c["id"].as_str()?,
                        c["function"]["name"].as_str()?,
                        c["function"]["arguments"].as_str().unwrap_or_default(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    let completion = if calls.is_empty() {
        Completion::Text(text.unwrap_or_default())
    } else {
        Completion::ToolCalls { text, calls }
    };

    let usage = &data["usage"];
    Ok(LlmResponse {
        completion,
        usage: Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        },
        finish_reason: choice["finish_reason"].as_str().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_core::ToolSchema;

    #[test]
    fn test_decode_text_response() {
        let data = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hi there" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });
        let resp = decode_response(&data).unwrap();
        assert_eq!(resp.completion, Completion::Text("Hi there".into()));
        assert_eq!(resp.usage.total_tokens(), 15);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_decode_keeps_raw_arguments() {
        // Truncated JSON must survive decoding untouched.
        let data = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_a",
                        "type": "function",
                        "function": { "name": "open_app", "arguments": "{\"name\": \"calc" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let resp = decode_response(&data).unwrap();
        match resp.completion {
            Completion::ToolCalls { text, calls } => {
                assert!(text.is_none());
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "open_app");
                assert_eq!(calls[0].arguments, "{\"name\": \"calc");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_without_choices_is_error() {
        let err = decode_response(&json!({ "error": "boom" })).unwrap_err();
        assert!(matches!(err, AuraError::LlmProvider(_)));
    }

    #[test]
    fn test_encode_tool_round() {
        let call = ToolCall::new("c1", "search", r#"{"q":"x"}"#);
        let request = LlmRequest {
            model: "deepseek-chat".into(),
            messages: vec![
                Message::system("sys"),
                Message::user("find x"),
                Message::assistant_tool_calls(None, vec![call]),
                Message::tool_result("c1", "found"),
            ],
            tools: vec![ToolSchema::new("search", "Search", json!({"type": "object"}))],
            tool_choice: ToolChoice::Auto,
            temperature: 0.8,
            max_tokens: 256,
        };
        let body = encode_request(&request);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[2]["content"], Value::Null);
        assert_eq!(msgs[2]["tool_calls"][0]["function"]["arguments"], r#"{"q":"x"}"#);
        assert_eq!(msgs[3]["role"], "tool");
        assert_eq!(msgs[3]["tool_call_id"], "c1");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "search");
    }

    #[test]
    fn test_plain_request_has_no_tools() {
        let request = LlmRequest::plain("m", vec![Message::user("hi")], 0.1);
        let body = encode_request(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(provider_name_for("https://api.deepseek.com"), "deepseek");
        assert_eq!(provider_name_for("https://api.openai.com/v1"), "openai");
        assert_eq!(provider_name_for("http://localhost:8000/v1"), "openai-compatible");
    }
}

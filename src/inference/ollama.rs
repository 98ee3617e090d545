//! Ollama Inference Client
//!
//! Wraps Ollama's /api/chat endpoint (non-streaming) with function-style tool
//! calling. The conversation's turns map onto chat messages; requested tool
//! calls come back as structured function invocations with object arguments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::types::{ModelClient, ModelReply, Role, ToolCallRequest, ToolSchemaDef, Turn};

pub struct OllamaClient {
    base_url: String,
    model: String,
    http: Client,
}

impl OllamaClient {
    /// * `base_url` - e.g. `http://127.0.0.1:11434`.
    /// * `model` - model identifier, e.g. `qwen2.5:latest`.
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn infer(
        &self,
        conversation: &[Turn],
        tools: &[ToolSchemaDef],
    ) -> Result<ModelReply> {
        let messages: Vec<Value> = conversation.iter().map(format_message).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        if !tools.is_empty() {
            let tool_defs: Vec<Value> = tools
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
            body["tools"] = Value::Array(tool_defs);
        }

        let url = format!("{}/api/chat", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("inference request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("inference error: {}: {}", status.as_u16(), text);
        }

        let data: Value = resp
            .json()
            .await
            .context("failed to parse inference response")?;

        let message = &data["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| {
                        let function = &call["function"];
                        let arguments = parse_arguments(&function["arguments"]);
                        ToolCallRequest::new(
                            function["name"].as_str().unwrap_or("").to_string(),
                            arguments,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ModelReply {
            content,
            tool_calls,
        })
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

/// Ollama sends arguments as a JSON object; some OpenAI-compatible proxies
/// send a JSON-encoded string instead. Accept both.
fn parse_arguments(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map.clone(),
        Value::String(s) => serde_json::from_str::<Value>(s)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default(),
        _ => Map::new(),
    }
}

/// Format one conversation turn as an /api/chat message.
fn format_message(turn: &Turn) -> Value {
    let role = match turn.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::ToolResult => "tool",
    };

    let mut message = json!({
        "role": role,
        "content": turn.content,
    });

    if !turn.tool_calls.is_empty() {
        let calls: Vec<Value> = turn
            .tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments,
                    }
                })
            })
            .collect();
        message["tool_calls"] = Value::Array(calls);
    }

    if let Some(ref id) = turn.tool_call_id {
        message["tool_call_id"] = json!(id);
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_turn_roles() {
        assert_eq!(format_message(&Turn::system("s"))["role"], "system");
        assert_eq!(format_message(&Turn::user("u"))["role"], "user");
        assert_eq!(
            format_message(&Turn::tool_result("{}", "tc_1"))["role"],
            "tool"
        );
    }

    #[test]
    fn test_format_assistant_with_tool_calls() {
        let mut args = Map::new();
        args.insert("symbol".to_string(), json!("BTC/USD"));
        let turn = Turn::assistant("buying", vec![ToolCallRequest::new("place_crypto_order", args)]);
        let message = format_message(&turn);
        assert_eq!(message["role"], "assistant");
        assert_eq!(
            message["tool_calls"][0]["function"]["name"],
            "place_crypto_order"
        );
        assert_eq!(
            message["tool_calls"][0]["function"]["arguments"]["symbol"],
            "BTC/USD"
        );
    }

    #[test]
    fn test_parse_arguments_object_and_string() {
        let from_object = parse_arguments(&json!({"a": 1}));
        assert_eq!(from_object["a"], 1);

        let from_string = parse_arguments(&json!("{\"a\": 2}"));
        assert_eq!(from_string["a"], 2);

        assert!(parse_arguments(&json!(null)).is_empty());
        assert!(parse_arguments(&json!("not json")).is_empty());
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let message = format_message(&Turn::tool_result("{\"ok\":true}", "tc_42"));
        assert_eq!(message["tool_call_id"], "tc_42");
    }
}

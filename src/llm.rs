//! LLM provider abstraction: builds HTTP requests and normalizes responses
//! for both Anthropic and OpenAI-compatible APIs.

use serde::Serialize;
use serde_json::Value;

use crate::settings::{LlmProvider, LlmProviderConfig};

/// Resolved provider details ready for making an API call.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub provider: LlmProvider,
}

impl ResolvedProvider {
    /// Resolve a provider config into concrete URL / key / model values.
    ///
    /// # Errors
    /// Returns an error string if the API key is missing.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, String> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or("No API key configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY.")?
            .to_string();

        match config.provider {
            LlmProvider::Anthropic => Ok(Self {
                url: "https://api.anthropic.com/v1/messages".to_string(),
                api_key,
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
                provider: LlmProvider::Anthropic,
            }),
            LlmProvider::OpenAiCompatible => {
                let base = config
                    .base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1");
                let base = base.trim_end_matches('/');
                Ok(Self {
                    url: format!("{base}/chat/completions"),
                    api_key,
                    model: config
                        .model
                        .clone()
                        .unwrap_or_else(|| "gpt-4o".to_string()),
                    provider: LlmProvider::OpenAiCompatible,
                })
            }
        }
    }
}

// ── Normalized reply ─────────────────────────────────────────────

/// Argument payload of a tool call. OpenAI sends arguments as a JSON string
/// that may fail to parse; that failure is kept instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolArguments {
    Parsed { value: Value },
    Malformed { raw: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Provider-independent view of one model reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

/// Build an HTTP request for the resolved provider: one user turn, the
/// system prompt and the tool list (Anthropic-shaped, converted as needed).
pub fn build_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    system_prompt: &str,
    utterance: &str,
    tools: &Value,
    max_tokens: u32,
) -> reqwest::RequestBuilder {
    match provider.provider {
        LlmProvider::Anthropic => {
            build_anthropic_request(client, provider, system_prompt, utterance, tools, max_tokens)
        }
        LlmProvider::OpenAiCompatible => {
            build_openai_request(client, provider, system_prompt, utterance, tools, max_tokens)
        }
    }
}

/// Parse the provider's HTTP response JSON into a [`ModelReply`].
///
/// # Errors
/// Returns an error string when the response has no usable message.
pub fn parse_response(provider: LlmProvider, json: &Value) -> Result<ModelReply, String> {
    match provider {
        LlmProvider::Anthropic => parse_anthropic_response(json),
        LlmProvider::OpenAiCompatible => parse_openai_response(json),
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

// ── Anthropic ────────────────────────────────────────────────────

fn build_anthropic_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    system_prompt: &str,
    utterance: &str,
    tools: &Value,
    max_tokens: u32,
) -> reqwest::RequestBuilder {
    let body = serde_json::json!({
        "model": provider.model,
        "max_tokens": max_tokens,
        "system": system_prompt,
        "tools": tools,
        "messages": [{ "role": "user", "content": utterance }],
    });

    client
        .post(&provider.url)
        .header("x-api-key", &provider.api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&body)
}

fn parse_anthropic_response(json: &Value) -> Result<ModelReply, String> {
    let blocks = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or("No content in Anthropic response")?;

    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => text_parts.push(str_field(block, "text")),
            Some("tool_use") => tool_calls.push(ToolCall {
                id: str_field(block, "id").to_string(),
                name: str_field(block, "name").to_string(),
                arguments: ToolArguments::Parsed {
                    value: block.get("input").cloned().unwrap_or(Value::Null),
                },
            }),
            _ => {}
        }
    }

    let usage = json.get("usage").map(|u| Usage {
        input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
    });

    Ok(ModelReply {
        text: non_empty(text_parts.join("\n")),
        tool_calls,
        usage,
    })
}

// ── OpenAI-compatible ────────────────────────────────────────────

fn build_openai_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    system_prompt: &str,
    utterance: &str,
    tools: &Value,
    max_tokens: u32,
) -> reqwest::RequestBuilder {
    // Convert Anthropic tool definitions to OpenAI format
    let oai_tools: Vec<Value> = tools
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": str_field(tool, "name"),
                            "description": str_field(tool, "description"),
                            "parameters": tool.get("input_schema").unwrap_or(&Value::Null),
                        }
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let body = serde_json::json!({
        "model": provider.model,
        "max_tokens": max_tokens,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": utterance },
        ],
        "tools": oai_tools,
        "tool_choice": "auto",
    });

    client
        .post(&provider.url)
        .header("Authorization", format!("Bearer {}", provider.api_key))
        .header("content-type", "application/json")
        .json(&body)
}

fn parse_openai_response(json: &Value) -> Result<ModelReply, String> {
    let choice = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or("No choices in OpenAI response")?;

    let message = choice
        .get("message")
        .ok_or("No message in OpenAI choice")?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .and_then(|t| non_empty(t.to_string()));

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|tc| {
                    let func = tc.get("function").unwrap_or(&Value::Null);
                    let raw = func.get("arguments");
                    let arguments = match raw {
                        // Some compatible servers send an object instead of a string.
                        Some(v @ Value::Object(_)) => ToolArguments::Parsed { value: v.clone() },
                        Some(Value::String(s)) if s.trim().is_empty() => ToolArguments::Parsed {
                            value: Value::Object(serde_json::Map::new()),
                        },
                        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                            Ok(value) => ToolArguments::Parsed { value },
                            Err(e) => ToolArguments::Malformed {
                                raw: s.clone(),
                                error: e.to_string(),
                            },
                        },
                        _ => ToolArguments::Parsed {
                            value: Value::Object(serde_json::Map::new()),
                        },
                    };
                    ToolCall {
                        id: str_field(tc, "id").to_string(),
                        name: str_field(func, "name").to_string(),
                        arguments,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = json.get("usage").map(|u| Usage {
        input_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
    });

    Ok(ModelReply {
        text,
        tool_calls,
        usage,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_openai_base_url() {
        let config = LlmProviderConfig {
            provider: LlmProvider::OpenAiCompatible,
            api_key: Some("k".into()),
            base_url: Some("http://localhost:11434/v1/".into()),
            model: None,
        };
        let resolved = ResolvedProvider::from_config(&config).unwrap();
        assert_eq!(resolved.url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(resolved.model, "gpt-4o");
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(ResolvedProvider::from_config(&LlmProviderConfig::default()).is_err());
    }

    #[test]
    fn openai_reply_with_tool_calls() {
        let reply = parse_response(
            LlmProvider::OpenAiCompatible,
            &json!({
                "choices": [{
                    "finish_reason": "tool_calls",
                    "message": {
                        "content": null,
                        "tool_calls": [
                            {"id": "c1", "type": "function", "function": {"name": "zoom", "arguments": "{\"level\":\"week\"}"}},
                            {"id": "c2", "type": "function", "function": {"name": "add_task", "arguments": "{\"text\": "}}
                        ]
                    }
                }],
                "usage": {"prompt_tokens": 120, "completion_tokens": 9}
            }),
        )
        .unwrap();
        assert!(reply.text.is_none());
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(
            reply.tool_calls[0].arguments,
            ToolArguments::Parsed { value: json!({"level": "week"}) }
        );
        assert!(matches!(reply.tool_calls[1].arguments, ToolArguments::Malformed { .. }));
        assert_eq!(reply.usage.unwrap().input_tokens, 120);
    }

    #[test]
    fn openai_text_only_reply() {
        let reply = parse_response(
            LlmProvider::OpenAiCompatible,
            &json!({"choices": [{"message": {"content": "  Which task?  "}}]}),
        )
        .unwrap();
        assert_eq!(reply.text.as_deref(), Some("Which task?"));
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn openai_without_choices_is_an_error() {
        assert!(parse_response(LlmProvider::OpenAiCompatible, &json!({"error": "x"})).is_err());
    }

    #[test]
    fn anthropic_reply() {
        let reply = parse_response(
            LlmProvider::Anthropic,
            &json!({
                "content": [
                    {"type": "text", "text": "Zooming out."},
                    {"type": "tool_use", "id": "t1", "name": "zoom", "input": {"level": "month"}}
                ],
                "usage": {"input_tokens": 50, "output_tokens": 12}
            }),
        )
        .unwrap();
        assert_eq!(reply.text.as_deref(), Some("Zooming out."));
        assert_eq!(reply.tool_calls[0].name, "zoom");
        assert_eq!(reply.usage, Some(Usage { input_tokens: 50, output_tokens: 12 }));
    }
}

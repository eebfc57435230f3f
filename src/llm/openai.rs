//! OpenAI-compatible chat client
//!
//! Async HTTP client for `/chat/completions` endpoints (OVHcloud AI Endpoints,
//! vLLM, OpenAI itself) with tool calling and image inputs.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::{AtelierError, Config, ImageAttachment, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
use crate::llm::truncate_for_log;

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Message in wire format
#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: WireContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Plain text, or text plus images for vision models
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Tool call format, shared by requests and responses
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function in a tool call; arguments travel as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl OpenAiClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.endpoints.model_url,
            &config.endpoints.access_token,
            Duration::from_secs(config.http.timeout_secs),
        )
    }

    /// Create a client with a custom base URL
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AtelierError::provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Inline an image as a base64 data URL
    fn data_url(image: &ImageAttachment) -> String {
        let encoded = BASE64.encode(&image.data);
        format!("data:{};base64,{}", image.content_type, encoded)
    }

    /// Convert internal Message to wire format
    fn to_wire_message(msg: &Message) -> WireMessage {
        let content = if msg.images.is_empty() {
            WireContent::Text(msg.content.clone())
        } else {
            let mut parts = vec![ContentPart::Text {
                text: msg.content.clone(),
            }];
            parts.extend(msg.images.iter().map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: Self::data_url(image),
                },
            }));
            WireContent::Parts(parts)
        };

        WireMessage {
            role: msg.role.clone(),
            content,
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| WireToolCall {
                        id: tc.id.clone(),
                        call_type: function_type(),
                        function: WireFunction {
                            name: tc.name.clone(),
                            arguments: serde_json::Value::String(tc.arguments.to_string()),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    /// Decode tool call arguments, which most servers send as a JSON string
    fn decode_arguments(raw: serde_json::Value) -> serde_json::Value {
        match raw {
            serde_json::Value::String(s) if s.trim().is_empty() => serde_json::json!({}),
            serde_json::Value::String(s) => {
                serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        }
    }

    /// Convert wire response to LLMResponse
    fn to_llm_response(response: ChatResponse) -> Result<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AtelierError::provider("Response contained no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: Self::decode_arguments(tc.function.arguments),
            })
            .collect();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
            model: response.model,
        })
    }

    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let options = options.unwrap_or_default();
        let request = ChatRequest {
            model,
            messages: messages.iter().map(Self::to_wire_message).collect(),
            tools,
            temperature: options.temperature,
        };

        let request_json = serde_json::to_string(&request)?;
        debug!(model, request = %truncate_for_log(&request_json, 500), "chat request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AtelierError::provider(format!(
                        "Cannot connect to chat API at {}",
                        self.base_url
                    ))
                } else if e.is_timeout() {
                    AtelierError::provider(format!("Chat API request timed out: {}", e))
                } else {
                    AtelierError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AtelierError::provider(format!(
                "Chat API error ({}): {}",
                status, error_text
            )));
        }

        let response_text = response.text().await?;
        debug!(response = %truncate_for_log(&response_text, 500), "chat response");

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| AtelierError::provider(format!("Failed to parse response: {}", e)))?;

        let response = Self::to_llm_response(chat_response)?;
        if let Some(ref usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "token usage"
            );
        }
        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.send(model, messages, None, options).await
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.send(model, messages, Some(tools), options).await
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let timeout = Duration::from_secs(5);
        let client = OpenAiClient::new("https://llm.example.com/v1/", "key", timeout).unwrap();
        assert_eq!(client.base_url, "https://llm.example.com/v1");
    }

    #[test]
    fn test_text_message_conversion() {
        let msg = Message::user("Hello");
        let wire = serde_json::to_value(OpenAiClient::to_wire_message(&msg)).unwrap();
        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"], "Hello");
        assert!(wire.get("tool_calls").is_none());
    }

    #[test]
    fn test_image_message_conversion() {
        let msg = Message::user("Critique this")
            .with_image(ImageAttachment::new("image/jpeg", vec![0xFF, 0xD8, 0xFF]));
        let wire = serde_json::to_value(OpenAiClient::to_wire_message(&msg)).unwrap();
        let parts = wire["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "Critique this");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn test_tool_call_arguments_round_trip_as_string() {
        let call = ToolCall::new("call_1", "critique", serde_json::json!({"a": 1}));
        let msg = Message::assistant_tool_calls("", vec![call]);
        let wire = serde_json::to_value(OpenAiClient::to_wire_message(&msg)).unwrap();
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "model": "Mistral-Small",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "refine_prompt", "arguments": "{\"feedback\": \"more red\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let response = OpenAiClient::to_llm_response(parsed).unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_9");
        assert_eq!(
            response.tool_calls[0].get_string("feedback").as_deref(),
            Some("more red")
        );
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_empty_choices_is_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(OpenAiClient::to_llm_response(parsed).is_err());
    }

    #[test]
    fn test_decode_arguments() {
        assert_eq!(
            OpenAiClient::decode_arguments(serde_json::json!("")),
            serde_json::json!({})
        );
        assert_eq!(
            OpenAiClient::decode_arguments(serde_json::json!({"x": 1})),
            serde_json::json!({"x": 1})
        );
        assert_eq!(
            OpenAiClient::decode_arguments(serde_json::json!("{oops")),
            serde_json::json!("{oops")
        );
    }
}

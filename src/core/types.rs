//! Shared types used across Atelier modules
//!
//! Contains message structures, tool definitions, and the data passed
//! between the composer, renderer and critic.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Images attached to the message (vision models only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
    /// Optional tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the tool call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            images: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    /// Create an assistant message that carries tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::with_role("assistant", content)
        }
    }

    /// Create a tool result message answering `call_id`
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role("tool", content)
        }
    }

    /// Attach an image to this message
    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }
}

/// Raw image data sent alongside a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
    /// Raw bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            data,
        }
    }
}

/// A tool call made by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, echoed back in the tool result
    #[serde(default)]
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Positive and negative prompt submitted to the image model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub prompt: String,
    #[serde(rename = "negativePrompt", alias = "negative_prompt")]
    pub negative_prompt: String,
}

impl PromptPair {
    pub fn new(prompt: impl Into<String>, negative_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
        }
    }
}

/// Image produced by one render call
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Raw image bytes, never empty
    pub bytes: Vec<u8>,
    /// MIME type reported by the endpoint
    pub content_type: String,
    /// Where the bytes were written, if anywhere
    pub path: Option<PathBuf>,
}

impl RenderedImage {
    /// View the image as a message attachment
    pub fn attachment(&self) -> ImageAttachment {
        ImageAttachment::new(self.content_type.clone(), self.bytes.clone())
    }
}

/// Score and feedback for one rendered image
///
/// The score is always within `[0.0, 1.0]`; use [`Critique::new`] to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Critique {
    score: f64,
    feedback: String,
}

impl Critique {
    /// Build a critique, rejecting scores outside the unit interval
    pub fn new(score: f64, feedback: impl Into<String>) -> Option<Self> {
        if score.is_finite() && (0.0..=1.0).contains(&score) {
            Some(Self {
                score,
                feedback: feedback.into(),
            })
        } else {
            None
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }
}

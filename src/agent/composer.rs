//! Prompt composer agent
//!
//! Turns a user request, plus the critic's last feedback, into an SDXL
//! prompt pair.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::json;
use crate::core::{AtelierError, Message, PromptPair, Result};
use crate::llm::{GenerateOptions, LLMProvider};

/// Feedback passed on the first iteration
pub const FIRST_ITERATION_FEEDBACK: &str = "No previous feedback - this is the first iteration.";

const SYSTEM_PROMPT: &str = r#"You are an expert prompt engineer for Stable Diffusion XL.
Your job is to create or refine a detailed prompt and negative prompt for image generation.
When given feedback from a critic, incorporate that feedback to improve the prompts.
Respond with ONLY a JSON object (no markdown, no code fences) in this exact format:
{"prompt": "detailed SDXL prompt here", "negativePrompt": "negative prompt here"}
The prompt should be highly detailed with style, lighting and quality keywords.
The negative prompt should exclude common artifacts and unwanted elements."#;

/// Creates or refines SDXL prompts
#[derive(Clone)]
pub struct PromptComposer {
    llm: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
}

impl PromptComposer {
    /// Tool name used by the supervisor
    pub const TOOL_NAME: &'static str = "refine_prompt";

    pub fn new(llm: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: 0.0,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Compose a prompt pair for `user_request`, refined by `prior_feedback`
    pub async fn compose(&self, user_request: &str, prior_feedback: &str) -> Result<PromptPair> {
        info!(model = %self.model, "invoking prompt composer");

        let messages = Self::build_messages(user_request, prior_feedback);
        let response = self
            .llm
            .chat(
                &self.model,
                &messages,
                Some(GenerateOptions::with_temperature(self.temperature)),
            )
            .await?;

        let prompts = Self::parse_reply(&response.content)?;
        debug!(
            prompt = %prompts.prompt,
            negative_prompt = %prompts.negative_prompt,
            "composed prompts"
        );
        Ok(prompts)
    }

    /// Build the system and user messages for one composition
    pub fn build_messages(user_request: &str, prior_feedback: &str) -> Vec<Message> {
        let user = format!(
            "User request: \"{}\"\nPrevious critic feedback: \"{}\"\n\
             Create optimized Stable Diffusion XL prompts for this request.",
            user_request, prior_feedback
        );
        vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
    }

    /// Parse the model reply into a prompt pair
    pub fn parse_reply(text: &str) -> Result<PromptPair> {
        let map = json::parse_object(text).ok_or_else(|| {
            AtelierError::composition(format!("reply is not a JSON object: {}", text.trim()))
        })?;

        let field = |names: &[&str]| -> Result<String> {
            names
                .iter()
                .find_map(|name| map.get(*name).and_then(|v| v.as_str()))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    AtelierError::composition(format!("missing or empty field '{}'", names[0]))
                })
        };

        Ok(PromptPair {
            prompt: field(&["prompt"])?,
            negative_prompt: field(&["negativePrompt", "negative_prompt"])?,
        })
    }
}

//! Vision critic agent
//!
//! Scores a rendered image against the original request with a vision model.
//! A reply that cannot be turned into a valid [`Critique`] is not an error
//! here: it comes back as [`CritiqueOutcome::Unusable`] and the orchestrator
//! decides what to do with it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::json;
use crate::core::{AtelierError, Critique, Message, RenderedImage, Result};
use crate::llm::{GenerateOptions, LLMProvider};

const SYSTEM_PROMPT: &str = r#"You are an expert image critic with deep knowledge of visual composition, aesthetics, and prompt adherence.
You will receive an image and the original user request.
Analyze how well the generated image matches the user's request.
Respond with ONLY a JSON object (no markdown, no code fences) in this exact format (values are examples, not fixed):
{"score": 0.5, "feedback": "what to improve"}
The score must be between 0.0 (terrible match) and 1.0 (perfect match).
Be constructive in your feedback - explain what should be improved for the next iteration."#;

/// Result of one critique call
#[derive(Debug, Clone, PartialEq)]
pub enum CritiqueOutcome {
    /// A well-formed critique with an in-range score
    Scored(Critique),
    /// The model answered but the answer is not a usable critique
    Unusable {
        reason: String,
        /// Feedback text, when it could still be extracted
        feedback: Option<String>,
    },
}

impl CritiqueOutcome {
    pub fn critique(&self) -> Option<&Critique> {
        match self {
            CritiqueOutcome::Scored(critique) => Some(critique),
            CritiqueOutcome::Unusable { .. } => None,
        }
    }
}

/// Critiques rendered images
#[derive(Clone)]
pub struct ImageCritic {
    llm: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
}

impl ImageCritic {
    /// Tool name used by the supervisor
    pub const TOOL_NAME: &'static str = "critique";

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

    /// Critique `image` against `user_request`
    ///
    /// Fails only when the vision model cannot be reached.
    pub async fn critique(
        &self,
        user_request: &str,
        image: &RenderedImage,
    ) -> Result<CritiqueOutcome> {
        info!(model = %self.model, "invoking vision critic");

        let messages = Self::build_messages(user_request, image);
        let response = self
            .llm
            .chat(
                &self.model,
                &messages,
                Some(GenerateOptions::with_temperature(self.temperature)),
            )
            .await
            .map_err(|e| AtelierError::CritiqueUnavailable(e.to_string()))?;

        debug!(reply = %response.content, "critic reply");
        Ok(Self::parse_reply(&response.content))
    }

    /// Build the system and user messages, with the image attached
    pub fn build_messages(user_request: &str, image: &RenderedImage) -> Vec<Message> {
        let user = format!(
            "Original user request: \"{}\"\n\
             Please critique this image and provide a score and feedback.",
            user_request
        );
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(user).with_image(image.attachment()),
        ]
    }

    /// Classify a model reply
    pub fn parse_reply(text: &str) -> CritiqueOutcome {
        match Self::parse_critique(text) {
            Ok(critique) => CritiqueOutcome::Scored(critique),
            Err(err) => CritiqueOutcome::Unusable {
                reason: err.to_string(),
                feedback: Self::extract_feedback(text),
            },
        }
    }

    /// Strict parse; any defect is `CritiqueUnparseable`
    pub fn parse_critique(text: &str) -> Result<Critique> {
        let unparseable = |msg: String| AtelierError::CritiqueUnparseable(msg);

        let map = json::parse_object(text)
            .ok_or_else(|| unparseable(format!("reply is not a JSON object: {}", text.trim())))?;

        let score = match map.get("score") {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| unparseable("score is missing or not a number".to_string()))?;

        let feedback = map
            .get("feedback")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Critique::new(score, feedback)
            .ok_or_else(|| unparseable(format!("score {} is outside [0.0, 1.0]", score)))
    }

    fn extract_feedback(text: &str) -> Option<String> {
        json::parse_object(text)?
            .get("feedback")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

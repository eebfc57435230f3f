//! Supervisor orchestrator
//!
//! An LLM planner picks the next agent call. Each step is one planner call
//! followed by the agent calls it proposed, run one at a time, with their
//! results returned to the planner as tool messages. Every agent call counts
//! against a single invocation budget shared by all three agents.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::agent::composer::PromptComposer;
use crate::agent::critic::{CritiqueOutcome, ImageCritic};
use crate::agent::loop_state::{LoopState, RunOutcome, StopReason};
use crate::agent::orchestrator::{report_outcome, Agents};
use crate::agent::renderer::ImageRenderer;
use crate::core::{Config, Message, PromptPair, Result, ToolCall, ToolDefinition};
use crate::llm::{GenerateOptions, LLMProvider, OpenAiClient};

/// Arguments of `refine_prompt`; omitted fields come from the loop state
#[derive(Debug, Default, Deserialize)]
struct RefineArgs {
    user_request: Option<String>,
    feedback: Option<String>,
}

/// Arguments of `generate_image`; omitted prompts reuse the latest composition
#[derive(Debug, Default, Deserialize)]
struct GenerateArgs {
    prompt: Option<String>,
    #[serde(alias = "negativePrompt")]
    negative_prompt: Option<String>,
}

/// LLM-driven orchestration over the same three agents
pub struct Supervisor {
    agents: Agents,
    planner: Arc<dyn LLMProvider>,
    planner_model: String,
    temperature: f32,
    threshold: f64,
    max_iterations: usize,
    max_invocations: usize,
}

impl Supervisor {
    /// Create a supervisor with the default threshold (0.8), iteration
    /// target (3) and invocation budget (10)
    pub fn new(
        agents: Agents,
        planner: Arc<dyn LLMProvider>,
        planner_model: impl Into<String>,
    ) -> Self {
        Self {
            agents,
            planner,
            planner_model: planner_model.into(),
            temperature: 0.0,
            threshold: 0.8,
            max_iterations: 3,
            max_invocations: 10,
        }
    }

    /// Create a supervisor from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let planner: Arc<dyn LLMProvider> = Arc::new(OpenAiClient::from_config(config)?);
        let supervisor = Self::new(Agents::from_config(config)?, planner, &config.models.text)
            .with_temperature(config.models.temperature)
            .with_threshold(config.refinement.threshold)
            .with_max_iterations(config.refinement.max_iterations)
            .with_max_invocations(config.refinement.max_invocations);
        Ok(supervisor)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the agent invocation budget, all agents combined
    pub fn with_max_invocations(mut self, max_invocations: usize) -> Self {
        self.max_invocations = max_invocations;
        self
    }

    /// Tools offered to the planner
    pub fn tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                PromptComposer::TOOL_NAME,
                "Creates or refines Stable Diffusion XL prompts from the user request and optional critic feedback",
                json!({
                    "type": "object",
                    "properties": {
                        "user_request": {
                            "type": "string",
                            "description": "The user's image request (defaults to the original request)"
                        },
                        "feedback": {
                            "type": "string",
                            "description": "Critic feedback to incorporate (defaults to the latest feedback)"
                        }
                    }
                }),
            ),
            ToolDefinition::function(
                ImageRenderer::TOOL_NAME,
                "Generates an image with Stable Diffusion XL. Uses the latest refined prompts unless prompts are given. The image is stored for the critic.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": "Positive SDXL prompt"
                        },
                        "negative_prompt": {
                            "type": "string",
                            "description": "Negative SDXL prompt"
                        }
                    }
                }),
            ),
            ToolDefinition::function(
                ImageCritic::TOOL_NAME,
                "Critiques the latest generated image against the user request and returns a score between 0.0 and 1.0 with feedback",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
        ]
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You are an image generation supervisor. Your goal is to produce the best possible image matching the user's request.
Follow this workflow:
1. Call `{refine}` to create optimized SDXL prompts from the user's request.
2. Call `{generate}` to generate the image from those prompts.
3. Call `{critique}` to evaluate how well the image matches the request.
4. If the critic's score is below {threshold:.2}, call `{refine}` again with the critic's feedback, then `{generate}`, then `{critique}`.
5. Repeat until the score is at least {threshold:.2} or you have completed {iterations} full iterations (refine + generate + critique).
6. Then stop calling tools and reply with a short summary of the process including the final score.
Call one tool at a time."#,
            refine = PromptComposer::TOOL_NAME,
            generate = ImageRenderer::TOOL_NAME,
            critique = ImageCritic::TOOL_NAME,
            threshold = self.threshold,
            iterations = self.max_iterations,
        )
    }

    /// Run the supervisor for `user_request`
    pub async fn run(&self, user_request: &str) -> Result<RunOutcome> {
        let mut state = LoopState::new(user_request, self.max_iterations, self.threshold);
        let tools = Self::tool_definitions();
        let mut messages = vec![
            Message::system(self.system_prompt()),
            Message::user(user_request),
        ];

        println!(
            "\n[Supervisor] Starting (max {} agent invocations, threshold {:.2})",
            self.max_invocations, self.threshold
        );

        let mut invocations = 0;
        let mut summary = None;
        let mut stop = StopReason::InvocationsExhausted;

        // Every step either ends the run or spends at least one invocation
        let max_steps = self.max_invocations.saturating_add(1);
        for step in 1..=max_steps {
            debug!(step, invocations, "planner step");
            let response = self
                .planner
                .chat_with_tools(
                    &self.planner_model,
                    &messages,
                    &tools,
                    Some(GenerateOptions::with_temperature(self.temperature)),
                )
                .await?;

            if response.tool_calls.is_empty() {
                info!(step, "planner finished");
                summary = Some(response.content);
                stop = StopReason::PlannerFinished;
                break;
            }

            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                if invocations >= self.max_invocations {
                    warn!(tool = %call.name, "invocation budget spent, dropping tool call");
                    break;
                }
                invocations += 1;
                println!(
                    "\n[Supervisor {}/{}] Invoking {}...",
                    invocations, self.max_invocations, call.name
                );

                let result = self.execute(call, &mut state).await?;
                messages.push(Message::tool(&call.id, result));

                if state.threshold_met() {
                    stop = StopReason::ThresholdMet;
                    break;
                }
            }

            if stop == StopReason::ThresholdMet || invocations >= self.max_invocations {
                break;
            }
        }

        println!(
            "\n[Supervisor] Complete ({} invocations, {} iterations, {})",
            invocations, state.iteration, stop
        );

        let mut outcome = RunOutcome::from_state(state, stop);
        outcome.summary = summary.filter(|s| !s.trim().is_empty());
        Ok(outcome)
    }

    /// Run one tool call; misuse is reported back to the planner, agent
    /// failures abort the run
    async fn execute(&self, call: &ToolCall, state: &mut LoopState) -> Result<String> {
        match call.name.as_str() {
            PromptComposer::TOOL_NAME => {
                let args: RefineArgs = match Self::parse_args(call) {
                    Ok(args) => args,
                    Err(message) => return Ok(message),
                };
                let request = args
                    .user_request
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| state.user_request.clone());
                let feedback = args
                    .feedback
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| state.prior_feedback.clone());

                let prompts = self.agents.composer.compose(&request, &feedback).await?;
                let result = json!({
                    "prompt": prompts.prompt,
                    "negative_prompt": prompts.negative_prompt,
                });
                state.record_prompts(prompts);
                Ok(result.to_string())
            }

            ImageRenderer::TOOL_NAME => {
                let args: GenerateArgs = match Self::parse_args(call) {
                    Ok(args) => args,
                    Err(message) => return Ok(message),
                };
                let prompts = match (args.prompt, args.negative_prompt) {
                    (Some(prompt), Some(negative))
                        if !prompt.trim().is_empty() && !negative.trim().is_empty() =>
                    {
                        let prompts = PromptPair::new(prompt.trim(), negative.trim());
                        state.record_prompts(prompts.clone());
                        prompts
                    }
                    _ => match &state.prompts {
                        Some(prompts) => prompts.clone(),
                        None => {
                            return Ok(Self::tool_error(format!(
                                "no prompts available yet, call {} first",
                                PromptComposer::TOOL_NAME
                            )))
                        }
                    },
                };

                let image = self.agents.renderer.render(&prompts).await?;
                let location = image
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let result = json!({
                    "status": "image generated and stored for the critic",
                    "path": location,
                    "bytes": image.bytes.len(),
                });
                state.record_image(image);
                Ok(result.to_string())
            }

            ImageCritic::TOOL_NAME => {
                let Some(image) = state.image.as_ref() else {
                    return Ok(Self::tool_error(format!(
                        "no image to critique yet, call {} first",
                        ImageRenderer::TOOL_NAME
                    )));
                };

                let outcome = self
                    .agents
                    .critic
                    .critique(&state.user_request, image)
                    .await?;
                report_outcome(state.iteration + 1, &outcome);

                let mut result = match &outcome {
                    CritiqueOutcome::Scored(critique) => json!({
                        "score": critique.score(),
                        "feedback": critique.feedback(),
                    }),
                    CritiqueOutcome::Unusable { reason, feedback } => json!({
                        "error": format!("could not parse critique: {}", reason),
                        "feedback": feedback,
                    }),
                };
                state.complete_iteration(outcome);

                if state.iterations_exhausted() && !state.threshold_met() {
                    let note = format!(
                        "{} full iterations completed, stop and summarize",
                        state.max_iterations
                    );
                    result["note"] = json!(note);
                }
                Ok(result.to_string())
            }

            other => {
                warn!(tool = %other, "planner called an unknown tool");
                Ok(Self::tool_error(format!(
                    "unknown tool '{}', available tools: {}, {}, {}",
                    other,
                    PromptComposer::TOOL_NAME,
                    ImageRenderer::TOOL_NAME,
                    ImageCritic::TOOL_NAME
                )))
            }
        }
    }

    fn parse_args<T: for<'de> Deserialize<'de> + Default>(
        call: &ToolCall,
    ) -> std::result::Result<T, String> {
        if call.arguments.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(call.arguments.clone()).map_err(|e| {
            warn!(tool = %call.name, error = %e, "invalid tool arguments");
            Self::tool_error(format!("invalid arguments for {}: {}", call.name, e))
        })
    }

    fn tool_error(message: String) -> String {
        json!({ "error": message }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definitions() {
        let tools = Supervisor::tool_definitions();
        let names: Vec<_> = tools.iter().map(|t| t.function.name.as_str()).collect();
        assert_eq!(names, vec!["refine_prompt", "generate_image", "critique"]);
        assert!(tools.iter().all(|t| t.tool_type == "function"));
    }

    #[test]
    fn test_args_accept_camel_case_prompt() {
        let call = ToolCall::new(
            "c1",
            "generate_image",
            json!({"prompt": "a cat", "negativePrompt": "dogs"}),
        );
        let args: GenerateArgs = Supervisor::parse_args(&call).unwrap();
        assert_eq!(args.negative_prompt.as_deref(), Some("dogs"));
    }

    #[test]
    fn test_bad_args_become_tool_error() {
        let call = ToolCall::new("c1", "refine_prompt", json!("{not json"));
        let err = Supervisor::parse_args::<RefineArgs>(&call).unwrap_err();
        assert!(err.contains("invalid arguments for refine_prompt"));
    }
}

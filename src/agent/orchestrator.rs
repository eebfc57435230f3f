//! Fixed-schedule orchestrator
//!
//! Runs compose → render → critique in a cycle, feeding the critic's feedback
//! into the next composition, until a critique meets the score threshold or
//! the iteration budget is spent.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::composer::PromptComposer;
use crate::agent::critic::{CritiqueOutcome, ImageCritic};
use crate::agent::loop_state::{LoopState, RunOutcome, StopReason};
use crate::agent::renderer::ImageRenderer;
use crate::core::{Config, Result};
use crate::image::SdxlClient;
use crate::llm::{LLMProvider, OpenAiClient};

/// The three agents both strategies drive
#[derive(Clone)]
pub struct Agents {
    pub composer: PromptComposer,
    pub renderer: ImageRenderer,
    pub critic: ImageCritic,
}

impl Agents {
    pub fn new(composer: PromptComposer, renderer: ImageRenderer, critic: ImageCritic) -> Self {
        Self {
            composer,
            renderer,
            critic,
        }
    }

    /// Wire the agents to the configured endpoints
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm: Arc<dyn LLMProvider> = Arc::new(OpenAiClient::from_config(config)?);
        let images = Arc::new(SdxlClient::from_config(config)?);

        Ok(Self {
            composer: PromptComposer::new(llm.clone(), &config.models.text)
                .with_temperature(config.models.temperature),
            renderer: ImageRenderer::new(images, &config.output.image_path),
            critic: ImageCritic::new(llm, &config.models.vision)
                .with_temperature(config.models.temperature),
        })
    }
}

/// Fixed-schedule refinement loop
pub struct Orchestrator {
    agents: Agents,
    threshold: f64,
    max_iterations: usize,
}

impl Orchestrator {
    /// Create an orchestrator with the default threshold (0.8) and budget (3)
    pub fn new(agents: Agents) -> Self {
        Self {
            agents,
            threshold: 0.8,
            max_iterations: 3,
        }
    }

    /// Create an orchestrator from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Agents::from_config(config)?)
            .with_threshold(config.refinement.threshold)
            .with_max_iterations(config.refinement.max_iterations))
    }

    /// Set the score threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run the loop for `user_request`
    ///
    /// Composition, render and unreachable-critic failures abort the run;
    /// an unusable critique only means another iteration.
    pub async fn run(&self, user_request: &str) -> Result<RunOutcome> {
        let mut state = LoopState::new(user_request, self.max_iterations, self.threshold);

        println!(
            "\n[Atelier] Starting refinement loop (max {} iterations, threshold {:.2})",
            state.max_iterations, state.threshold
        );

        while state.should_continue() {
            let iteration = state.iteration + 1;
            info!(iteration, feedback = %state.prior_feedback, "starting iteration");

            println!(
                "\n[Iteration {}/{}] Invoking prompt composer...",
                iteration, state.max_iterations
            );
            let prompts = self
                .agents
                .composer
                .compose(&state.user_request, &state.prior_feedback)
                .await?;
            state.record_prompts(prompts.clone());

            println!("[Iteration {}] Generating image...", iteration);
            let image = self.agents.renderer.render(&prompts).await?;

            println!("[Iteration {}] Invoking vision critic...", iteration);
            let outcome = self
                .agents
                .critic
                .critique(&state.user_request, &image)
                .await?;
            report_outcome(iteration, &outcome);

            state.record_image(image);
            state.complete_iteration(outcome);
        }

        let stop = if state.threshold_met() {
            StopReason::ThresholdMet
        } else {
            StopReason::IterationsExhausted
        };

        println!(
            "\n[Atelier] Loop complete ({} iterations, {})",
            state.iteration, stop
        );

        Ok(RunOutcome::from_state(state, stop))
    }
}

/// Print and log one critique so low scores and unusable replies stay distinct
pub(crate) fn report_outcome(iteration: usize, outcome: &CritiqueOutcome) {
    match outcome {
        CritiqueOutcome::Scored(critique) => {
            info!(iteration, score = critique.score(), "critique received");
        }
        CritiqueOutcome::Unusable { reason, feedback } => {
            warn!(
                iteration,
                reason = %reason,
                has_feedback = feedback.is_some(),
                "could not parse critique, continuing loop"
            );
        }
    }
    println!("{}", describe_outcome(outcome));
}

/// Console text for one critique
pub(crate) fn describe_outcome(outcome: &CritiqueOutcome) -> String {
    match outcome {
        CritiqueOutcome::Scored(critique) => {
            let score = critique.score();
            let feedback = critique.feedback();
            format!("  Critic score: {score:.2}\n  Feedback: {feedback}")
        }
        CritiqueOutcome::Unusable { reason, .. } => {
            format!("  Could not parse critic score, continuing loop ({reason})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Critique;

    #[test]
    fn test_low_score_and_unusable_read_differently() {
        let low = CritiqueOutcome::Scored(Critique::new(0.3, "needs more red").unwrap());
        let low = describe_outcome(&low);
        assert_eq!(low, "  Critic score: 0.30\n  Feedback: needs more red");

        let unusable = CritiqueOutcome::Unusable {
            reason: "score is missing".to_string(),
            feedback: None,
        };
        let unusable = describe_outcome(&unusable);
        assert!(unusable.starts_with("  Could not parse critic score"));
        assert!(unusable.contains("score is missing"));
        assert!(!unusable.contains("Critic score:"));
    }
}

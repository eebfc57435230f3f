//! Refinement loop state management
//!
//! Tracks what each iteration produced and the feedback carried into the
//! next composition. Owned by whichever strategy is running.

use std::path::PathBuf;

use crate::agent::composer::FIRST_ITERATION_FEEDBACK;
use crate::agent::critic::CritiqueOutcome;
use crate::core::{Critique, PromptPair, RenderedImage};

/// Feedback used after a critique that yielded nothing usable
pub const NO_NEW_FEEDBACK: &str =
    "No usable feedback from the previous critique - refine the prompts from the user request again.";

/// State of the refinement loop
#[derive(Debug, Clone)]
pub struct LoopState {
    /// The request being illustrated
    pub user_request: String,
    /// Completed iterations (one per critique)
    pub iteration: usize,
    /// Maximum allowed iterations
    pub max_iterations: usize,
    /// Score at or above which the run succeeds
    pub threshold: f64,
    /// Feedback for the next composition
    pub prior_feedback: String,
    /// Latest composed prompts
    pub prompts: Option<PromptPair>,
    /// Latest rendered image
    pub image: Option<RenderedImage>,
    /// Latest usable critique
    pub critique: Option<Critique>,
    /// One record per completed iteration
    pub history: Vec<IterationRecord>,
}

/// What one iteration produced
#[derive(Debug, Clone)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: usize,
    pub prompts: Option<PromptPair>,
    pub outcome: CritiqueOutcome,
}

impl LoopState {
    /// Create a new loop state
    pub fn new(user_request: impl Into<String>, max_iterations: usize, threshold: f64) -> Self {
        Self {
            user_request: user_request.into(),
            iteration: 0,
            max_iterations,
            threshold,
            prior_feedback: FIRST_ITERATION_FEEDBACK.to_string(),
            prompts: None,
            image: None,
            critique: None,
            history: Vec::new(),
        }
    }

    /// Whether the latest iteration met the threshold
    pub fn threshold_met(&self) -> bool {
        self.history
            .last()
            .and_then(|record| record.outcome.critique())
            .is_some_and(|critique| critique.score() >= self.threshold)
    }

    /// Whether the iteration budget is spent
    pub fn iterations_exhausted(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        !self.iterations_exhausted() && !self.threshold_met()
    }

    /// Store freshly composed prompts
    pub fn record_prompts(&mut self, prompts: PromptPair) {
        self.prompts = Some(prompts);
    }

    /// Store a freshly rendered image
    pub fn record_image(&mut self, image: RenderedImage) {
        self.image = Some(image);
    }

    /// Close the current iteration with its critique
    ///
    /// A usable critique's feedback becomes the next `prior_feedback`
    /// verbatim; otherwise any extracted feedback, or [`NO_NEW_FEEDBACK`].
    pub fn complete_iteration(&mut self, outcome: CritiqueOutcome) {
        match &outcome {
            CritiqueOutcome::Scored(critique) => {
                self.prior_feedback = critique.feedback().to_string();
                self.critique = Some(critique.clone());
            }
            CritiqueOutcome::Unusable { feedback, .. } => {
                self.prior_feedback = feedback
                    .clone()
                    .unwrap_or_else(|| NO_NEW_FEEDBACK.to_string());
            }
        }

        self.iteration += 1;
        self.history.push(IterationRecord {
            iteration: self.iteration,
            prompts: self.prompts.clone(),
            outcome,
        });
    }

    /// Path of the latest rendered image
    pub fn image_path(&self) -> Option<PathBuf> {
        self.image.as_ref().and_then(|image| image.path.clone())
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A critique met the score threshold
    ThresholdMet,
    /// The fixed schedule ran all its iterations
    IterationsExhausted,
    /// The supervisor spent its agent invocation budget
    InvocationsExhausted,
    /// The supervisor planner chose to stop
    PlannerFinished,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ThresholdMet => write!(f, "score threshold met"),
            StopReason::IterationsExhausted => write!(f, "iteration budget exhausted"),
            StopReason::InvocationsExhausted => write!(f, "invocation budget exhausted"),
            StopReason::PlannerFinished => write!(f, "supervisor finished"),
        }
    }
}

/// Terminal report of a run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stop: StopReason,
    /// Completed iterations
    pub iterations: usize,
    /// Last usable critique, if any
    pub final_critique: Option<Critique>,
    /// Where the last image was written
    pub final_image: Option<PathBuf>,
    /// Supervisor summary, when the planner produced one
    pub summary: Option<String>,
    pub history: Vec<IterationRecord>,
}

impl RunOutcome {
    /// Build the report from the final loop state
    pub fn from_state(state: LoopState, stop: StopReason) -> Self {
        let final_image = state.image_path();
        Self {
            stop,
            iterations: state.iteration,
            final_critique: state.critique,
            final_image,
            summary: None,
            history: state.history,
        }
    }

    /// Whether the run ended because the threshold was met
    pub fn succeeded(&self) -> bool {
        self.stop == StopReason::ThresholdMet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(score: f64, feedback: &str) -> CritiqueOutcome {
        CritiqueOutcome::Scored(Critique::new(score, feedback).unwrap())
    }

    #[test]
    fn test_loop_state_new() {
        let state = LoopState::new("a cat", 3, 0.8);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.prior_feedback, FIRST_ITERATION_FEEDBACK);
        assert!(state.history.is_empty());
        assert!(state.should_continue());
    }

    #[test]
    fn test_should_continue_until_budget() {
        let mut state = LoopState::new("a cat", 2, 0.8);
        state.complete_iteration(scored(0.1, "a"));
        assert!(state.should_continue());
        state.complete_iteration(scored(0.2, "b"));
        assert!(!state.should_continue());
        assert!(state.iterations_exhausted());
        assert!(!state.threshold_met());
    }

    #[test]
    fn test_threshold_stops() {
        let mut state = LoopState::new("a cat", 3, 0.8);
        state.complete_iteration(scored(0.8, "good"));
        assert!(state.threshold_met());
        assert!(!state.should_continue());
    }

    #[test]
    fn test_feedback_propagation() {
        let mut state = LoopState::new("a cat", 5, 0.8);
        state.complete_iteration(scored(0.3, "make it red"));
        assert_eq!(state.prior_feedback, "make it red");

        state.complete_iteration(CritiqueOutcome::Unusable {
            reason: "bad".into(),
            feedback: None,
        });
        assert_eq!(state.prior_feedback, NO_NEW_FEEDBACK);
        // The last usable critique is kept
        assert_eq!(state.critique.as_ref().unwrap().feedback(), "make it red");

        state.complete_iteration(CritiqueOutcome::Unusable {
            reason: "range".into(),
            feedback: Some("add whiskers".into()),
        });
        assert_eq!(state.prior_feedback, "add whiskers");
        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history[2].iteration, 3);
    }

    #[test]
    fn test_unusable_critique_never_meets_threshold() {
        let mut state = LoopState::new("a cat", 3, 0.0);
        state.complete_iteration(CritiqueOutcome::Unusable {
            reason: "bad".into(),
            feedback: None,
        });
        assert!(!state.threshold_met());
    }
}

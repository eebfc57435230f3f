//! Agent module - the three agents and the strategies that drive them
//!
//! The composer, renderer and critic each wrap one external call; the
//! orchestrator and supervisor own the loop state and decide what runs next.

pub mod composer;
pub mod critic;
pub mod json;
pub mod loop_state;
pub mod orchestrator;
pub mod renderer;
pub mod supervisor;

pub use composer::{PromptComposer, FIRST_ITERATION_FEEDBACK};
pub use critic::{CritiqueOutcome, ImageCritic};
pub use loop_state::{IterationRecord, LoopState, RunOutcome, StopReason, NO_NEW_FEEDBACK};
pub use orchestrator::{Agents, Orchestrator};
pub use renderer::ImageRenderer;
pub use supervisor::Supervisor;

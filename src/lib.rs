//! Atelier - iterative image generation with an LLM critic
//!
//! Turns a free-text request into an image by looping a prompt composer,
//! an SDXL renderer and a vision critic until the critic is satisfied or a
//! budget runs out.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Chat provider abstraction with an OpenAI-compatible client
//! - **Image**: Text-to-image backend abstraction with the SDXL client
//! - **Agent**: The three agents, the fixed-schedule loop and the supervisor
//! - **CLI**: Console session
//!
//! # Usage
//!
//! ```rust,no_run
//! use atelier::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> atelier::Result<()> {
//!     let config = Config::load()?;
//!     let outcome = Orchestrator::from_config(&config)?
//!         .run("a red cat sleeping on a windowsill")
//!         .await?;
//!     println!("{:?}", outcome.final_critique);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod image;
pub mod llm;

// Re-export commonly used items
pub use agent::{Orchestrator, RunOutcome, StopReason, Supervisor};
pub use cli::Console;
pub use core::{AtelierError, Config, Result, Strategy};

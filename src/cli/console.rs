//! Console front end
//!
//! Reads one image description, runs the configured strategy and prints the
//! outcome.

use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::warn;
use url::Url;

use crate::agent::{Orchestrator, RunOutcome, Supervisor};
use crate::core::{AtelierError, Config, Result, Strategy};

/// Single-shot console session
pub struct Console {
    config: Config,
}

impl Console {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run one generation; `prompt` skips the stdin read
    pub async fn run(&self, prompt: Option<String>) -> Result<RunOutcome> {
        self.print_banner();

        let request = match prompt {
            Some(prompt) if !prompt.trim().is_empty() => prompt.trim().to_string(),
            Some(_) => return Err(AtelierError::config("--prompt must not be empty")),
            None => {
                let stdin = io::stdin();
                let mut stdout = io::stdout();
                Self::read_request(&mut stdin.lock(), &mut stdout)?
            }
        };

        let outcome = match self.config.refinement.strategy {
            Strategy::Loop => {
                println!("Starting agentic image generation loop...");
                Orchestrator::from_config(&self.config)?.run(&request).await?
            }
            Strategy::Supervisor => {
                println!("Starting supervisor-based image generation...");
                Supervisor::from_config(&self.config)?.run(&request).await?
            }
        };

        println!("\n{}", Self::format_outcome(&outcome));

        if self.config.output.open_result {
            if let Some(ref path) = outcome.final_image {
                Self::open_image(path);
            }
        }

        Ok(outcome)
    }

    /// Prompt for and read the image description
    pub fn read_request<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String> {
        writeln!(output, "Enter your image description:")?;
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        let request = line.trim();
        if request.is_empty() {
            return Err(AtelierError::config("No image description given"));
        }
        Ok(request.to_string())
    }

    /// Render the terminal outcome for the console
    pub fn format_outcome(outcome: &RunOutcome) -> String {
        let mut output = String::new();
        let mark = if outcome.succeeded() { "done" } else { "stopped" };
        output.push_str(&format!(
            "Generation {}: {} after {} iteration(s)\n",
            mark, outcome.stop, outcome.iterations
        ));

        match &outcome.final_critique {
            Some(critique) => {
                output.push_str(&format!("Final score: {:.2}\n", critique.score()));
                output.push_str(&format!("Final feedback: {}\n", critique.feedback()));
            }
            None => output.push_str("Final score: none (no usable critique)\n"),
        }

        let final_prompts = outcome
            .history
            .last()
            .and_then(|record| record.prompts.as_ref());
        if let Some(prompts) = final_prompts {
            output.push_str(&format!("Final prompt: {}\n", prompts.prompt));
            output.push_str(&format!("Negative prompt: {}\n", prompts.negative_prompt));
        }

        if let Some(ref path) = outcome.final_image {
            output.push_str(&format!("Image: {}\n", path.display()));
        }

        if let Some(ref summary) = outcome.summary {
            output.push_str(&format!("Result: {}\n", summary.trim()));
        }

        output
    }

    fn open_image(path: &Path) {
        let url = path
            .canonicalize()
            .ok()
            .and_then(|absolute| Url::from_file_path(absolute).ok());

        match url {
            Some(url) => {
                if webbrowser::open(url.as_str()).is_err() {
                    warn!(path = %path.display(), "could not open image viewer");
                    println!("Please open the image manually: {}", path.display());
                }
            }
            None => warn!(path = %path.display(), "image path cannot be opened"),
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = &self.config;
        println!("Atelier - iterative image generation");
        println!("Strategy:     {}", config.refinement.strategy);
        println!("Text model:   {}", config.models.text);
        println!("Vision model: {}", config.models.vision);
        println!(
            "Threshold:    {:.2} (max {} iterations)",
            config.refinement.threshold, config.refinement.max_iterations
        );
        println!("Output:       {}", config.output.image_path.display());
        println!("─────────────────────────────────────────────");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{CritiqueOutcome, IterationRecord, StopReason};
    use crate::core::{Critique, PromptPair};
    use std::io::Cursor;
    use std::path::PathBuf;

    #[test]
    fn test_read_request() {
        let mut input = Cursor::new("  a red cat on a sofa \n");
        let mut output = Vec::new();
        let request = Console::read_request(&mut input, &mut output).unwrap();
        assert_eq!(request, "a red cat on a sofa");
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Enter your image description"));
    }

    #[test]
    fn test_read_empty_request() {
        let mut input = Cursor::new("\n");
        let mut output = Vec::new();
        assert!(matches!(
            Console::read_request(&mut input, &mut output),
            Err(AtelierError::Config(_))
        ));
    }

    #[test]
    fn test_format_outcome() {
        let critique = Critique::new(0.9, "lovely").unwrap();
        let outcome = RunOutcome {
            stop: StopReason::ThresholdMet,
            iterations: 2,
            final_critique: Some(critique.clone()),
            final_image: Some(PathBuf::from("generated-image.jpeg")),
            summary: None,
            history: vec![IterationRecord {
                iteration: 2,
                prompts: Some(PromptPair::new("a red cat, oil painting", "blurry")),
                outcome: CritiqueOutcome::Scored(critique),
            }],
        };
        let text = Console::format_outcome(&outcome);
        assert!(text.contains("Generation done: score threshold met after 2 iteration(s)"));
        assert!(text.contains("Final score: 0.90"));
        assert!(text.contains("Final prompt: a red cat, oil painting"));
        assert!(text.contains("Negative prompt: blurry"));
        assert!(text.contains("generated-image.jpeg"));
    }

    #[test]
    fn test_format_outcome_without_critique() {
        let outcome = RunOutcome {
            stop: StopReason::IterationsExhausted,
            iterations: 3,
            final_critique: None,
            final_image: None,
            summary: Some("tried hard".into()),
            history: Vec::new(),
        };
        let text = Console::format_outcome(&outcome);
        assert!(text.contains("stopped"));
        assert!(text.contains("no usable critique"));
        assert!(text.contains("Result: tried hard"));
    }
}

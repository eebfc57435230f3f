//! Atelier - iterative image generation with an LLM critic
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use atelier::{Config, Console, Strategy};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Atelier - iterative image generation with an LLM critic
#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Orchestration strategy
    #[arg(long, short = 's', value_enum)]
    strategy: Option<Strategy>,

    /// Score at or above which the run stops
    #[arg(long, short = 't')]
    threshold: Option<f64>,

    /// Maximum compose/render/critique iterations
    #[arg(long, short = 'n')]
    max_iterations: Option<usize>,

    /// Maximum agent invocations for the supervisor strategy
    #[arg(long)]
    max_invocations: Option<usize>,

    /// Where to write the generated image
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Image description (skips the interactive prompt)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Open the final image in the system viewer
    #[arg(long)]
    open: bool,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    /// Print the default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.debug);

    if args.print_config {
        println!("# {}", Config::config_file().display());
        println!("{}", Config::default_config_toml());
        return Ok(());
    }

    // Build configuration
    let mut config = Config::load()?;

    apply_overrides(&mut config, &args);

    config.validate()?;

    Console::new(config).run(args.prompt.clone()).await?;

    Ok(())
}

/// Apply CLI overrides on top of file and environment settings
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(strategy) = args.strategy {
        config.refinement.strategy = strategy;
    }
    if let Some(threshold) = args.threshold {
        config.refinement.threshold = threshold;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.refinement.max_iterations = max_iterations;
    }
    if let Some(max_invocations) = args.max_invocations {
        config.refinement.max_invocations = max_invocations;
    }
    if let Some(ref output) = args.output {
        config.output.image_path = output.clone();
    }
    if args.open {
        config.output.open_result = true;
    }
}

/// Log to stderr, honoring RUST_LOG
fn init_logging(debug: bool) {
    let default_level = if debug { "atelier=debug" } else { "atelier=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "atelier",
            "--strategy",
            "supervisor",
            "-t",
            "0.7",
            "--max-invocations",
            "6",
            "-o",
            "out/cat.jpeg",
            "--open",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.refinement.strategy, Strategy::Supervisor);
        assert_eq!(config.refinement.threshold, 0.7);
        assert_eq!(config.refinement.max_iterations, 3);
        assert_eq!(config.refinement.max_invocations, 6);
        assert_eq!(config.output.image_path, PathBuf::from("out/cat.jpeg"));
        assert!(config.output.open_result);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["atelier"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.refinement.strategy, Strategy::Loop);
        assert!(!config.output.open_result);
    }

    #[test]
    fn test_flags_repair_file_settings() {
        let file = "[refinement]\nthreshold = 1.5\nmax_iterations = 0\n";
        let mut config = Config::from_toml(file).unwrap();
        config
            .apply_env(|key| match key {
                "ATELIER_STRATEGY" | "ATELIER_THRESHOLD" | "ATELIER_MAX_ITERATIONS" => None,
                url if url.ends_with("_URL") => Some("https://ai.example.net/v1".to_string()),
                _ => Some("configured".to_string()),
            })
            .unwrap();
        assert!(config.validate().is_err());

        // Flags land before validation, so the run can still start
        let args = Args::parse_from(["atelier", "-t", "0.7", "-n", "2"]);
        apply_overrides(&mut config, &args);
        assert!(config.validate().is_ok());
        assert_eq!(config.refinement.threshold, 0.7);
        assert_eq!(config.refinement.max_iterations, 2);
    }
}

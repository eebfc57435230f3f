//! Configuration management for Atelier
//!
//! Supports a config file, environment variables, and runtime overrides.
//! Endpoint URLs, model names and the access token come from the environment;
//! loop tuning may also live in the config file.
//!
//! Config file location: ~/.config/atelier/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use url::Url;

use crate::core::error::{AtelierError, Result};

/// Bearer token shared by the chat and image endpoints
pub const ENV_ACCESS_TOKEN: &str = "OVH_AI_ENDPOINTS_ACCESS_TOKEN";
/// Base URL of the OpenAI-compatible chat API
pub const ENV_MODEL_URL: &str = "OVH_AI_ENDPOINTS_MODEL_URL";
/// Model used for prompt refinement and supervision
pub const ENV_MODEL_NAME: &str = "OVH_AI_ENDPOINTS_MODEL_NAME";
/// Vision model used by the critic
pub const ENV_VISION_MODEL: &str = "OVH_AI_ENDPOINTS_VLLM_MODEL";
/// Stable Diffusion XL endpoint
pub const ENV_IMAGE_URL: &str = "OVH_AI_ENDPOINTS_SD_URL";

const ENV_STRATEGY: &str = "ATELIER_STRATEGY";
const ENV_THRESHOLD: &str = "ATELIER_THRESHOLD";
const ENV_MAX_ITERATIONS: &str = "ATELIER_MAX_ITERATIONS";

/// Main configuration for Atelier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint configuration, environment only
    #[serde(skip)]
    pub endpoints: EndpointConfig,
    /// Model configuration
    #[serde(default)]
    pub models: ModelConfig,
    /// Refinement loop configuration
    #[serde(default)]
    pub refinement: RefinementConfig,
    /// Where results go
    #[serde(default)]
    pub output: OutputConfig,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,
}

/// Remote endpoints and credentials
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    /// Bearer token for both APIs
    pub access_token: String,
    /// Base URL of the chat completion API
    pub model_url: String,
    /// Image synthesis endpoint
    pub image_url: String,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Text model for the composer and the supervisor planner
    pub text: String,
    /// Vision model for the critic
    pub vision: String,
    /// Sampling temperature for every model call
    pub temperature: f32,
}

/// Orchestration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Fixed compose → render → critique cycle
    Loop,
    /// LLM planner chooses the next agent call
    Supervisor,
}

/// Refinement loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Which orchestrator drives the agents
    pub strategy: Strategy,
    /// Score at or above which the run stops with success
    /// Default: 0.8
    pub threshold: f64,
    /// Maximum compose/render/critique iterations
    /// Default: 3
    pub max_iterations: usize,
    /// Maximum agent calls in the supervisor strategy, all agents combined
    /// Default: 10
    pub max_invocations: usize,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where each rendered image is written
    pub image_path: PathBuf,
    /// Open the final image in the system viewer
    pub open_result: bool,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            vision: String::new(),
            temperature: 0.0,
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Loop,
            threshold: 0.8,
            max_iterations: 3,
            max_invocations: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from("generated-image.jpeg"),
            open_result: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Loop => write!(f, "loop"),
            Strategy::Supervisor => write!(f, "supervisor"),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("atelier")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    ///
    /// The result is not validated; call [`Config::validate`] once CLI
    /// overrides have been applied.
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from_file()?.unwrap_or_default();
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from file only, `None` when there is no file
    pub fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| AtelierError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content).map(Some)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AtelierError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variables through `lookup`
    ///
    /// Required variables that are missing or blank are reported by name.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    AtelierError::config(format!("Missing environment variable {}", key))
                })
        };

        self.endpoints.access_token = required(ENV_ACCESS_TOKEN)?;
        self.endpoints.model_url = required(ENV_MODEL_URL)?;
        self.endpoints.image_url = required(ENV_IMAGE_URL)?;

        // The config file may already name the models
        if let Some(text) = lookup(ENV_MODEL_NAME).filter(|v| !v.trim().is_empty()) {
            self.models.text = text.trim().to_string();
        }
        if let Some(vision) = lookup(ENV_VISION_MODEL).filter(|v| !v.trim().is_empty()) {
            self.models.vision = vision.trim().to_string();
        }
        if self.models.text.is_empty() {
            return Err(AtelierError::config(format!(
                "Missing environment variable {}",
                ENV_MODEL_NAME
            )));
        }
        if self.models.vision.is_empty() {
            return Err(AtelierError::config(format!(
                "Missing environment variable {}",
                ENV_VISION_MODEL
            )));
        }

        if let Some(strategy) = lookup(ENV_STRATEGY) {
            self.refinement.strategy = match strategy.trim().to_lowercase().as_str() {
                "loop" => Strategy::Loop,
                "supervisor" => Strategy::Supervisor,
                other => {
                    return Err(AtelierError::config(format!(
                        "{} must be 'loop' or 'supervisor', got '{}'",
                        ENV_STRATEGY, other
                    )))
                }
            };
        }
        if let Some(threshold) = lookup(ENV_THRESHOLD) {
            self.refinement.threshold = threshold.trim().parse().map_err(|_| {
                AtelierError::config(format!("{} is not a number: {}", ENV_THRESHOLD, threshold))
            })?;
        }
        if let Some(max) = lookup(ENV_MAX_ITERATIONS) {
            self.refinement.max_iterations = max.trim().parse().map_err(|_| {
                AtelierError::config(format!("{} is not a count: {}", ENV_MAX_ITERATIONS, max))
            })?;
        }

        Ok(())
    }

    /// Check settings that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            (ENV_MODEL_URL, &self.endpoints.model_url),
            (ENV_IMAGE_URL, &self.endpoints.image_url),
        ] {
            Url::parse(value).map_err(|e| {
                AtelierError::config(format!("{} is not a URL ({}): {}", key, e, value))
            })?;
        }

        let threshold = self.refinement.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AtelierError::config(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                threshold
            )));
        }
        if self.refinement.max_iterations == 0 {
            return Err(AtelierError::config("max_iterations must be at least 1"));
        }
        if self.refinement.max_invocations == 0 {
            return Err(AtelierError::config("max_invocations must be at least 1"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AtelierError::config("http.timeout_secs must be at least 1"));
        }

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

//! Stable Diffusion XL endpoint client
//!
//! One synchronous POST per image: JSON prompts in, raw bytes out.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{AtelierError, Config, PromptPair, Result};
use crate::image::traits::{GeneratedImage, ImageBackend};
use crate::llm::truncate_for_log;

/// Content type assumed when the endpoint does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// SDXL text-to-image client
#[derive(Clone)]
pub struct SdxlClient {
    client: Client,
    url: String,
    token: String,
}

/// Request body expected by the endpoint
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
}

impl SdxlClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.endpoints.image_url,
            &config.endpoints.access_token,
            Duration::from_secs(config.http.timeout_secs),
        )
    }

    /// Create a client for a specific endpoint
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AtelierError::render_transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl ImageBackend for SdxlClient {
    async fn generate(&self, prompts: &PromptPair) -> Result<GeneratedImage> {
        let request = GenerateRequest {
            prompt: &prompts.prompt,
            negative_prompt: &prompts.negative_prompt,
        };
        debug!(
            prompt = %truncate_for_log(&prompts.prompt, 200),
            negative_prompt = %truncate_for_log(&prompts.negative_prompt, 200),
            "image request"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/octet-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AtelierError::render_transport(e.to_string()))?;

        let status = response.status();
        info!(status = status.as_u16(), "SDXL response");

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AtelierError::render_status(status.as_u16(), error_text));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AtelierError::render_transport(e.to_string()))?;

        if bytes.is_empty() {
            return Err(AtelierError::render_status(
                status.as_u16(),
                "endpoint returned an empty body",
            ));
        }

        Ok(GeneratedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    fn name(&self) -> &str {
        "sdxl"
    }
}

//! Image backend trait
//!
//! Abstracts the text-to-image service behind a single call.

use async_trait::async_trait;

use crate::core::{PromptPair, Result};

/// Raw output of one synthesis request
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Trait for text-to-image services
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Submit one prompt pair and return the image bytes
    ///
    /// Non-2xx responses and transport failures are `AtelierError::Render`.
    async fn generate(&self, prompts: &PromptPair) -> Result<GeneratedImage>;

    /// Get the backend name
    fn name(&self) -> &str;
}

//! Image renderer agent
//!
//! Sends a prompt pair to the image backend and stores the result on disk.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::core::{AtelierError, PromptPair, RenderedImage, Result};
use crate::image::ImageBackend;

/// Renders prompt pairs into image files
#[derive(Clone)]
pub struct ImageRenderer {
    backend: Arc<dyn ImageBackend>,
    output_path: PathBuf,
}

impl ImageRenderer {
    /// Tool name used by the supervisor
    pub const TOOL_NAME: &'static str = "generate_image";

    pub fn new(backend: Arc<dyn ImageBackend>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            output_path: output_path.into(),
        }
    }

    /// Render one image; never returns empty bytes
    pub async fn render(&self, prompts: &PromptPair) -> Result<RenderedImage> {
        info!(backend = self.backend.name(), "invoking image renderer");

        let generated = self.backend.generate(prompts).await?;
        if generated.bytes.is_empty() {
            return Err(AtelierError::render_transport(format!(
                "{} returned no image data",
                self.backend.name()
            )));
        }

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.output_path, &generated.bytes)?;
        info!(
            path = %self.output_path.display(),
            bytes = generated.bytes.len(),
            "image written"
        );

        Ok(RenderedImage {
            bytes: generated.bytes,
            content_type: generated.content_type,
            path: Some(self.output_path.clone()),
        })
    }
}

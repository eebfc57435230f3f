//! Image module - text-to-image backends
//!
//! Provides the backend abstraction and the SDXL endpoint client.

pub mod sdxl;
pub mod traits;

pub use sdxl::SdxlClient;
pub use traits::{GeneratedImage, ImageBackend};

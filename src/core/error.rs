//! Custom error types for Atelier
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Atelier operations
#[derive(Error, Debug)]
pub enum AtelierError {
    /// Missing or invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// The prompt composer returned output that is not a usable prompt pair
    #[error("Prompt composition failed: {0}")]
    Composition(String),

    /// The image endpoint failed or returned an unusable body
    #[error("Image rendering failed{}: {detail}", status_suffix(.status))]
    Render {
        /// HTTP status code, absent for transport errors
        status: Option<u16>,
        /// Response body or transport error message
        detail: String,
    },

    /// The vision model could not be reached at all
    #[error("Critique unavailable: {0}")]
    CritiqueUnavailable(String),

    /// The vision model answered, but not with a usable critique
    #[error("Critique could not be parsed: {0}")]
    CritiqueUnparseable(String),

    /// Chat completion API errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Convenience Result type for Atelier operations
pub type Result<T> = std::result::Result<T, AtelierError>;

impl AtelierError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a composition error
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Create a render error for a non-2xx response
    pub fn render_status(status: u16, detail: impl Into<String>) -> Self {
        Self::Render {
            status: Some(status),
            detail: detail.into(),
        }
    }

    /// Create a render error for a transport failure
    pub fn render_transport(detail: impl Into<String>) -> Self {
        Self::Render {
            status: None,
            detail: detail.into(),
        }
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        let err = AtelierError::render_status(500, "boom");
        assert_eq!(err.to_string(), "Image rendering failed (HTTP 500): boom");

        let err = AtelierError::render_transport("connection refused");
        assert_eq!(
            err.to_string(),
            "Image rendering failed: connection refused"
        );
    }

    #[test]
    fn test_critique_error_display() {
        let err = AtelierError::CritiqueUnavailable("connection reset".into());
        assert_eq!(err.to_string(), "Critique unavailable: connection reset");
    }
}

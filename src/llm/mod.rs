//! LLM module - Language Model integrations
//!
//! Provides the chat provider abstraction and an OpenAI-compatible client.

pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Shorten a payload for log output
pub(crate) fn truncate_for_log(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let head: String = content.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        // Multi-byte characters are never split
        assert_eq!(truncate_for_log("ééé", 2), "éé...");
    }
}

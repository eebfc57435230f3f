//! Scripted stand-ins for the chat and image services

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use atelier::agent::{Agents, ImageCritic, ImageRenderer, PromptComposer};
use atelier::core::{AtelierError, Message, PromptPair, Result, ToolCall, ToolDefinition};
use atelier::image::{GeneratedImage, ImageBackend};
use atelier::llm::{GenerateOptions, LLMProvider, LLMResponse};

/// One scripted provider reply
pub enum Reply {
    Text(String),
    Tools(Vec<ToolCall>),
    Fail(String),
}

/// A provider call as the scripted provider saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
    pub tool_count: usize,
}

/// LLM provider that replays queued replies and records every call
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Box<dyn Fn(usize) -> Reply + Send + Sync>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer every call (after the queue is drained) with `fallback(call_index)`
    pub fn with_fallback(
        replies: Vec<Reply>,
        fallback: impl Fn(usize) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback: Some(Box::new(fallback)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self, model: &str, messages: &[Message], tool_count: usize) -> Result<LLMResponse> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                model: model.to_string(),
                messages: messages.to_vec(),
                tool_count,
            });
            calls.len() - 1
        };

        let reply = match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => match &self.fallback {
                Some(fallback) => fallback(index),
                None => return Err(AtelierError::provider("script exhausted")),
            },
        };

        match reply {
            Reply::Text(content) => Ok(LLMResponse {
                content,
                model: model.to_string(),
                ..Default::default()
            }),
            Reply::Tools(tool_calls) => Ok(LLMResponse {
                tool_calls,
                model: model.to_string(),
                ..Default::default()
            }),
            Reply::Fail(message) => Err(AtelierError::provider(message)),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(model, messages, 0)
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(model, messages, tools.len())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// One scripted image reply
pub enum Render {
    Bytes(Vec<u8>),
    Status(u16),
}

/// Image backend that replays queued results; defaults to a tiny JPEG header
pub struct ScriptedImages {
    script: Mutex<VecDeque<Render>>,
    prompts: Mutex<Vec<PromptPair>>,
}

impl ScriptedImages {
    pub fn new(script: Vec<Render>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn prompts(&self) -> Vec<PromptPair> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageBackend for ScriptedImages {
    async fn generate(&self, prompts: &PromptPair) -> Result<GeneratedImage> {
        self.prompts.lock().unwrap().push(prompts.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Render::Bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]));

        match next {
            Render::Bytes(bytes) => Ok(GeneratedImage {
                bytes,
                content_type: "image/jpeg".to_string(),
            }),
            Render::Status(status) => Err(AtelierError::render_status(status, "scripted failure")),
        }
    }

    fn name(&self) -> &str {
        "scripted-images"
    }
}

/// A composer reply with numbered prompts
pub fn prompts_reply(n: usize) -> Reply {
    Reply::Text(format!(r#"{{"prompt": "prompt {n}", "negativePrompt": "negative {n}"}}"#))
}

/// A critic reply
pub fn critique_reply(score: f64, feedback: &str) -> Reply {
    let body = serde_json::json!({ "score": score, "feedback": feedback });
    Reply::Text(body.to_string())
}

/// Wire the three agents to scripted services
pub fn scripted_agents(
    composer: &Arc<ScriptedProvider>,
    images: Arc<dyn ImageBackend>,
    critic: &Arc<ScriptedProvider>,
    output: &Path,
) -> Agents {
    Agents::new(
        PromptComposer::new(composer.clone(), "text-model"),
        ImageRenderer::new(images, output.join("image.jpeg")),
        ImageCritic::new(critic.clone(), "vision-model"),
    )
}

/// The user message of a composer call
pub fn composer_user_message(call: &RecordedCall) -> &str {
    &call.messages[1].content
}

/// Log output captured from the current thread
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        let text = String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned();
        text.lines()
            .filter(|line| line.contains(needle))
            .map(String::from)
            .collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Send this thread's tracing events to a buffer until the guard drops
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

//! Completion backend seam. The classifier only needs `chat`; the demo
//! binary streams the character's reply through `chat_stream`.

use crate::llm::openai::OpenAIClient;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub use crate::llm::openai::Message;

/// Per-call overrides. `None` leaves the backend default in place.
#[derive(Debug, Clone, Default)]
pub struct LlmParams {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One completion, returned whole.
    async fn chat(
        &self,
        messages: Vec<Message>,
        options: Option<LlmParams>,
    ) -> Result<String, String>;

    /// Completion as a stream of content deltas.
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        options: Option<LlmParams>,
    ) -> Result<TextStream, String>;

    /// Config id of this provider, used in logs.
    fn id(&self) -> &str;
}

/// Any OpenAI-compatible endpoint.
pub struct OpenAIProvider {
    client: OpenAIClient,
    id: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: OpenAIClient::new(api_key, base_url, model),
            id: "openai".to_string(),
        }
    }

    pub fn with_id(self, id: String) -> Self {
        Self { id, ..self }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        options: Option<LlmParams>,
    ) -> Result<String, String> {
        self.client.chat(messages, options).await
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        options: Option<LlmParams>,
    ) -> Result<TextStream, String> {
        self.client.chat_stream(messages, options).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}

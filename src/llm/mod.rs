pub mod llm_config;
pub mod openai;
pub mod provider;

pub use llm_config::{build_provider, LlmConfig, LlmProviderConfig};
pub use provider::{LlmParams, LlmProvider, Message, OpenAIProvider, TextStream};

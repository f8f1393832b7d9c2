//! LLM configuration, persisted to `llm_config.json`.

use crate::config;
use crate::llm::provider::{LlmProvider, OpenAIProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub id: String,
    /// Only "openai" (and OpenAI-compatible endpoints) is supported.
    #[serde(default = "default_provider_type")]
    pub provider_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl LlmProviderConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        config::resolve_api_key(&self.api_key, &self.api_key_env)
    }
}

fn default_true() -> bool {
    true
}

fn default_provider_type() -> String {
    "openai".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// ID of the active provider (must match one of `providers[].id`).
    #[serde(default = "default_active_provider")]
    pub active_provider: String,

    /// Optional: override model for system tasks (intent classification).
    pub system_model: Option<String>,

    #[serde(default = "default_providers")]
    pub providers: Vec<LlmProviderConfig>,
}

fn default_active_provider() -> String {
    "openai".to_string()
}

fn default_providers() -> Vec<LlmProviderConfig> {
    vec![LlmProviderConfig {
        id: "openai".to_string(),
        provider_type: "openai".to_string(),
        enabled: true,
        api_key: None,
        api_key_env: Some("OPENAI_API_KEY".to_string()),
        base_url: Some("https://api.openai.com/v1".to_string()),
        model: Some("gpt-4o-mini".to_string()),
    }]
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            active_provider: default_active_provider(),
            system_model: None,
            providers: default_providers(),
        }
    }
}

impl LlmConfig {
    /// Active provider entry, falling back to the first enabled one, then
    /// the first one listed.
    pub fn active(&self) -> Option<&LlmProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.id == self.active_provider)
            .or_else(|| self.providers.iter().find(|p| p.enabled))
            .or_else(|| self.providers.first())
    }
}

pub fn load_config(path: &Path) -> LlmConfig {
    config::load_json_config(path, "LLM")
}

pub fn save_config(path: &Path, config: &LlmConfig) -> Result<(), String> {
    config::save_json_config(path, config, "LLM")
}

/// Factory: build the provider selected by `config`.
pub fn build_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match config.active() {
        Some(cfg) => {
            if cfg.provider_type != "openai" {
                tracing::warn!(
                    "[LLM] Unknown provider_type '{}', treating '{}' as OpenAI-compatible",
                    cfg.provider_type,
                    cfg.id
                );
            }
            let api_key = cfg.resolve_api_key().unwrap_or_default();
            let model = cfg.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!(
                "[LLM] Initializing OpenAI provider: base_url={}, model={}",
                cfg.base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1"),
                model
            );
            Arc::new(
                OpenAIProvider::new(api_key, cfg.base_url.clone(), Some(model))
                    .with_id(cfg.id.clone()),
            )
        }
        None => {
            tracing::warn!("[LLM] No provider configured, falling back to OpenAI defaults");
            Arc::new(OpenAIProvider::new(String::new(), None, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: LlmConfig = serde_json::from_str(r#"{ "system_model": "tiny" }"#).unwrap();
        assert_eq!(cfg.active_provider, "openai");
        assert_eq!(cfg.system_model.as_deref(), Some("tiny"));
        assert_eq!(cfg.providers.len(), 1);
    }

    #[test]
    fn active_falls_back_to_first_enabled() {
        let cfg: LlmConfig = serde_json::from_str(
            r#"{
                "active_provider": "missing",
                "providers": [
                    { "id": "a", "enabled": false },
                    { "id": "b", "base_url": "http://localhost:8080/v1" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.active().map(|p| p.id.as_str()), Some("b"));
        assert_eq!(build_provider(&cfg).id(), "b");
    }

    #[test]
    fn roundtrips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("llm_config.json");
        let mut cfg = LlmConfig::default();
        cfg.system_model = Some("classifier".to_string());
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path);
        assert_eq!(loaded.system_model.as_deref(), Some("classifier"));
    }
}

//! Intent engine configuration, persisted to `intent_config.json`.
//!
//! Every field has a default, so a partial file only overrides what it names.

use crate::ai::animation::{Channel, Expression, Gesture};
use crate::ai::lexicon::{default_expression_lexicon, default_gesture_lexicon, LexiconEntry};
use crate::ai::segment_buffer::{DEFAULT_DEDUP_PREFIX_CHARS, DEFAULT_MIN_SEGMENT_CHARS};
use crate::config;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Minimum milliseconds between two gesture triggers.
    pub gesture_cooldown_ms: u64,
    /// Minimum milliseconds between two expression triggers.
    pub expression_cooldown_ms: u64,
    /// Segments shorter than this (chars, trimmed) are never classified.
    pub min_segment_chars: usize,
    /// Text shorter than this (chars, trimmed) skips the model call.
    pub min_classify_chars: usize,
    /// Prefix length used to recognise repeated segments.
    pub dedup_prefix_chars: usize,
    /// Model id for the classification call; provider default when unset.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Also block a channel for the stock clip length after each trigger.
    pub block_during_playback: bool,
    pub gesture_lexicon: Vec<LexiconEntry<Gesture>>,
    pub expression_lexicon: Vec<LexiconEntry<Expression>>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            gesture_cooldown_ms: 4000,
            expression_cooldown_ms: 3000,
            min_segment_chars: DEFAULT_MIN_SEGMENT_CHARS,
            min_classify_chars: 5,
            dedup_prefix_chars: DEFAULT_DEDUP_PREFIX_CHARS,
            model: None,
            temperature: 0.1,
            max_tokens: 60,
            block_during_playback: false,
            gesture_lexicon: default_gesture_lexicon(),
            expression_lexicon: default_expression_lexicon(),
        }
    }
}

impl IntentConfig {
    pub fn cooldown_ms(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Gesture => self.gesture_cooldown_ms,
            Channel::Expression => self.expression_cooldown_ms,
        }
    }
}

pub fn load_config(path: &Path) -> IntentConfig {
    config::load_json_config(path, "Intent")
}

pub fn save_config(path: &Path, config: &IntentConfig) -> Result<(), String> {
    config::save_json_config(path, config, "Intent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: IntentConfig =
            serde_json::from_str(r#"{ "gesture_cooldown_ms": 1500, "model": "tiny" }"#).unwrap();
        assert_eq!(cfg.gesture_cooldown_ms, 1500);
        assert_eq!(cfg.expression_cooldown_ms, 3000);
        assert_eq!(cfg.model.as_deref(), Some("tiny"));
        assert!(!cfg.gesture_lexicon.is_empty());
    }

    #[test]
    fn custom_lexicon_from_json() {
        let cfg: IntentConfig = serde_json::from_str(
            r#"{ "expression_lexicon": [
                { "label": "smile", "priority": 1, "keywords": ["yay"] }
            ] }"#,
        )
        .unwrap();
        assert_eq!(cfg.expression_lexicon.len(), 1);
        assert_eq!(cfg.expression_lexicon[0].label, Expression::Smile);
    }

    #[test]
    fn cooldown_per_channel() {
        let cfg = IntentConfig::default();
        assert_eq!(cfg.cooldown_ms(Channel::Gesture), 4000);
        assert_eq!(cfg.cooldown_ms(Channel::Expression), 3000);
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("intent_config.json");
        let mut cfg = IntentConfig::default();
        cfg.block_during_playback = true;
        save_config(&path, &cfg).unwrap();
        assert!(load_config(&path).block_during_playback);
    }
}

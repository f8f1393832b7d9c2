//! Hybrid intent classification.
//!
//! Two passes share one output shape:
//! - `classify_fast`: ordered keyword lists, first hit wins. Near-zero latency.
//! - `classify_slow`: one low-temperature completion call, parsed defensively.
//!   Every failure collapses to an empty result; callers never see an error.

use crate::ai::animation::{AnimationTrigger, ClassificationResult, Expression, Gesture};
use crate::ai::intent_config::IntentConfig;
use crate::ai::lexicon::{contains_word, contains_word_prefix, keyword_matches};
use crate::ai::prompts::INTENT_CLASSIFIER_SYSTEM_PROMPT;
use crate::llm::provider::{LlmParams, LlmProvider, Message};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// Minimum hits for `dominant_intent` to report a category.
pub const DEFAULT_MIN_SCORE: usize = 2;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classification backend failed: {0}")]
    Backend(String),
    #[error("no JSON object in classifier output: {0:?}")]
    MalformedPayload(String),
    #[error("classifier output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("classifier output has the wrong shape: {0}")]
    InvalidPayload(String),
    #[error("classification backend panicked")]
    Panicked,
}

// ── Fast pass ──────────────────────────────────────────────

const FAST_EXPRESSIONS: &[(Expression, &[&str])] = &[
    (Expression::Surprised, &["wow", "whoa", "no way", "哇", "天哪"]),
    (Expression::Angry, &["angry", "furious", "气死", "生气"]),
    (Expression::Sad, &["sorry", "unfortunately", "sad", "难过", "抱歉"]),
    (Expression::Smile, &["haha", "glad", "happy", "great", "哈哈", "开心"]),
];

const FAST_GESTURES: &[(Gesture, &[&str])] = &[
    (Gesture::ShakeHead, &["not really", "incorrect", "wrong", "不对"]),
    (Gesture::Nod, &["correct", "exactly", "of course", "没错", "是的"]),
    (Gesture::Thinking, &["hmm", "let me think", "perhaps", "嗯"]),
];

fn first_hit<L: Copy>(lower: &str, table: &[(L, &[&str])]) -> Option<L> {
    table
        .iter()
        .find(|(_, kws)| kws.iter().any(|kw| keyword_matches(lower, kw)))
        .map(|(label, _)| *label)
}

/// Keyword pass: at most one gesture and one expression, first match wins.
pub fn classify_fast(text: &str) -> ClassificationResult {
    let lower = text.to_lowercase();
    ClassificationResult {
        gesture: first_hit(&lower, FAST_GESTURES),
        expression: first_hit(&lower, FAST_EXPRESSIONS),
    }
}

// ── Whole-response scoring ─────────────────────────────────

// Whole words unless marked with a trailing `*`, which matches any word
// starting with the stem.
const SCORE_TABLE: &[(AnimationTrigger, &[&str])] = &[
    (
        AnimationTrigger::Expression(Expression::Smile),
        &[
            "happy", "glad", "great", "wonderful", "awesome", "love", "enjoy", "excited",
            "fantastic", "excellent", "amazing", "delighted", "thrill*", "cheer*", "pleasur*",
            "joy", "haha", "lol",
        ],
    ),
    (
        AnimationTrigger::Expression(Expression::Sad),
        &[
            "sad", "sorry", "unfortunately", "regret", "disappoint*", "missing", "missed",
            "unhappy", "tragic*", "griev*", "heartbreak*",
        ],
    ),
    (
        AnimationTrigger::Expression(Expression::Angry),
        &[
            "angry", "furious", "annoy*", "frustrat*", "irritat*", "rage", "infuriat*",
            "outrag*",
        ],
    ),
    (
        AnimationTrigger::Expression(Expression::Surprised),
        &[
            "wow", "incredible", "unbelievable", "unexpect*", "shock*", "astound*",
            "astonish*", "whoa", "omg",
        ],
    ),
    (
        AnimationTrigger::Gesture(Gesture::Nod),
        &[
            "yes", "sure", "absolutely", "certainly", "of course", "indeed", "correct",
            "agree", "definitely", "exactly",
        ],
    ),
    (
        AnimationTrigger::Gesture(Gesture::ShakeHead),
        &[
            "don't think", "dont think", "incorrect", "wrong", "disagree", "not really",
            "not quite", "that's not", "thats not",
        ],
    ),
    (
        AnimationTrigger::Gesture(Gesture::Thinking),
        &[
            "hmm*", "let me think", "consider*", "perhaps", "maybe", "possibly", "wonder",
            "interesting", "interestingly",
        ],
    ),
];

fn score_hit(lower: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(stem) => contains_word_prefix(lower, stem),
        None => contains_word(lower, pattern),
    }
}

/// Score every category by distinct keyword hits over a whole response and
/// return the strongest, provided it reaches `min_score`. Ties keep the
/// category listed first.
pub fn dominant_intent(text: &str, min_score: usize) -> Option<AnimationTrigger> {
    let lower = text.to_lowercase();
    let mut best: Option<(AnimationTrigger, usize)> = None;

    for (trigger, patterns) in SCORE_TABLE {
        let score = patterns.iter().filter(|p| score_hit(&lower, p)).count();
        if score > 0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((*trigger, score));
        }
    }

    best.filter(|(_, score)| *score >= min_score.max(1))
        .map(|(trigger, _)| trigger)
}

// ── Slow pass ──────────────────────────────────────────────

/// Parse raw model output into a result. Takes the first `{...}` span,
/// tolerating prose or code fences around it. Values outside the closed
/// label sets are dropped to `None` individually.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, ClassificationError> {
    let start = raw
        .find('{')
        .ok_or_else(|| ClassificationError::MalformedPayload(preview(raw)))?;
    let end = raw[start..]
        .find('}')
        .map(|i| start + i)
        .ok_or_else(|| ClassificationError::MalformedPayload(preview(raw)))?;

    let value: Value = serde_json::from_str(&raw[start..=end])?;
    let obj = value
        .as_object()
        .ok_or_else(|| ClassificationError::InvalidPayload(preview(raw)))?;

    Ok(ClassificationResult {
        gesture: closed_value(obj.get("gesture"), "gesture"),
        expression: closed_value(obj.get("expression"), "expression"),
    })
}

fn closed_value<T: std::str::FromStr<Err = String>>(value: Option<&Value>, field: &str) -> Option<T> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match s.parse::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("[Classifier] Discarding {}: {}", field, e);
                None
            }
        },
        Some(other) => {
            tracing::debug!("[Classifier] Discarding non-string {}: {}", field, other);
            None
        }
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(200).collect()
}

/// Fast keyword pass plus model-backed slow pass.
pub struct HybridClassifier {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
    min_chars: usize,
}

impl HybridClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::from_config(provider, &IntentConfig::default())
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &IntentConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            min_chars: config.min_classify_chars,
        }
    }

    pub fn classify_fast(&self, text: &str) -> ClassificationResult {
        classify_fast(text)
    }

    /// Model-backed classification. Never fails: short input, backend
    /// errors, bad payloads and panics all come back as an empty result.
    pub async fn classify_slow(&self, text: &str) -> ClassificationResult {
        let outcome = AssertUnwindSafe(self.try_classify_slow(text))
            .catch_unwind()
            .await
            .unwrap_or(Err(ClassificationError::Panicked));

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.id(),
                    "[Classifier] Slow classification failed: {}",
                    e
                );
                ClassificationResult::EMPTY
            }
        }
    }

    /// Same as [`classify_slow`](Self::classify_slow) but reports why it
    /// found nothing.
    pub async fn try_classify_slow(
        &self,
        text: &str,
    ) -> Result<ClassificationResult, ClassificationError> {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return Ok(ClassificationResult::EMPTY);
        }

        let messages = vec![
            Message::system(INTENT_CLASSIFIER_SYSTEM_PROMPT),
            Message::user(format!("Passage:\n{}", trimmed)),
        ];
        let params = LlmParams {
            model: self.model.clone(),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        let raw = self
            .provider
            .chat(messages, Some(params))
            .await
            .map_err(ClassificationError::Backend)?;

        let result = parse_classification(&raw)?;
        tracing::debug!(
            gesture = ?result.gesture,
            expression = ?result.expression,
            "[Classifier] Segment classified"
        );
        Ok(result)
    }

    /// Fast pass first; channels it leaves empty are filled by one slow call.
    pub async fn classify_hybrid(&self, text: &str) -> ClassificationResult {
        let fast = self.classify_fast(text);
        if fast.gesture.is_some() && fast.expression.is_some() {
            return fast;
        }
        fast.or(self.classify_slow(text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::TextStream;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a canned reply and records what it was asked.
    struct CannedProvider {
        reply: Result<String, String>,
        calls: AtomicUsize,
        last_params: Mutex<Option<LlmParams>>,
    }

    impl CannedProvider {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
                last_params: Mutex::new(None),
            })
        }

        fn err(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(msg.to_string()),
                calls: AtomicUsize::new(0),
                last_params: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            options: Option<LlmParams>,
        ) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_params.lock().unwrap() = options;
            self.reply.clone()
        }

        async fn chat_stream(
            &self,
            _messages: Vec<Message>,
            _options: Option<LlmParams>,
        ) -> Result<TextStream, String> {
            Err("not supported".to_string())
        }

        fn id(&self) -> &str {
            "canned"
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl LlmProvider for PanickingProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _options: Option<LlmParams>,
        ) -> Result<String, String> {
            panic!("backend blew up");
        }

        async fn chat_stream(
            &self,
            _messages: Vec<Message>,
            _options: Option<LlmParams>,
        ) -> Result<TextStream, String> {
            Err("not supported".to_string())
        }

        fn id(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn fast_pass_first_match_wins() {
        // "wow" (surprised) is listed before "happy" (smile).
        let r = classify_fast("I'm so happy, wow");
        assert_eq!(r.expression, Some(Expression::Surprised));
        assert_eq!(classify_fast("That's correct.").gesture, Some(Gesture::Nod));
        assert!(classify_fast("The train leaves at noon.").is_empty());
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let r = parse_classification(
            "```json\n{\"gesture\": \"nod\", \"expression\": \"smile\"}\n```",
        )
        .unwrap();
        assert_eq!(r.gesture, Some(Gesture::Nod));
        assert_eq!(r.expression, Some(Expression::Smile));
    }

    #[test]
    fn parse_drops_values_outside_closed_sets() {
        let r = parse_classification(r#"Sure! {"gesture": "dance", "expression": "sad"}"#).unwrap();
        assert_eq!(r.gesture, None);
        assert_eq!(r.expression, Some(Expression::Sad));

        let r = parse_classification(r#"{"gesture": 3, "expression": null}"#).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn parse_missing_fields_are_none() {
        let r = parse_classification("{}").unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_classification("no idea"),
            Err(ClassificationError::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_classification("{gesture: nod}"),
            Err(ClassificationError::Json(_))
        ));
    }

    #[tokio::test]
    async fn slow_pass_skips_short_text_without_calling_backend() {
        let provider = CannedProvider::ok(r#"{"gesture":"nod"}"#);
        let classifier = HybridClassifier::new(provider.clone());
        let r = classifier.classify_slow("  ok  ").await;
        assert!(r.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_pass_uses_conservative_sampling() {
        let provider = CannedProvider::ok(r#"{"gesture":"thinking","expression":null}"#);
        let mut config = IntentConfig::default();
        config.model = Some("intent-mini".to_string());
        let classifier = HybridClassifier::from_config(provider.clone(), &config);

        let r = classifier.classify_slow("Let me see how that works out.").await;
        assert_eq!(r.gesture, Some(Gesture::Thinking));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let params = provider.last_params.lock().unwrap().clone().unwrap();
        assert_eq!(params.model.as_deref(), Some("intent-mini"));
        assert!(params.temperature.unwrap() <= 0.2);
        assert!(params.max_tokens.unwrap() <= 100);
    }

    #[tokio::test]
    async fn slow_pass_swallows_backend_errors() {
        let classifier = HybridClassifier::new(CannedProvider::err("connection refused"));
        let r = classifier.classify_slow("This should reach the backend.").await;
        assert!(r.is_empty());

        let err = classifier
            .try_classify_slow("This should reach the backend.")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Backend(_)));
    }

    #[tokio::test]
    async fn slow_pass_swallows_malformed_output() {
        let classifier = HybridClassifier::new(CannedProvider::ok("I think a nod fits."));
        assert!(classifier.classify_slow("Yes, that is how it works.").await.is_empty());
    }

    #[tokio::test]
    async fn slow_pass_survives_backend_panic() {
        let classifier = HybridClassifier::new(Arc::new(PanickingProvider));
        assert!(classifier.classify_slow("A perfectly normal sentence.").await.is_empty());
    }

    #[tokio::test]
    async fn hybrid_fills_only_missing_channels() {
        let provider = CannedProvider::ok(r#"{"gesture":"shake_head","expression":"smile"}"#);
        let classifier = HybridClassifier::new(provider.clone());
        let r = classifier.classify_hybrid("That's correct, my friend.").await;
        assert_eq!(r.gesture, Some(Gesture::Nod), "fast pass keeps its gesture");
        assert_eq!(r.expression, Some(Expression::Smile));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hybrid_skips_backend_when_fast_pass_is_complete() {
        let provider = CannedProvider::ok("{}");
        let classifier = HybridClassifier::new(provider.clone());
        let r = classifier.classify_hybrid("Haha, exactly!").await;
        assert_eq!(r.gesture, Some(Gesture::Nod));
        assert_eq!(r.expression, Some(Expression::Smile));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dominant_intent_needs_min_score() {
        assert_eq!(dominant_intent("I'm happy about it.", DEFAULT_MIN_SCORE), None);
        assert_eq!(
            dominant_intent("I'm happy and glad about it.", DEFAULT_MIN_SCORE),
            Some(AnimationTrigger::Expression(Expression::Smile))
        );
        assert_eq!(
            dominant_intent("Hmm, perhaps. Maybe not.", DEFAULT_MIN_SCORE),
            Some(AnimationTrigger::Gesture(Gesture::Thinking))
        );
    }

    #[test]
    fn dominant_intent_matches_whole_words() {
        assert_eq!(
            dominant_intent("That's incorrect, I disagree.", DEFAULT_MIN_SCORE),
            Some(AnimationTrigger::Gesture(Gesture::ShakeHead))
        );
        assert_eq!(dominant_intent("Such a disagreeable, incorrectly built room.", 1), None);
    }

    #[test]
    fn dominant_intent_stems_match_word_starts() {
        assert_eq!(
            dominant_intent("I'm so frustrated and annoyed right now.", DEFAULT_MIN_SCORE),
            Some(AnimationTrigger::Expression(Expression::Angry))
        );
    }

    #[test]
    fn prompt_lists_every_label() {
        for g in Gesture::ALL {
            assert!(INTENT_CLASSIFIER_SYSTEM_PROMPT.contains(g.as_str()));
        }
        for e in Expression::ALL {
            assert!(INTENT_CLASSIFIER_SYSTEM_PROMPT.contains(e.as_str()));
        }
    }
}

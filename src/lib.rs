//! Animation-intent detection for streamed character responses.
//!
//! [`IntentStream`] watches a response as it is generated and turns it into
//! gesture and expression triggers: instantly from keywords, and per
//! completed sentence from a small model call.

pub mod ai;
pub mod config;
pub mod llm;
pub mod utils;

pub use ai::{
    AnimationTrigger, Channel, Expression, Gesture, IntentConfig, IntentStream, TriggerSink,
};
pub use llm::{LlmConfig, LlmProvider};

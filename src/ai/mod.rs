pub mod animation;
pub mod classifier;
pub mod cooldown;
pub mod intent_config;
pub mod intent_stream;
pub mod lexicon;
pub mod prompts;
pub mod segment_buffer;


pub use animation::{
    AnimationTrigger, Channel, ClassificationResult, Expression, Gesture, TriggerSource,
};
pub use classifier::{dominant_intent, ClassificationError, HybridClassifier};
pub use cooldown::{Clock, CooldownGate, ManualClock, SystemClock};
pub use intent_config::IntentConfig;
pub use intent_stream::{FnSink, IntentStream, StreamPhase, TriggerSink};

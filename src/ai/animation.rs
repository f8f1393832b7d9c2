//! Animation vocabulary: the closed set of intents the engine can fire.
//!
//! Gestures drive head/body clips, expressions drive facial blendshape clips.
//! Each family lives on its own [`Channel`] so the two can be rate-limited
//! independently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Head/body animation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Nod,
    #[serde(alias = "shake-head", alias = "shake")]
    ShakeHead,
    Thinking,
}

/// Facial animation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Smile,
    Sad,
    Angry,
    Surprised,
}

impl Gesture {
    pub const ALL: [Gesture; 3] = [Gesture::Nod, Gesture::ShakeHead, Gesture::Thinking];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Nod => "nod",
            Gesture::ShakeHead => "shake_head",
            Gesture::Thinking => "thinking",
        }
    }

    /// Length of the stock clip for this gesture, in milliseconds.
    pub fn default_duration_ms(&self) -> u64 {
        match self {
            Gesture::Nod => 1200,
            Gesture::ShakeHead => 1400,
            Gesture::Thinking => 2000,
        }
    }
}

impl Expression {
    pub const ALL: [Expression; 4] = [
        Expression::Smile,
        Expression::Sad,
        Expression::Angry,
        Expression::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Smile => "smile",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Surprised => "surprised",
        }
    }

    /// Length of the stock clip for this expression, in milliseconds.
    pub fn default_duration_ms(&self) -> u64 {
        match self {
            Expression::Smile => 1500,
            Expression::Sad => 2000,
            Expression::Angry => 1500,
            Expression::Surprised => 1200,
        }
    }
}

impl FromStr for Gesture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nod" => Ok(Gesture::Nod),
            "shake_head" | "shake-head" | "shake" => Ok(Gesture::ShakeHead),
            "thinking" | "think" => Ok(Gesture::Thinking),
            other => Err(format!("unknown gesture '{}'", other)),
        }
    }
}

impl FromStr for Expression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smile" => Ok(Expression::Smile),
            "sad" => Ok(Expression::Sad),
            "angry" => Ok(Expression::Angry),
            "surprised" => Ok(Expression::Surprised),
            other => Err(format!("unknown expression '{}'", other)),
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An independently rate-limited animation lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Gesture,
    Expression,
}

/// Where a trigger decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Keyword hit in freshly streamed text.
    Keyword,
    /// Model-backed classification of a completed segment.
    Classifier,
}

/// A single permitted animation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", content = "label", rename_all = "snake_case")]
pub enum AnimationTrigger {
    Gesture(Gesture),
    Expression(Expression),
}

impl AnimationTrigger {
    pub fn channel(&self) -> Channel {
        match self {
            AnimationTrigger::Gesture(_) => Channel::Gesture,
            AnimationTrigger::Expression(_) => Channel::Expression,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnimationTrigger::Gesture(g) => g.as_str(),
            AnimationTrigger::Expression(e) => e.as_str(),
        }
    }

    pub fn default_duration_ms(&self) -> u64 {
        match self {
            AnimationTrigger::Gesture(g) => g.default_duration_ms(),
            AnimationTrigger::Expression(e) => e.default_duration_ms(),
        }
    }
}

/// Normalized output of either classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub gesture: Option<Gesture>,
    pub expression: Option<Expression>,
}

impl ClassificationResult {
    pub const EMPTY: ClassificationResult = ClassificationResult {
        gesture: None,
        expression: None,
    };

    pub fn is_empty(&self) -> bool {
        self.gesture.is_none() && self.expression.is_none()
    }

    /// Fill channels left empty in `self` from `other`.
    pub fn or(self, other: ClassificationResult) -> ClassificationResult {
        ClassificationResult {
            gesture: self.gesture.or(other.gesture),
            expression: self.expression.or(other.expression),
        }
    }
}

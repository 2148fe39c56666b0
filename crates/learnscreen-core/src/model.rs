//! Core data model types for learnscreen.
//!
//! These are the fundamental types the screening engine passes around:
//! domains, questions, answers, recorded trials and classified levels.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::LevelStats;
use crate::error::EngineError;

/// Highest level a domain offers.
pub const MAX_LEVEL: u8 = 3;

/// Validate a level number, returning it unchanged when it is in `1..=3`.
pub fn check_level(level: u8) -> Result<u8, EngineError> {
    if (1..=MAX_LEVEL).contains(&level) {
        Ok(level)
    } else {
        Err(EngineError::InvalidLevel(level))
    }
}

/// The four screening domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    VisualDiscrimination,
    Handwriting,
    MotorReaction,
    NumericComparison,
}

impl Domain {
    /// Every domain, in dashboard order.
    pub const ALL: [Domain; 4] = [
        Domain::VisualDiscrimination,
        Domain::Handwriting,
        Domain::MotorReaction,
        Domain::NumericComparison,
    ];

    /// Short human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Domain::VisualDiscrimination => "Letter Discrimination",
            Domain::Handwriting => "Handwriting",
            Domain::MotorReaction => "Reaction",
            Domain::NumericComparison => "Number Comparison",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::VisualDiscrimination => write!(f, "visual_discrimination"),
            Domain::Handwriting => write!(f, "handwriting"),
            Domain::MotorReaction => write!(f, "motor_reaction"),
            Domain::NumericComparison => write!(f, "numeric_comparison"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "visual_discrimination" | "visual" | "letters" => Ok(Domain::VisualDiscrimination),
            "handwriting" | "writing" => Ok(Domain::Handwriting),
            "motor_reaction" | "motor" | "reaction" => Ok(Domain::MotorReaction),
            "numeric_comparison" | "numeric" | "numbers" => Ok(Domain::NumericComparison),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// Three-tier risk classification.
///
/// Shown to caregivers as Not Danger / Less Danger / Danger at the level and
/// game granularity, and as low / medium / high for the whole-child profile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// The level/game screening label.
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Not Danger",
            RiskTier::Medium => "Less Danger",
            RiskTier::High => "Danger",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Domain-specific content of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Pick `target` out of a mirrored pair.
    LetterPair { target: char, distractor: char },
    /// Compare two numbers.
    NumberPair { left: i64, right: i64 },
    /// Tap the star at `index` on a grid of `cells`.
    Star { index: u32, cells: u32 },
    /// Write the word.
    Word { word: String },
}

impl Payload {
    /// The domain this payload belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            Payload::LetterPair { .. } => Domain::VisualDiscrimination,
            Payload::NumberPair { .. } => Domain::NumericComparison,
            Payload::Star { .. } => Domain::MotorReaction,
            Payload::Word { .. } => Domain::Handwriting,
        }
    }

    /// The answer a question built from this payload expects unless told otherwise.
    pub fn default_expected(&self) -> Expected {
        match self {
            Payload::LetterPair { target, .. } => Expected::Letter(*target),
            Payload::NumberPair { left, right } => Expected::Number(*left.max(right)),
            Payload::Star { index, .. } => Expected::Target(*index),
            Payload::Word { word } => Expected::Word(word.clone()),
        }
    }
}

/// The correct answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expected {
    Letter(char),
    Number(i64),
    Target(u32),
    Word(String),
}

impl Expected {
    /// Parse an expected answer from its textual form for `domain`.
    pub fn parse(domain: Domain, s: &str) -> Result<Self, String> {
        let s = s.trim();
        match domain {
            Domain::VisualDiscrimination => single_char(s).map(Expected::Letter),
            Domain::NumericComparison => s
                .parse()
                .map(Expected::Number)
                .map_err(|_| format!("not a number: {s}")),
            Domain::MotorReaction => s
                .parse()
                .map(Expected::Target)
                .map_err(|_| format!("not a target index: {s}")),
            Domain::Handwriting if !s.is_empty() => Ok(Expected::Word(s.to_string())),
            Domain::Handwriting => Err("empty word".into()),
        }
    }
}

/// Handwriting capture: the recognized text plus how the child dragged letters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Recognized text.
    pub text: String,
    /// Number of drag strokes used.
    #[serde(default)]
    pub drag_count: u32,
    /// Mean latency between drags in milliseconds.
    #[serde(default)]
    pub drag_latency_ms: u64,
}

/// A child's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Letter(char),
    Number(i64),
    Target(u32),
    Trace(Trace),
}

impl Answer {
    /// Parse a textual answer for `domain`. Handwriting answers parse as a
    /// trace with no drag data.
    pub fn parse(domain: Domain, s: &str) -> Result<Self, String> {
        Ok(match Expected::parse(domain, s)? {
            Expected::Letter(c) => Answer::Letter(c),
            Expected::Number(n) => Answer::Number(n),
            Expected::Target(i) => Answer::Target(i),
            Expected::Word(text) => Answer::Trace(Trace {
                text,
                drag_count: 0,
                drag_latency_ms: 0,
            }),
        })
    }

    /// The handwriting capture, if this is one.
    pub fn trace(&self) -> Option<&Trace> {
        match self {
            Answer::Trace(t) => Some(t),
            _ => None,
        }
    }
}

fn single_char(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single letter, got '{s}'")),
    }
}

/// An immutable unit of a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// What is shown.
    pub payload: Payload,
    /// What counts as correct.
    pub expected: Expected,
    /// Per-trial time limit in milliseconds.
    pub time_limit_ms: u64,
}

impl Question {
    /// Build a question whose expected answer follows from its payload.
    pub fn new(payload: Payload, time_limit: Duration) -> Self {
        let expected = payload.default_expected();
        Self {
            payload,
            expected,
            time_limit_ms: time_limit.as_millis() as u64,
        }
    }

    pub fn domain(&self) -> Domain {
        self.payload.domain()
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    /// Decide whether `answer` is correct.
    ///
    /// Letters compare exactly, since `b` and `d` are the point of the
    /// exercise; handwritten words compare case-insensitively after trimming.
    pub fn check(&self, answer: &Answer) -> Result<bool, EngineError> {
        match (&self.expected, answer) {
            (Expected::Letter(e), Answer::Letter(a)) => Ok(e == a),
            (Expected::Number(e), Answer::Number(a)) => Ok(e == a),
            (Expected::Target(e), Answer::Target(a)) => Ok(e == a),
            (Expected::Word(e), Answer::Trace(t)) => {
                Ok(e.trim().eq_ignore_ascii_case(t.text.trim()))
            }
            _ => Err(EngineError::AnswerKindMismatch {
                domain: self.domain(),
            }),
        }
    }
}

/// One answered or timed-out question. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResponse {
    /// Index of the question within its level.
    pub question_index: usize,
    /// `None` when the trial timed out.
    pub user_answer: Option<Answer>,
    pub is_correct: bool,
    pub time_taken_secs: f64,
    pub reaction_time_ms: u64,
    pub timed_out: bool,
}

impl TrialResponse {
    /// A response for a trial whose clock ran out.
    pub fn timed_out(question_index: usize, limit: Duration) -> Self {
        Self {
            question_index,
            user_answer: None,
            is_correct: false,
            time_taken_secs: limit.as_secs_f64(),
            reaction_time_ms: limit.as_millis() as u64,
            timed_out: true,
        }
    }

    /// A response for an answered trial.
    pub fn answered(question_index: usize, answer: Answer, is_correct: bool, elapsed: Duration) -> Self {
        Self {
            question_index,
            user_answer: Some(answer),
            is_correct,
            time_taken_secs: elapsed.as_secs_f64(),
            reaction_time_ms: elapsed.as_millis() as u64,
            timed_out: false,
        }
    }

    /// Handwriting capture carried by the answer, if any.
    pub fn trace(&self) -> Option<&Trace> {
        self.user_answer.as_ref().and_then(Answer::trace)
    }
}

/// A completed, classified level. Never mutated after creation; a replay
/// produces a new result for the same slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    pub domain: Domain,
    pub level: u8,
    /// Responses in the order they were recorded.
    #[serde(default)]
    pub responses: Vec<TrialResponse>,
    #[serde(default)]
    pub stats: LevelStats,
    #[serde(default)]
    pub completed_at: DateTime<Utc>,
}

impl LevelResult {
    pub fn accuracy(&self) -> f64 {
        self.stats.accuracy
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.stats.tier
    }

    /// Number of correct responses.
    pub fn score(&self) -> usize {
        self.stats.correct
    }
}

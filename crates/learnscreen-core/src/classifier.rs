//! Level risk classification.
//!
//! One classifier serves every domain. The per-domain differences live in
//! [`DomainThresholds`], looked up by domain and level.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{check_level, Domain, RiskTier, TrialResponse};

/// A Danger cut point is this multiple of the Less-Danger cut point for the
/// latency, duration and drag-count signals.
pub const DANGER_MULTIPLIER: f64 = 1.5;

/// Reaction threshold in milliseconds for the motor reaction game.
pub fn reaction_threshold_ms(level: u8) -> u64 {
    match level {
        1 => 1500,
        2 => 1200,
        _ => 1000,
    }
}

/// Expected seconds per word for the handwriting game.
pub fn handwriting_time_threshold_secs(level: u8) -> f64 {
    match level {
        1 => 30.0,
        2 => 45.0,
        _ => 50.0,
    }
}

/// Expected drags per word for the handwriting game.
pub fn handwriting_drag_threshold(level: u8) -> f64 {
    match level {
        1 => 6.0,
        2 => 8.0,
        _ => 10.0,
    }
}

/// A pair of cut points: exceeding `danger` is Danger, exceeding `less` is
/// Less Danger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub danger: f64,
    pub less: f64,
}

impl Limit {
    /// Danger at [`DANGER_MULTIPLIER`] times the base threshold.
    fn scaled(base: f64) -> Self {
        Self {
            danger: base * DANGER_MULTIPLIER,
            less: base,
        }
    }
}

/// Cut points for one (domain, level).
#[derive(Debug, Clone, PartialEq)]
pub struct DomainThresholds {
    /// Accuracy strictly below this is Danger.
    pub accuracy_danger: f64,
    /// Accuracy below this (or at it, when `accuracy_less_inclusive`) is Less Danger.
    pub accuracy_less: f64,
    pub accuracy_less_inclusive: bool,
    pub reaction_time_ms: Option<Limit>,
    pub timeout_rate: Option<Limit>,
    pub avg_time_secs: Option<Limit>,
    pub drag_latency_ms: Option<Limit>,
    pub drag_count: Option<Limit>,
}

impl DomainThresholds {
    fn accuracy_only(danger: f64, less: f64, inclusive: bool) -> Self {
        Self {
            accuracy_danger: danger,
            accuracy_less: less,
            accuracy_less_inclusive: inclusive,
            reaction_time_ms: None,
            timeout_rate: None,
            avg_time_secs: None,
            drag_latency_ms: None,
            drag_count: None,
        }
    }

    /// The threshold table.
    pub fn lookup(domain: Domain, level: u8) -> Self {
        match domain {
            // 70% itself still counts as Less Danger for numbers.
            Domain::NumericComparison => Self::accuracy_only(51.0, 70.0, true),
            Domain::VisualDiscrimination => Self::accuracy_only(50.0, 70.0, false),
            Domain::MotorReaction => Self {
                reaction_time_ms: Some(Limit::scaled(reaction_threshold_ms(level) as f64)),
                timeout_rate: Some(Limit {
                    danger: 40.0,
                    less: 25.0,
                }),
                ..Self::accuracy_only(50.0, 70.0, false)
            },
            Domain::Handwriting => Self {
                avg_time_secs: Some(Limit::scaled(handwriting_time_threshold_secs(level))),
                drag_latency_ms: Some(Limit {
                    danger: 3000.0,
                    less: 2000.0,
                }),
                drag_count: Some(Limit::scaled(handwriting_drag_threshold(level))),
                ..Self::accuracy_only(50.0, 70.0, false)
            },
        }
    }

    /// Apply the cut points to computed level metrics.
    pub fn tier(&self, stats: &LevelStats) -> RiskTier {
        let signals = [
            (self.reaction_time_ms, stats.avg_reaction_time_ms),
            (self.timeout_rate, stats.timeout_rate),
            (self.avg_time_secs, stats.avg_time_secs),
            (self.drag_latency_ms, stats.avg_drag_latency_ms),
            (self.drag_count, stats.avg_drag_count),
        ];

        let danger = stats.accuracy < self.accuracy_danger
            || signals
                .iter()
                .any(|(limit, value)| limit.is_some_and(|l| *value > l.danger));
        if danger {
            return RiskTier::High;
        }

        let low_accuracy = if self.accuracy_less_inclusive {
            stats.accuracy <= self.accuracy_less
        } else {
            stats.accuracy < self.accuracy_less
        };
        let less = low_accuracy
            || signals
                .iter()
                .any(|(limit, value)| limit.is_some_and(|l| *value > l.less));
        if less {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Metrics and tier for one completed level.
///
/// Missing fields deserialize as zero; stores rebuild them from the
/// responses on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelStats {
    pub total: usize,
    pub correct: usize,
    /// Percentage of correct responses.
    pub accuracy: f64,
    pub avg_time_secs: f64,
    pub avg_reaction_time_ms: f64,
    /// Percentage of trials that timed out.
    pub timeout_rate: f64,
    /// Mean drag latency over handwriting captures, 0 when there are none.
    #[serde(default)]
    pub avg_drag_latency_ms: f64,
    /// Mean drag count over handwriting captures, 0 when there are none.
    #[serde(default)]
    pub avg_drag_count: f64,
    pub tier: RiskTier,
}

/// Classify a completed level.
///
/// Pure: the same responses, domain and level always give the same stats.
/// A level without responses is a caller error.
pub fn classify_level(
    domain: Domain,
    level: u8,
    responses: &[TrialResponse],
) -> Result<LevelStats, EngineError> {
    check_level(level)?;
    if responses.is_empty() {
        return Err(EngineError::EmptyLevel);
    }

    let n = responses.len() as f64;
    let correct = responses.iter().filter(|r| r.is_correct).count();
    let timed_out = responses.iter().filter(|r| r.timed_out).count();

    let traces: Vec<_> = responses.iter().filter_map(TrialResponse::trace).collect();
    let (avg_drag_latency_ms, avg_drag_count) = if traces.is_empty() {
        (0.0, 0.0)
    } else {
        let m = traces.len() as f64;
        (
            traces.iter().map(|t| t.drag_latency_ms as f64).sum::<f64>() / m,
            traces.iter().map(|t| t.drag_count as f64).sum::<f64>() / m,
        )
    };

    let mut stats = LevelStats {
        total: responses.len(),
        correct,
        accuracy: correct as f64 / n * 100.0,
        avg_time_secs: responses.iter().map(|r| r.time_taken_secs).sum::<f64>() / n,
        avg_reaction_time_ms: responses
            .iter()
            .map(|r| r.reaction_time_ms as f64)
            .sum::<f64>()
            / n,
        timeout_rate: timed_out as f64 / n * 100.0,
        avg_drag_latency_ms,
        avg_drag_count,
        tier: RiskTier::Low,
    };
    stats.tier = DomainThresholds::lookup(domain, level).tier(&stats);
    Ok(stats)
}

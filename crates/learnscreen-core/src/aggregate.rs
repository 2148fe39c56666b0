//! Game summaries and the whole-child risk profile.
//!
//! Two independent formulas live here. [`overall_stats`] rolls a domain's
//! levels into one game summary using plain accuracy cut points.
//! [`composite_risk`] scores a child across all games with an additive
//! completion/performance/consistency/trend formula. The two use different
//! thresholds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::classify_level;
use crate::error::EngineError;
use crate::model::{check_level, Domain, LevelResult, RiskTier};

/// Value used for a game with neither accuracy nor score.
pub const NO_DATA_ACCURACY: f64 = 50.0;

// ---------------------------------------------------------------------------
// Game summary
// ---------------------------------------------------------------------------

/// Roll-up of every level a game has completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    /// Correct answers across all levels.
    pub total_score: usize,
    pub total_questions: usize,
    /// Mean of the per-level accuracies.
    pub overall_accuracy: f64,
    pub overall_avg_time_secs: f64,
    pub overall_avg_reaction_time_ms: f64,
    pub overall_risk_tier: RiskTier,
    pub levels_completed: usize,
    pub highest_level: u8,
}

/// Tier for a game's overall accuracy: below 50 is Danger, below 70 is Less Danger.
pub fn game_tier(overall_accuracy: f64) -> RiskTier {
    if overall_accuracy < 50.0 {
        RiskTier::High
    } else if overall_accuracy < 70.0 {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Compute overall stats from a game's levels.
///
/// Averages are taken across levels, not weighted by question count. An
/// empty map yields the default (no data) stats.
pub fn overall_stats(levels: &BTreeMap<u8, LevelResult>) -> OverallStats {
    if levels.is_empty() {
        return OverallStats::default();
    }

    let n = levels.len() as f64;
    let mean = |f: fn(&LevelResult) -> f64| levels.values().map(f).sum::<f64>() / n;
    let overall_accuracy = mean(|l| l.stats.accuracy);

    OverallStats {
        total_score: levels.values().map(|l| l.stats.correct).sum(),
        total_questions: levels.values().map(|l| l.stats.total).sum(),
        overall_accuracy,
        overall_avg_time_secs: mean(|l| l.stats.avg_time_secs),
        overall_avg_reaction_time_ms: mean(|l| l.stats.avg_reaction_time_ms),
        overall_risk_tier: game_tier(overall_accuracy),
        levels_completed: levels.len(),
        highest_level: levels.keys().copied().max().unwrap_or(0),
    }
}

/// Per (user, domain) document: the level map plus derived stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub user_id: String,
    pub domain: Domain,
    /// Level number to its latest result.
    #[serde(default)]
    pub levels: BTreeMap<u8, LevelResult>,
    #[serde(default)]
    pub overall: OverallStats,
}

impl GameSummary {
    pub fn new(user_id: impl Into<String>, domain: Domain) -> Self {
        Self {
            user_id: user_id.into(),
            domain,
            levels: BTreeMap::new(),
            overall: OverallStats::default(),
        }
    }

    /// Merge a level result into its slot, replacing any earlier result for
    /// that level and leaving the other levels untouched.
    pub fn merge_level(&mut self, result: LevelResult) -> Result<(), EngineError> {
        if result.domain != self.domain {
            return Err(EngineError::DomainMismatch {
                expected: self.domain,
                actual: result.domain,
            });
        }
        let level = check_level(result.level)?;
        self.levels.insert(level, result);
        self.recompute();
        Ok(())
    }

    /// Rebuild the derived stats from the level map.
    ///
    /// `highest_level` never moves backwards, even if a stored document
    /// claims more than its level map shows.
    pub fn recompute(&mut self) {
        let previous_highest = self.overall.highest_level;
        self.overall = overall_stats(&self.levels);
        self.overall.highest_level = self.overall.highest_level.max(previous_highest);
    }

    /// Reclassify every level that has responses, then recompute the
    /// overall stats. Used on documents read back from storage, whose
    /// derived fields may be partial or missing.
    pub fn rebuild(&mut self) {
        for (&level, result) in self.levels.iter_mut() {
            if result.responses.is_empty() {
                continue;
            }
            match classify_level(self.domain, level, &result.responses) {
                Ok(stats) => result.stats = stats,
                Err(e) => tracing::warn!(
                    "keeping stored stats for {} level {}: {}",
                    self.domain,
                    level,
                    e
                ),
            }
        }
        self.recompute();
    }

    pub fn level(&self, level: u8) -> Option<&LevelResult> {
        self.levels.get(&level)
    }

    /// Whether any handwriting capture was made in this game.
    pub fn has_capture(&self) -> bool {
        self.levels
            .values()
            .flat_map(|l| &l.responses)
            .any(|r| r.trace().is_some())
    }
}

// ---------------------------------------------------------------------------
// Whole-child profile
// ---------------------------------------------------------------------------

/// What the composite formula needs to know about one game.
///
/// Missing fields mean "no data" and fall back to neutral defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSignal {
    /// `None` for games from a domain this build does not know.
    #[serde(default)]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub avg_reaction_time_ms: Option<f64>,
    #[serde(default)]
    pub has_capture: bool,
}

impl GameSignal {
    /// `accuracy ?? score ?? 50`.
    fn value(&self) -> f64 {
        self.accuracy.or(self.score).unwrap_or(NO_DATA_ACCURACY)
    }

    /// Domain-specific 0 / 0.5 / 1 performance signal.
    pub fn performance(&self) -> f64 {
        let Some(domain) = self.domain else {
            return 0.5;
        };
        match (domain, self.accuracy) {
            (Domain::Handwriting, _) => {
                if self.has_capture {
                    1.0
                } else {
                    0.0
                }
            }
            (_, None) => 0.5,
            (Domain::MotorReaction, Some(accuracy)) => {
                let rt = self.avg_reaction_time_ms;
                if accuracy < 60.0 || rt.is_some_and(|rt| rt > 3000.0) {
                    0.0
                } else if accuracy < 80.0 || rt.is_some_and(|rt| rt > 2000.0) {
                    0.5
                } else {
                    1.0
                }
            }
            (Domain::NumericComparison, Some(accuracy)) => step(accuracy, 50.0, 70.0),
            (Domain::VisualDiscrimination, Some(accuracy)) => step(accuracy, 60.0, 80.0),
        }
    }
}

fn step(accuracy: f64, zero_below: f64, half_below: f64) -> f64 {
    if accuracy < zero_below {
        0.0
    } else if accuracy < half_below {
        0.5
    } else {
        1.0
    }
}

impl From<&GameSummary> for GameSignal {
    fn from(game: &GameSummary) -> Self {
        let played = !game.levels.is_empty();
        Self {
            domain: Some(game.domain),
            score: Some(game.overall.total_score as f64),
            accuracy: played.then_some(game.overall.overall_accuracy),
            avg_reaction_time_ms: played.then_some(game.overall.overall_avg_reaction_time_ms),
            has_capture: game.has_capture(),
        }
    }
}

/// Breakdown of the composite risk score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub completion_rate: f64,
    pub completion: u32,
    pub avg_performance: f64,
    pub performance: u32,
    /// Variance of per-domain averages, when two or more domains were played.
    pub variance: Option<f64>,
    pub consistency: u32,
    /// (recent mean, older mean), when four or more games were played.
    pub trend_means: Option<(f64, f64)>,
    pub trend: u32,
}

impl RiskFactors {
    pub fn risk_score(&self) -> u32 {
        self.completion + self.performance + self.consistency + self.trend
    }
}

/// Tier for a composite risk score: 6 and up is high, 3 and up is medium.
pub fn composite_tier(risk_score: u32) -> RiskTier {
    if risk_score >= 6 {
        RiskTier::High
    } else if risk_score >= 3 {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Score a child across games given in chronological order.
///
/// No games at all is low risk.
pub fn composite_risk(games: &[GameSignal]) -> (RiskFactors, RiskTier) {
    if games.is_empty() {
        return (RiskFactors::default(), RiskTier::Low);
    }
    let n = games.len() as f64;
    let mut factors = RiskFactors::default();

    let completed = games
        .iter()
        .filter(|g| g.score.is_some_and(|s| s > 0.0))
        .count();
    factors.completion_rate = completed as f64 / n;
    factors.completion = match factors.completion_rate {
        r if r < 0.5 => 3,
        r if r < 0.7 => 2,
        r if r < 0.9 => 1,
        _ => 0,
    };

    factors.avg_performance = games.iter().map(GameSignal::performance).sum::<f64>() / n;
    factors.performance = match factors.avg_performance {
        p if p < 0.3 => 4,
        p if p < 0.6 => 2,
        p if p < 0.8 => 1,
        _ => 0,
    };

    let mut by_domain: BTreeMap<Option<Domain>, Vec<f64>> = BTreeMap::new();
    for g in games {
        by_domain.entry(g.domain).or_default().push(g.value());
    }
    if by_domain.len() >= 2 {
        let averages: Vec<f64> = by_domain.values().map(|v| mean(v)).collect();
        let m = mean(&averages);
        let variance = averages.iter().map(|a| (a - m).powi(2)).sum::<f64>() / averages.len() as f64;
        factors.variance = Some(variance);
        factors.consistency = if variance > 1000.0 {
            2
        } else if variance > 500.0 {
            1
        } else {
            0
        };
    }

    if games.len() >= 4 {
        let (older, recent) = games.split_at(games.len() - 3);
        let recent_mean = mean(&recent.iter().map(GameSignal::value).collect::<Vec<_>>());
        let older_mean = mean(&older.iter().map(GameSignal::value).collect::<Vec<_>>());
        factors.trend_means = Some((recent_mean, older_mean));
        factors.trend = if recent_mean < older_mean - 10.0 {
            2
        } else if recent_mean < older_mean {
            1
        } else {
            0
        };
    }

    let tier = composite_tier(factors.risk_score());
    (factors, tier)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Cross-domain composite for one child.
///
/// Derived on demand from the child's game summaries; it owns no state of
/// its own and should be rebuilt rather than cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRiskProfile {
    pub user_id: String,
    pub games: Vec<GameSummary>,
    pub factors: RiskFactors,
    pub risk_score: u32,
    pub tier: RiskTier,
}

impl ChildRiskProfile {
    /// Build the profile from games in chronological order.
    pub fn compute(user_id: impl Into<String>, games: Vec<GameSummary>) -> Self {
        let signals: Vec<GameSignal> = games.iter().map(GameSignal::from).collect();
        let (factors, tier) = composite_risk(&signals);
        Self {
            user_id: user_id.into(),
            risk_score: factors.risk_score(),
            games,
            factors,
            tier,
        }
    }

    pub fn game(&self, domain: Domain) -> Option<&GameSummary> {
        self.games.iter().find(|g| g.domain == domain)
    }
}

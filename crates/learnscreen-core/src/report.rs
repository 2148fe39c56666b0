//! Screening reports with JSON persistence and progress comparison.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{ChildRiskProfile, GameSummary};
use crate::model::{Domain, RiskTier};

/// A point-in-time snapshot of one child's screening results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    /// The composite profile, including every game it was built from.
    pub profile: ChildRiskProfile,
}

impl ScreeningReport {
    /// Build a report from a child's game summaries, in read order.
    pub fn new(user_id: impl Into<String>, games: Vec<GameSummary>) -> Self {
        let user_id = user_id.into();
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            profile: ChildRiskProfile::compute(user_id.clone(), games),
            user_id,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ScreeningReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Overall accuracy per domain played.
    pub fn domain_accuracy(&self) -> BTreeMap<Domain, f64> {
        let mut map = BTreeMap::new();
        for game in &self.profile.games {
            if !game.levels.is_empty() {
                map.entry(game.domain)
                    .or_insert(game.overall.overall_accuracy);
            }
        }
        map
    }

    /// Compare this report against an earlier one for the same child.
    ///
    /// `threshold` is in percentage points of accuracy; smaller moves count
    /// as unchanged.
    pub fn compare(&self, baseline: &ScreeningReport, threshold: f64) -> ProgressReport {
        let baseline_acc = baseline.domain_accuracy();
        let current_acc = self.domain_accuracy();

        let mut declines = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_domains = Vec::new();

        for (&domain, &current) in &current_acc {
            let Some(&before) = baseline_acc.get(&domain) else {
                new_domains.push(domain);
                continue;
            };
            let change = DomainChange {
                domain,
                baseline_accuracy: before,
                current_accuracy: current,
                delta: current - before,
            };
            if change.delta < -threshold {
                declines.push(change);
            } else if change.delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        let missing_domains = baseline_acc
            .keys()
            .filter(|d| !current_acc.contains_key(d))
            .copied()
            .collect();

        ProgressReport {
            baseline_tier: baseline.profile.tier,
            current_tier: self.profile.tier,
            baseline_risk_score: baseline.profile.risk_score,
            current_risk_score: self.profile.risk_score,
            declines,
            improvements,
            unchanged,
            new_domains,
            missing_domains,
        }
    }
}

/// Result of comparing two screening reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub baseline_tier: RiskTier,
    pub current_tier: RiskTier,
    pub baseline_risk_score: u32,
    pub current_risk_score: u32,
    /// Domains whose accuracy dropped by more than the threshold.
    pub declines: Vec<DomainChange>,
    /// Domains whose accuracy rose by more than the threshold.
    pub improvements: Vec<DomainChange>,
    pub unchanged: usize,
    /// Played now but not in the baseline.
    pub new_domains: Vec<Domain>,
    /// Played in the baseline but not now.
    pub missing_domains: Vec<Domain>,
}

/// Accuracy movement in one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainChange {
    pub domain: Domain,
    pub baseline_accuracy: f64,
    pub current_accuracy: f64,
    pub delta: f64,
}

impl ProgressReport {
    /// Returns true if any domain declined or the composite tier rose.
    pub fn has_declines(&self) -> bool {
        !self.declines.is_empty() || self.current_tier > self.baseline_tier
    }

    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Composite:** {} ({}) -> {} ({})\n\n",
            self.baseline_tier.label(),
            self.baseline_risk_score,
            self.current_tier.label(),
            self.current_risk_score
        ));
        md.push_str(&format!(
            "**Summary:** {} declines, {} improvements, {} unchanged\n\n",
            self.declines.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (title, changes) in [
            ("Declines", &self.declines),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Game | Baseline | Current | Delta |\n");
            md.push_str("|------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% | {:+.1}% |\n",
                    c.domain.title(),
                    c.baseline_accuracy,
                    c.current_accuracy,
                    c.delta
                ));
            }
            md.push('\n');
        }

        md
    }
}

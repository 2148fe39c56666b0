//! The `learnscreen simulate` command.
//!
//! Replays a scripted session against the real engine on a synthetic clock:
//! each trial's latency is added to the clock instead of slept, so a script
//! of timeouts finishes instantly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Deserialize;
use tokio::time::Instant;

use learnscreen_core::engine::StoreSink;
use learnscreen_core::error::EngineError;
use learnscreen_core::model::{Answer, Domain, LevelResult, Trace};
use learnscreen_core::session::{Phase, Session};
use learnscreen_store::config::load_config_from;
use learnscreen_store::create_store;

use super::load_bank;

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    user_id: Option<String>,
    domain: String,
    #[serde(default)]
    levels: Vec<ScriptLevel>,
}

#[derive(Debug, Deserialize)]
struct ScriptLevel {
    level: u8,
    #[serde(default)]
    trials: Vec<ScriptTrial>,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptTrial {
    /// Missing means the child never answered.
    #[serde(default)]
    answer: Option<String>,
    #[serde(default = "default_latency")]
    latency_ms: u64,
    #[serde(default)]
    drag_count: Option<u32>,
    #[serde(default)]
    drag_latency_ms: Option<u64>,
}

fn default_latency() -> u64 {
    1000
}

fn load_script(path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse script: {}", path.display()))
}

fn build_answer(domain: Domain, text: &str, trial: &ScriptTrial) -> Result<Answer> {
    let answer = Answer::parse(domain, text).map_err(anyhow::Error::msg)?;
    Ok(match answer {
        Answer::Trace(trace) => Answer::Trace(Trace {
            drag_count: trial.drag_count.unwrap_or(trace.drag_count),
            drag_latency_ms: trial.drag_latency_ms.unwrap_or(trace.drag_latency_ms),
            ..trace
        }),
        other => other,
    })
}

pub async fn execute(
    script_path: PathBuf,
    user: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let script = load_script(&script_path)?;

    let user_id = user
        .or(script.user_id)
        .context("no user id: set user_id in the script or pass --user")?;
    let domain: Domain = script.domain.parse().map_err(anyhow::Error::msg)?;
    anyhow::ensure!(!script.levels.is_empty(), "script has no levels");

    let store = create_store(&config.store)?;
    let bank = load_bank(&config)?;
    let sink = Arc::new(StoreSink::new(Arc::clone(&store), &config.engine));

    let mut session = Session::new(
        user_id.clone(),
        domain,
        bank,
        sink.clone(),
        &config.engine,
    );
    let existing = store
        .read_game_summaries(&user_id)
        .await?
        .into_iter()
        .find(|g| g.domain == domain);
    if let Some(summary) = existing {
        session = session.with_summary(summary);
    }

    eprintln!(
        "learnscreen v{}: simulating {} for {} ({} levels)",
        env!("CARGO_PKG_VERSION"),
        domain.title(),
        user_id,
        script.levels.len()
    );

    let mut now = Instant::now();
    let mut results = Vec::new();
    for level in &script.levels {
        session.start_level(level.level, now)?;
        let count = session.snapshot(now).question_count;
        anyhow::ensure!(
            level.trials.len() <= count,
            "level {} has {} questions but the script gives {} trials",
            level.level,
            count,
            level.trials.len()
        );

        let unanswered = ScriptTrial::default();
        for index in 0..count {
            let trial = level.trials.get(index).unwrap_or(&unanswered);
            session.presented();
            match &trial.answer {
                Some(text) => {
                    now += Duration::from_millis(trial.latency_ms);
                    match session.answer(build_answer(domain, text, trial)?, now) {
                        Ok(_) | Err(EngineError::TrialExpired { .. }) => {}
                        Err(e) => {
                            return Err(e).with_context(|| {
                                format!("level {} trial {}", level.level, index)
                            })
                        }
                    }
                }
                None => {
                    if let Some(deadline) = session.next_deadline() {
                        now = deadline;
                    }
                    session.poll(now)?;
                }
            }

            // Skip past answer feedback.
            if session.phase() == Phase::Resolved {
                if let Some(deadline) = session.next_deadline() {
                    now = deadline;
                }
                session.poll(now)?;
            }
        }

        let result = session
            .last_result()
            .with_context(|| format!("level {} did not complete", level.level))?;
        results.push(result.clone());
    }

    let pending = sink.flush().await;
    tracing::debug!("flushed {} write queues", pending);

    print_levels(&results);
    let overall = &session.summary().overall;
    println!(
        "\n{}: {:.1}% over {} level(s) ({})",
        domain.title(),
        overall.overall_accuracy,
        overall.levels_completed,
        overall.overall_risk_tier.label()
    );

    Ok(())
}

fn print_levels(results: &[LevelResult]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Level",
        "Correct",
        "Accuracy",
        "Avg Time",
        "Avg Reaction",
        "Timeouts",
        "Risk",
    ]);

    for r in results {
        let s = &r.stats;
        table.add_row(vec![
            Cell::new(r.level),
            Cell::new(format!("{}/{}", s.correct, s.total)),
            Cell::new(format!("{:.1}%", s.accuracy)),
            Cell::new(format!("{:.2}s", s.avg_time_secs)),
            Cell::new(format!("{:.0}ms", s.avg_reaction_time_ms)),
            Cell::new(format!("{:.0}%", s.timeout_rate)),
            Cell::new(r.risk_tier().label()),
        ]);
    }

    println!("{table}");
}

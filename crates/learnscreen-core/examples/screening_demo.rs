//! Drive screening sessions on a synthetic clock and build a risk profile.
//!
//! ```sh
//! cargo run -p learnscreen-core --example screening_demo
//! ```
//!
//! The child answers quickly, misses every third question and lets the last
//! question of each level time out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use learnscreen_core::aggregate::ChildRiskProfile;
use learnscreen_core::bank::BuiltinQuestionBank;
use learnscreen_core::engine::EngineConfig;
use learnscreen_core::model::{Answer, Domain, Expected, LevelResult, Trace};
use learnscreen_core::session::{Phase, Session};
use learnscreen_core::traits::LevelSink;

/// Keeps completed levels in memory instead of writing them to a store.
#[derive(Default)]
struct CollectingSink {
    levels: Mutex<Vec<LevelResult>>,
}

impl LevelSink for CollectingSink {
    fn level_completed(&self, _user_id: &str, result: &LevelResult) {
        if let Ok(mut levels) = self.levels.lock() {
            levels.push(result.clone());
        }
    }
}

fn answer_for(expected: &Expected, wrong: bool) -> Answer {
    match expected {
        Expected::Letter(c) if wrong => Answer::Letter(if *c == 'b' { 'd' } else { 'b' }),
        Expected::Letter(c) => Answer::Letter(*c),
        Expected::Number(n) => Answer::Number(if wrong { n + 1 } else { *n }),
        Expected::Target(i) => Answer::Target(if wrong { i + 1 } else { *i }),
        Expected::Word(word) => Answer::Trace(Trace {
            text: if wrong { word.chars().rev().collect() } else { word.clone() },
            drag_count: 4,
            drag_latency_ms: 350,
        }),
    }
}

fn play(session: &mut Session, now: &mut Instant) -> anyhow::Result<()> {
    session.start(*now)?;
    loop {
        let count = session.snapshot(*now).question_count;
        for index in 0..count {
            session.presented();
            let question = session.snapshot(*now).current_question;
            match question {
                Some(q) if index + 1 < count => {
                    *now += Duration::from_millis(700);
                    session.answer(answer_for(&q.expected, index % 3 == 2), *now)?;
                }
                _ => {
                    if let Some(deadline) = session.next_deadline() {
                        *now = deadline;
                    }
                    session.poll(*now)?;
                }
            }
            if session.phase() == Phase::Resolved {
                if let Some(deadline) = session.next_deadline() {
                    *now = deadline;
                }
                session.poll(*now)?;
            }
        }

        if session.level() >= 3 {
            return Ok(());
        }
        session.next_level(*now)?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let user_id = "demo-child";
    let config = EngineConfig::default();
    let bank = Arc::new(BuiltinQuestionBank::new());
    let mut now = Instant::now();
    let mut games = Vec::new();

    for domain in [Domain::VisualDiscrimination, Domain::NumericComparison] {
        let sink = Arc::new(CollectingSink::default());
        let mut session = Session::new(user_id, domain, bank.clone(), sink.clone(), &config);
        play(&mut session, &mut now)?;

        let levels = sink
            .levels
            .lock()
            .map(|mut levels| std::mem::take(&mut *levels))
            .unwrap_or_default();
        for result in &levels {
            println!(
                "{} level {}: {}/{} correct, {:.0}% timeouts, {}",
                domain.title(),
                result.level,
                result.stats.correct,
                result.stats.total,
                result.stats.timeout_rate,
                result.risk_tier().label()
            );
        }
        games.push(session.summary().clone());
    }

    let profile = ChildRiskProfile::compute(user_id, games);
    println!();
    for game in &profile.games {
        println!(
            "{}: {:.1}% over {} level(s)",
            game.domain.title(),
            game.overall.overall_accuracy,
            game.overall.levels_completed
        );
    }
    println!(
        "Overall risk for {}: {} (score {})",
        profile.user_id,
        profile.tier.label(),
        profile.risk_score
    );

    Ok(())
}

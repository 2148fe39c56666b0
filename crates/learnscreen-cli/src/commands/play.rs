//! The `learnscreen play` command: an interactive terminal session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use learnscreen_core::engine::{run_session, Action, StoreSink};
use learnscreen_core::model::{check_level, Answer, Domain, Payload, Question};
use learnscreen_core::session::{Phase, Session, Snapshot};
use learnscreen_store::config::load_config_from;
use learnscreen_store::create_store;

use super::load_bank;

fn prompt(question: &Question) -> String {
    match &question.payload {
        Payload::LetterPair { target, distractor } => {
            format!("Which letter is '{target}'?  [{target}] [{distractor}]")
        }
        Payload::NumberPair { left, right } => format!("Which is bigger?  {left}  or  {right}"),
        Payload::Star { cells, .. } => {
            format!(
                "Tap the star! Type its cell number (0 to {})",
                cells.saturating_sub(1)
            )
        }
        Payload::Word { word } => format!("Write the word: {word}"),
    }
}

fn feedback(snap: &Snapshot) -> Option<String> {
    let r = snap.last_response.as_ref()?;
    Some(if r.timed_out {
        "  Time's up!".to_string()
    } else if r.is_correct {
        format!("  Correct! ({:.1}s)", r.time_taken_secs)
    } else {
        format!("  Not quite. ({:.1}s)", r.time_taken_secs)
    })
}

pub async fn execute(
    user_id: String,
    domain: Domain,
    level: u8,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let level = check_level(level)?;
    let config = load_config_from(config_path.as_deref())?;
    let store = create_store(&config.store)?;
    let bank = load_bank(&config)?;
    anyhow::ensure!(
        !bank.questions(domain, level).is_empty(),
        "no {} questions for level {level}",
        domain
    );
    let sink = Arc::new(StoreSink::new(Arc::clone(&store), &config.engine));

    let mut session = Session::new(user_id.clone(), domain, bank, sink.clone(), &config.engine);
    if let Some(summary) = store
        .read_game_summaries(&user_id)
        .await?
        .into_iter()
        .find(|g| g.domain == domain)
    {
        session = session.with_summary(summary);
    }

    let (actions, rx) = mpsc::channel(8);
    let (snap_tx, mut snapshots) = watch::channel(session.snapshot(Instant::now()));
    let driver = tokio::spawn(run_session(session, rx, snap_tx));

    println!("{} for {} ('q' quits)\n", domain.title(), user_id);
    actions.send(Action::StartLevel(level)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // (level, phase, question) of the last screen drawn.
    let mut shown: Option<(u8, Phase, Option<usize>)> = None;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                let key = (snap.level, snap.phase, snap.question_index);
                if shown == Some(key) {
                    continue;
                }
                shown = Some(key);

                match snap.phase {
                    Phase::Presenting => {
                        if let (Some(q), Some(i)) = (&snap.current_question, snap.question_index) {
                            println!(
                                "Level {} question {}/{}: {}",
                                snap.level,
                                i + 1,
                                snap.question_count,
                                prompt(q)
                            );
                        }
                        actions.send(Action::Presented).await?;
                    }
                    Phase::Resolved => {
                        if let Some(line) = feedback(&snap) {
                            println!("{line}");
                        }
                    }
                    Phase::LevelComplete | Phase::GameComplete => {
                        if let Some(line) = feedback(&snap) {
                            println!("{line}");
                        }
                        println!(
                            "\nLevel {} complete: {}/{} correct ({})",
                            snap.level,
                            snap.score,
                            snap.question_count,
                            snap.risk_tier.map(|t| t.label()).unwrap_or("-")
                        );
                        if snap.phase == Phase::GameComplete {
                            break;
                        }
                        println!("Press enter for level {}, or 'q' to stop.", snap.level + 1);
                    }
                    Phase::Idle | Phase::AwaitingInput => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line == "q" {
                    break;
                }
                let phase = snapshots.borrow().phase;
                match phase {
                    Phase::LevelComplete => actions.send(Action::NextLevel).await?,
                    Phase::AwaitingInput | Phase::Presenting if line.is_empty() => break,
                    Phase::AwaitingInput => match Answer::parse(domain, line) {
                        Ok(answer) => actions.send(Action::Answer(answer)).await?,
                        Err(e) => println!("  {e}"),
                    },
                    _ => {}
                }
            }
        }
    }

    drop(actions);
    let session = driver.await.context("session task failed")?;
    sink.flush().await;

    let overall = &session.summary().overall;
    if overall.levels_completed > 0 {
        println!(
            "\n{}: {:.1}% over {} level(s) ({})",
            domain.title(),
            overall.overall_accuracy,
            overall.levels_completed,
            overall.overall_risk_tier.label()
        );
    }
    Ok(())
}

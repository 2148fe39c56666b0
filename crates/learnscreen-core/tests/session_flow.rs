//! Session driver tests on a paused tokio clock.
//!
//! Time only moves when every task is idle, so trial timeouts and feedback
//! delays fire deterministically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use learnscreen_core::aggregate::GameSummary;
use learnscreen_core::bank::BuiltinQuestionBank;
use learnscreen_core::engine::{run_session, Action, EngineConfig, StoreSink};
use learnscreen_core::error::StoreError;
use learnscreen_core::model::{Answer, Domain, Expected, LevelResult, RiskTier};
use learnscreen_core::session::{Phase, Session, Snapshot};
use learnscreen_core::traits::GameStore;

/// In-memory store that counts writes and can be made slow.
#[derive(Default)]
struct CountingStore {
    games: Mutex<BTreeMap<(String, Domain), GameSummary>>,
    writes: AtomicU32,
    delay: Option<Duration>,
}

#[async_trait]
impl GameStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn upsert_level(
        &self,
        user_id: &str,
        domain: Domain,
        _level: u8,
        result: &LevelResult,
    ) -> Result<GameSummary, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut games = self.games.lock().unwrap();
        let summary = games
            .entry((user_id.to_string(), domain))
            .or_insert_with(|| GameSummary::new(user_id, domain));
        summary.merge_level(result.clone())?;
        Ok(summary.clone())
    }

    async fn read_game_summaries(&self, user_id: &str) -> Result<Vec<GameSummary>, StoreError> {
        let games = self.games.lock().unwrap();
        Ok(games
            .iter()
            .filter(|((u, _), _)| u == user_id)
            .map(|(_, g)| g.clone())
            .collect())
    }
}

struct Harness {
    actions: mpsc::Sender<Action>,
    snapshots: watch::Receiver<Snapshot>,
    driver: JoinHandle<Session>,
    sink: Arc<StoreSink>,
    store: Arc<CountingStore>,
}

fn spawn(domain: Domain, store: CountingStore, config: EngineConfig) -> Harness {
    let store = Arc::new(store);
    let sink = Arc::new(StoreSink::new(store.clone(), &config));
    let session = Session::new(
        "child-7",
        domain,
        Arc::new(BuiltinQuestionBank::new()),
        sink.clone(),
        &config,
    );
    let (actions, rx) = mpsc::channel(16);
    let (tx, snapshots) = watch::channel(session.snapshot(Instant::now()));
    let driver = tokio::spawn(run_session(session, rx, tx));
    Harness {
        actions,
        snapshots,
        driver,
        sink,
        store,
    }
}

impl Harness {
    async fn send(&self, action: Action) {
        self.actions.send(action).await.unwrap();
    }

    async fn wait_for(&mut self, f: impl FnMut(&Snapshot) -> bool) -> Snapshot {
        self.snapshots.wait_for(f).await.unwrap().clone()
    }

    /// Answer every numeric question in `level` correctly.
    async fn answer_numeric_level(&mut self, level: u8) -> Snapshot {
        loop {
            let snap = self
                .wait_for(|s| {
                    s.level == level
                        && matches!(
                            s.phase,
                            Phase::Presenting | Phase::LevelComplete | Phase::GameComplete
                        )
                })
                .await;
            if snap.phase != Phase::Presenting {
                return snap;
            }
            self.send(Action::Presented).await;
            self.wait_for(|s| s.phase == Phase::AwaitingInput).await;

            let Some(Expected::Number(n)) = snap.current_question.map(|q| q.expected) else {
                panic!("expected a numeric question");
            };
            self.send(Action::Answer(Answer::Number(n))).await;
            self.wait_for(|s| s.phase != Phase::AwaitingInput).await;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn motor_timeout_records_threshold_and_ignores_late_tap() {
    let mut h = spawn(
        Domain::MotorReaction,
        CountingStore::default(),
        EngineConfig::default(),
    );

    h.send(Action::Start).await;
    let first = h.wait_for(|s| s.phase == Phase::Presenting).await;
    assert_eq!(first.time_left_ms, Some(1500));
    h.send(Action::Presented).await;
    h.wait_for(|s| s.phase == Phase::AwaitingInput).await;

    // Nobody taps; the clock runs out at 1500ms.
    let resolved = h.wait_for(|s| s.phase == Phase::Resolved).await;
    let response = resolved.last_response.unwrap();
    assert!(response.timed_out);
    assert!(!response.is_correct);
    assert_eq!(response.user_answer, None);
    assert_eq!(response.reaction_time_ms, 1500);

    // A tap during feedback changes nothing.
    h.send(Action::Answer(Answer::Target(2))).await;
    h.snapshots.changed().await.unwrap();
    let after = h.snapshots.borrow().clone();
    assert_eq!(after.phase, Phase::Resolved);
    assert_eq!(after.score, 0);
    assert_eq!(after.question_index, Some(0));

    // Feedback ends and the second star appears.
    let second = h.wait_for(|s| s.question_index == Some(1)).await;
    assert_eq!(second.phase, Phase::Presenting);
}

#[tokio::test(start_paused = true)]
async fn full_game_persists_each_level_once() {
    let mut h = spawn(
        Domain::NumericComparison,
        CountingStore::default(),
        EngineConfig::default(),
    );

    h.send(Action::Start).await;
    let done = h.answer_numeric_level(1).await;
    assert_eq!(done.phase, Phase::LevelComplete);
    assert_eq!(done.risk_tier, Some(RiskTier::Low));

    h.send(Action::NextLevel).await;
    assert_eq!(h.answer_numeric_level(2).await.phase, Phase::LevelComplete);
    h.send(Action::NextLevel).await;
    let last = h.answer_numeric_level(3).await;
    assert_eq!(last.phase, Phase::GameComplete);
    assert_eq!(last.game_tier, Some(RiskTier::Low));

    h.sink.flush().await;
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 3);

    let stored = h.store.read_game_summaries("child-7").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].levels.len(), 3);
    assert_eq!(stored[0].overall.highest_level, 3);
    assert_eq!(stored[0].overall.overall_accuracy, 100.0);

    drop(h.actions);
    let session = h.driver.await.unwrap();
    assert_eq!(session.summary(), &stored[0]);
}

#[tokio::test(start_paused = true)]
async fn restarting_a_level_discards_progress() {
    let mut h = spawn(
        Domain::NumericComparison,
        CountingStore::default(),
        EngineConfig::default(),
    );

    h.send(Action::Start).await;
    h.wait_for(|s| s.phase == Phase::Presenting).await;
    h.send(Action::Presented).await;
    h.send(Action::Answer(Answer::Number(7))).await;
    let resolved = h.wait_for(|s| s.phase == Phase::Resolved).await;
    assert_eq!(resolved.score, 1);

    h.send(Action::Start).await;
    let restarted = h.wait_for(|s| s.phase == Phase::Presenting).await;
    assert_eq!(restarted.question_index, Some(0));
    assert_eq!(restarted.score, 0);
    assert_eq!(restarted.last_response, None);
}

#[tokio::test(start_paused = true)]
async fn slow_store_never_blocks_the_game() {
    let config = EngineConfig {
        persist_retries: 0,
        ..EngineConfig::default()
    };
    let store = CountingStore {
        delay: Some(Duration::from_secs(60)),
        ..CountingStore::default()
    };
    let mut h = spawn(Domain::NumericComparison, store, config);

    h.send(Action::Start).await;
    assert_eq!(h.answer_numeric_level(1).await.phase, Phase::LevelComplete);
    h.send(Action::NextLevel).await;
    let next = h
        .wait_for(|s| s.level == 2 && s.phase == Phase::Presenting)
        .await;
    assert_eq!(next.level, 2);

    // The write times out after 5s and is dropped.
    h.sink.flush().await;
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 1);
    assert!(h.store.read_game_summaries("child-7").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn closing_the_channel_abandons_the_session() {
    let mut h = spawn(
        Domain::MotorReaction,
        CountingStore::default(),
        EngineConfig::default(),
    );

    h.send(Action::Start).await;
    h.wait_for(|s| s.phase == Phase::Presenting).await;

    drop(h.actions);
    let session = h.driver.await.unwrap();
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.next_deadline(), None);
    assert_eq!(h.snapshots.borrow().phase, Phase::Idle);
    assert_eq!(h.sink.flush().await, 0);
}

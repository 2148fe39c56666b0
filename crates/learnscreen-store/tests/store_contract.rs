//! Behaviour every `GameStore` must share, checked against each adapter.

use std::sync::Arc;
use std::time::Duration;

use learnscreen_core::aggregate::{ChildRiskProfile, GameSummary};
use learnscreen_core::classifier::classify_level;
use learnscreen_core::engine::{EngineConfig, StoreSink};
use learnscreen_core::model::{Answer, Domain, LevelResult, RiskTier, TrialResponse};
use learnscreen_core::traits::{GameStore, LevelSink};
use learnscreen_store::{JsonFileStore, MemoryStore, MockStore};

fn level(domain: Domain, level: u8, correct: usize, total: usize) -> LevelResult {
    let responses: Vec<TrialResponse> = (0..total)
        .map(|i| {
            TrialResponse::answered(i, Answer::Number(0), i < correct, Duration::from_millis(800))
        })
        .collect();
    LevelResult {
        domain,
        level,
        stats: classify_level(domain, level, &responses).unwrap(),
        responses,
        completed_at: chrono::Utc::now(),
    }
}

async fn upsert(store: &dyn GameStore, user: &str, r: &LevelResult) -> GameSummary {
    store
        .upsert_level(user, r.domain, r.level, r)
        .await
        .unwrap()
}

async fn check_contract(store: &dyn GameStore) {
    let l1 = level(Domain::NumericComparison, 1, 4, 5);
    let l2 = level(Domain::NumericComparison, 2, 3, 6);

    // Idempotent: the same upsert twice equals once.
    let once = upsert(store, "kid", &l1).await;
    let twice = upsert(store, "kid", &l1).await;
    assert_eq!(once, twice, "{}: upsert not idempotent", store.name());

    // Siblings survive a new level and a replay.
    upsert(store, "kid", &l2).await;
    let replay = level(Domain::NumericComparison, 2, 6, 6);
    let after = upsert(store, "kid", &replay).await;
    assert_eq!(after.level(1), Some(&l1), "{}: level 1 lost", store.name());
    assert_eq!(after.level(2), Some(&replay));
    assert_eq!(after.overall.levels_completed, 2);
    assert_eq!(after.overall.highest_level, 2);

    // Games are kept apart per user and per domain.
    upsert(store, "kid", &level(Domain::Handwriting, 1, 1, 3)).await;
    upsert(store, "other", &level(Domain::Handwriting, 1, 3, 3)).await;

    let games = store.read_game_summaries("kid").await.unwrap();
    let domains: Vec<Domain> = games.iter().map(|g| g.domain).collect();
    assert_eq!(
        domains,
        vec![Domain::NumericComparison, Domain::Handwriting],
        "{}: read order",
        store.name()
    );
    assert_eq!(store.read_game_summaries("other").await.unwrap().len(), 1);
}

#[tokio::test]
async fn memory_store_contract() {
    check_contract(&MemoryStore::new()).await;
}

#[tokio::test]
async fn json_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    check_contract(&JsonFileStore::new(dir.path())).await;
}

#[tokio::test]
async fn mock_store_contract() {
    check_contract(&MockStore::new()).await;
}

#[tokio::test]
async fn profile_from_stored_games() {
    let store = MemoryStore::new();
    // Two weak games: 40% and 55%.
    upsert(&store, "kid", &level(Domain::VisualDiscrimination, 1, 2, 5)).await;
    upsert(&store, "kid", &level(Domain::NumericComparison, 1, 11, 20)).await;

    let games = store.read_game_summaries("kid").await.unwrap();
    let profile = ChildRiskProfile::compute("kid", games);
    assert_eq!(profile.risk_score, 4);
    assert_eq!(profile.tier, RiskTier::Medium);
}

#[tokio::test(start_paused = true)]
async fn sink_retries_transient_failures() {
    let store = Arc::new(MockStore::new());
    store.fail_next(1);
    let sink = StoreSink::new(store.clone(), &EngineConfig::default());

    sink.level_completed("kid", &level(Domain::MotorReaction, 1, 3, 5));
    sink.flush().await;

    assert_eq!(store.upsert_calls(), 2);
    assert_eq!(store.read_game_summaries("kid").await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn replay_lands_after_a_retried_write() {
    let store = Arc::new(MockStore::new());
    store.fail_next(1);
    let sink = StoreSink::new(store.clone(), &EngineConfig::default());

    let first = level(Domain::NumericComparison, 1, 1, 5);
    let replay = level(Domain::NumericComparison, 1, 5, 5);
    sink.level_completed("kid", &first);
    sink.level_completed("kid", &replay);
    assert_eq!(sink.flush().await, 1);

    // First attempt failed, its retry succeeded, then the replay.
    assert_eq!(store.upsert_calls(), 3);
    let games = store.read_game_summaries("kid").await.unwrap();
    assert_eq!(games[0].level(1), Some(&replay));
    assert_eq!(games[0].overall.overall_accuracy, 100.0);
}

#[tokio::test(start_paused = true)]
async fn games_are_written_independently() {
    let store = Arc::new(MockStore::new());
    let sink = StoreSink::new(store.clone(), &EngineConfig::default());

    sink.level_completed("kid", &level(Domain::NumericComparison, 1, 3, 5));
    sink.level_completed("kid", &level(Domain::MotorReaction, 1, 3, 5));
    sink.level_completed("other", &level(Domain::MotorReaction, 1, 3, 5));
    assert_eq!(sink.flush().await, 3);

    assert_eq!(store.read_game_summaries("kid").await.unwrap().len(), 2);
    assert_eq!(store.read_game_summaries("other").await.unwrap().len(), 1);
    assert_eq!(sink.flush().await, 0);
}

#[tokio::test(start_paused = true)]
async fn sink_gives_up_when_offline() {
    let store = Arc::new(MockStore::new());
    store.set_offline(true);
    let sink = StoreSink::new(store.clone(), &EngineConfig::default());

    sink.level_completed("kid", &level(Domain::MotorReaction, 1, 3, 5));
    sink.flush().await;

    // One attempt plus two retries, then the write is dropped.
    assert_eq!(store.upsert_calls(), 3);
    store.set_offline(false);
    assert!(store.read_game_summaries("kid").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sink_times_out_slow_writes() {
    let store = Arc::new(MockStore::with_delay(Duration::from_secs(30)));
    let config = EngineConfig {
        persist_retries: 0,
        ..EngineConfig::default()
    };
    let sink = StoreSink::new(store.clone(), &config);

    sink.level_completed("kid", &level(Domain::Handwriting, 1, 3, 3));
    assert_eq!(sink.flush().await, 1);
    assert_eq!(store.upsert_calls(), 1);
    assert!(store.read_game_summaries("kid").await.unwrap().is_empty());
}

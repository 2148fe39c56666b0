//! Async session driver and fire-and-forget level persistence.
//!
//! [`run_session`] owns a [`Session`] inside a task, applies UI actions as
//! they arrive and polls the session whenever its next deadline passes. Each
//! change is published as a [`Snapshot`] on a watch channel.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{EngineError, StoreError};
use crate::model::{Answer, Domain, LevelResult};
use crate::session::{Session, Snapshot};
use crate::traits::{GameStore, LevelSink};

/// Engine settings, read from the `[engine]` table of `learnscreen.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long answer feedback stays on screen before the next question.
    pub feedback_delay_ms: u64,
    /// Deadline for a single background store write.
    pub persist_timeout_ms: u64,
    /// Extra attempts for a store write that failed transiently.
    pub persist_retries: u32,
    /// Delay before the first retry; doubles on each attempt.
    pub retry_delay_ms: u64,
    /// Per-domain overrides of the question time limit.
    pub time_limits: BTreeMap<Domain, u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feedback_delay_ms: 1000,
            persist_timeout_ms: 5000,
            persist_retries: 2,
            retry_delay_ms: 500,
            time_limits: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn feedback_delay(&self) -> Duration {
        Duration::from_millis(self.feedback_delay_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// The configured limit for `domain`, if any. Zero means "use the
    /// question's own limit".
    pub fn time_limit(&self, domain: Domain) -> Option<Duration> {
        self.time_limits
            .get(&domain)
            .copied()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Input from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start or restart the current level.
    Start,
    /// Start a specific level.
    StartLevel(u8),
    /// The current question is on screen.
    Presented,
    Answer(Answer),
    /// Continue after a completed level.
    NextLevel,
    /// Leave the game; the driver keeps running and can be started again.
    Abandon,
}

/// Drive `session` until the action channel closes.
///
/// Rejected actions are logged and otherwise ignored; the published snapshot
/// shows the unchanged state. When every sender is dropped the session is
/// abandoned and handed back.
pub async fn run_session(
    mut session: Session,
    mut actions: mpsc::Receiver<Action>,
    snapshots: watch::Sender<Snapshot>,
) -> Session {
    snapshots.send_replace(session.snapshot(Instant::now()));

    loop {
        let deadline = session.next_deadline();
        tokio::select! {
            action = actions.recv() => {
                let Some(action) = action else {
                    session.abandon();
                    snapshots.send_replace(session.snapshot(Instant::now()));
                    break;
                };
                if let Err(e) = apply(&mut session, action, Instant::now()) {
                    tracing::debug!("{}: action rejected: {}", session.user_id(), e);
                }
            }
            _ = wait_until(deadline) => {
                if let Err(e) = session.poll(Instant::now()) {
                    tracing::error!("{}: session poll failed: {}", session.user_id(), e);
                }
            }
        }
        snapshots.send_replace(session.snapshot(Instant::now()));
    }

    session
}

fn apply(session: &mut Session, action: Action, now: Instant) -> Result<(), EngineError> {
    match action {
        Action::Start => session.start(now),
        Action::StartLevel(level) => session.start_level(level, now),
        Action::Presented => {
            session.presented();
            Ok(())
        }
        Action::Answer(answer) => session.answer(answer, now).map(|_| ()),
        Action::NextLevel => session.next_level(now),
        Action::Abandon => {
            session.abandon();
            Ok(())
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Store sink
// ---------------------------------------------------------------------------

/// How a queued level is written: per-attempt timeout and transient retries.
#[derive(Debug, Clone, Copy)]
struct WritePolicy {
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

/// Background writer for one (user, domain) game.
struct WriteQueue {
    levels: mpsc::UnboundedSender<LevelResult>,
    task: JoinHandle<()>,
}

/// A [`LevelSink`] that upserts each completed level into a [`GameStore`]
/// on a background task.
///
/// The session never waits for the write. Levels of the same game are
/// written one at a time in completion order, retries included, so a replay
/// always lands after the result it replaces. Failures and timeouts are
/// logged and dropped.
pub struct StoreSink {
    store: Arc<dyn GameStore>,
    policy: WritePolicy,
    queues: Mutex<HashMap<(String, Domain), WriteQueue>>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn GameStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            policy: WritePolicy {
                timeout: config.persist_timeout(),
                retries: config.persist_retries,
                retry_delay: config.retry_delay(),
            },
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for every level handed over so far to be written or dropped.
    /// Returns how many write queues were drained.
    pub async fn flush(&self) -> usize {
        let queues = {
            let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *queues)
        };
        // Closing each channel lets its writer finish the backlog and exit.
        let tasks: Vec<_> = queues.into_values().map(|q| q.task).collect();
        let count = tasks.len();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!("persist task panicked: {}", e);
            }
        }
        count
    }
}

impl LevelSink for StoreSink {
    fn level_completed(&self, user_id: &str, result: &LevelResult) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                "no async runtime, dropping {} level {} for {}",
                result.domain,
                result.level,
                user_id
            );
            return;
        };

        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let key = (user_id.to_string(), result.domain);
        let mut pending = result.clone();
        if let Some(queue) = queues.get(&key) {
            match queue.levels.send(pending) {
                Ok(()) => return,
                Err(mpsc::error::SendError(level)) => pending = level,
            }
        }

        let (levels, rx) = mpsc::unbounded_channel();
        // A fresh receiver is open, so this cannot fail.
        let _ = levels.send(pending);
        let task = runtime.spawn(write_levels(
            Arc::clone(&self.store),
            user_id.to_string(),
            rx,
            self.policy,
        ));
        queues.insert(key, WriteQueue { levels, task });
    }
}

async fn write_levels(
    store: Arc<dyn GameStore>,
    user_id: String,
    mut levels: mpsc::UnboundedReceiver<LevelResult>,
    policy: WritePolicy,
) {
    while let Some(result) = levels.recv().await {
        persist(store.as_ref(), &user_id, &result, policy).await;
    }
}

async fn persist(
    store: &dyn GameStore,
    user_id: &str,
    result: &LevelResult,
    policy: WritePolicy,
) {
    let mut retry_delay = policy.retry_delay;
    for attempt in 0..=policy.retries {
        if attempt > 0 {
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(Duration::from_secs(30));
        }
        let write = store.upsert_level(user_id, result.domain, result.level, result);
        let error = match tokio::time::timeout(policy.timeout, write).await {
            Ok(Ok(summary)) => {
                tracing::debug!(
                    "persisted {} level {} for {} ({} levels stored)",
                    result.domain,
                    result.level,
                    user_id,
                    summary.levels.len()
                );
                return;
            }
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(policy.timeout.as_millis() as u64),
        };
        if !error.is_transient() || attempt == policy.retries {
            tracing::warn!(
                "failed to persist {} level {} for {} via {}: {}",
                result.domain,
                result.level,
                user_id,
                store.name(),
                error
            );
            return;
        }
        tracing::debug!("retrying store write after: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.feedback_delay(), Duration::from_secs(1));
        assert_eq!(config.persist_timeout(), Duration::from_secs(5));
        assert_eq!(config.time_limit(Domain::Handwriting), None);
    }

    #[test]
    fn config_from_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
feedback_delay_ms = 250

[time_limits]
numeric_comparison = 8000
handwriting = 0
"#,
        )
        .unwrap();
        assert_eq!(config.feedback_delay_ms, 250);
        assert_eq!(config.persist_timeout_ms, 5000);
        assert_eq!(
            config.time_limit(Domain::NumericComparison),
            Some(Duration::from_secs(8))
        );
        assert_eq!(config.time_limit(Domain::Handwriting), None);
    }

    #[test]
    fn sink_without_runtime_drops_quietly() {
        use crate::aggregate::GameSummary;
        use async_trait::async_trait;

        struct Unreachable;

        #[async_trait]
        impl GameStore for Unreachable {
            fn name(&self) -> &str {
                "unreachable"
            }
            async fn upsert_level(
                &self,
                _: &str,
                _: Domain,
                _: u8,
                _: &LevelResult,
            ) -> Result<GameSummary, StoreError> {
                panic!("should not be called")
            }
            async fn read_game_summaries(&self, _: &str) -> Result<Vec<GameSummary>, StoreError> {
                Ok(Vec::new())
            }
        }

        let sink = StoreSink::new(Arc::new(Unreachable), &EngineConfig::default());
        let responses = vec![crate::model::TrialResponse::timed_out(
            0,
            Duration::from_secs(10),
        )];
        let stats =
            crate::classifier::classify_level(Domain::NumericComparison, 1, &responses).unwrap();
        sink.level_completed(
            "child-1",
            &LevelResult {
                domain: Domain::NumericComparison,
                level: 1,
                responses,
                stats,
                completed_at: chrono::Utc::now(),
            },
        );
        assert!(sink.queues.lock().unwrap().is_empty());
    }
}

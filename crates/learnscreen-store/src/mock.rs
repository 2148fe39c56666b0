//! Mock store for testing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use learnscreen_core::aggregate::GameSummary;
use learnscreen_core::error::StoreError;
use learnscreen_core::model::{Domain, LevelResult};
use learnscreen_core::traits::GameStore;

use crate::memory::MemoryStore;

/// A [`MemoryStore`] wrapper that counts calls and can be told to fail or
/// stall, for exercising the fire-and-forget persistence path.
#[derive(Debug, Default)]
pub struct MockStore {
    inner: MemoryStore,
    /// Upserts left to fail before writes succeed again.
    failures_remaining: AtomicU32,
    /// Every call fails while set.
    offline: AtomicBool,
    /// Added before every upsert.
    delay: Option<Duration>,
    upsert_calls: AtomicU32,
    read_calls: AtomicU32,
    last_upsert: Mutex<Option<(String, Domain, u8)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose upserts take `delay` to complete.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail the next `n` upserts with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Get the number of upserts attempted, including failed ones.
    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// The key of the last upsert attempted.
    pub fn last_upsert(&self) -> Option<(String, Domain, u8)> {
        self.last_upsert
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl GameStore for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upsert_level(
        &self,
        user_id: &str,
        domain: Domain,
        level: u8,
        result: &LevelResult,
    ) -> Result<GameSummary, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_upsert.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((user_id.to_string(), domain, level));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.check_online()?;
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("injected failure".into()));
        }

        self.inner.upsert_level(user_id, domain, level, result).await
    }

    async fn read_game_summaries(&self, user_id: &str) -> Result<Vec<GameSummary>, StoreError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.inner.read_game_summaries(user_id).await
    }
}

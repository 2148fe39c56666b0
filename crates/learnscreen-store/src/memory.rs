//! In-process game store.

use std::sync::Mutex;

use async_trait::async_trait;

use learnscreen_core::aggregate::GameSummary;
use learnscreen_core::error::StoreError;
use learnscreen_core::model::{Domain, LevelResult};
use learnscreen_core::traits::GameStore;

use crate::check_upsert;

/// Keeps every summary in memory, in first-persisted order.
///
/// Nothing survives the process; useful for tests and demo sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: Mutex<Vec<GameSummary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (user, domain) documents held.
    pub fn len(&self) -> usize {
        self.games.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert_level(
        &self,
        user_id: &str,
        domain: Domain,
        level: u8,
        result: &LevelResult,
    ) -> Result<GameSummary, StoreError> {
        check_upsert(domain, level, result)?;

        let mut games = self.games.lock().unwrap_or_else(|e| e.into_inner());
        let index = match games
            .iter()
            .position(|g| g.user_id == user_id && g.domain == domain)
        {
            Some(i) => i,
            None => {
                games.push(GameSummary::new(user_id, domain));
                games.len() - 1
            }
        };

        let summary = &mut games[index];
        summary.merge_level(result.clone())?;
        Ok(summary.clone())
    }

    async fn read_game_summaries(&self, user_id: &str) -> Result<Vec<GameSummary>, StoreError> {
        let games = self.games.lock().unwrap_or_else(|e| e.into_inner());
        Ok(games
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }
}

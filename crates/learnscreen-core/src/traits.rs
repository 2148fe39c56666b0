//! Collaborator traits consumed by the screening engine.
//!
//! The question bank and level sink are synchronous and called from inside
//! the session; the game store is async and implemented by the
//! `learnscreen-store` crate.

use async_trait::async_trait;

use crate::aggregate::GameSummary;
use crate::error::StoreError;
use crate::model::{Domain, LevelResult, Question};

// ---------------------------------------------------------------------------
// Question bank
// ---------------------------------------------------------------------------

/// Source of the fixed, ordered question set for each (domain, level).
///
/// Returns the same questions every time a level starts.
pub trait QuestionBank: Send + Sync {
    /// Human-readable bank name (e.g. "builtin").
    fn name(&self) -> &str;

    /// Questions for one level, in presentation order. Empty when the bank
    /// has nothing for that level.
    fn questions(&self, domain: Domain, level: u8) -> Vec<Question>;
}

// ---------------------------------------------------------------------------
// Game store
// ---------------------------------------------------------------------------

/// Persistence for per (user, domain) game summaries.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Human-readable store name (e.g. "memory").
    fn name(&self) -> &str;

    /// Merge a level result into the user's summary for `domain`.
    ///
    /// Must merge into the existing level map rather than replace the whole
    /// document, so upserting the same result twice equals upserting it once.
    /// Returns the summary as stored after the merge.
    async fn upsert_level(
        &self,
        user_id: &str,
        domain: Domain,
        level: u8,
        result: &LevelResult,
    ) -> Result<GameSummary, StoreError>;

    /// Every summary stored for a user, in the order the games were first
    /// persisted. May lag behind writes still in flight.
    async fn read_game_summaries(&self, user_id: &str) -> Result<Vec<GameSummary>, StoreError>;
}

// ---------------------------------------------------------------------------
// Level sink
// ---------------------------------------------------------------------------

/// Receives each completed level exactly once.
///
/// Called synchronously from the session; implementations must not block.
/// Anything slow (like a store write) is handed off and its failure reported
/// through logging, never back to the player.
pub trait LevelSink: Send + Sync {
    fn level_completed(&self, user_id: &str, result: &LevelResult);
}

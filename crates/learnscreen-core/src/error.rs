//! Engine and store error types.
//!
//! `StoreError` lives next to the `GameStore` trait; `learnscreen-store`
//! re-exports it.

use thiserror::Error;

use crate::model::Domain;

/// Caller misuse and configuration errors raised by the screening engine.
///
/// None of these mutate recorded history: the operation that returns one
/// leaves the session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `answer()` was called while no trial was accepting input.
    #[error("no trial is awaiting input (session is {phase})")]
    NotAwaitingInput { phase: String },

    /// The trial clock ran out before the answer arrived.
    #[error("trial {index} expired before the answer arrived")]
    TrialExpired { index: usize },

    /// A trial for this question index has already been recorded.
    #[error("trial {0} has already been recorded")]
    DuplicateTrial(usize),

    /// Classification was requested for a level with no responses.
    #[error("cannot classify a level with zero responses")]
    EmptyLevel,

    /// The question bank returned nothing for a level.
    #[error("question set for {domain} level {level} is empty")]
    EmptyQuestionSet { domain: Domain, level: u8 },

    /// Level numbers run from 1 to 3.
    #[error("invalid level {0}, expected 1..=3")]
    InvalidLevel(u8),

    /// A level result was merged into a summary for another domain.
    #[error("domain mismatch: expected {expected}, got {actual}")]
    DomainMismatch { expected: Domain, actual: Domain },

    /// The answer variant does not fit the question's domain.
    #[error("answer kind does not match a {domain} question")]
    AnswerKindMismatch { domain: Domain },

    /// `next_level()` was called with no completed level to advance from.
    #[error("no completed level to advance from")]
    NoActiveLevel,
}

/// Errors that can occur when persisting or reading game summaries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store is not reachable right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The write did not finish in time.
    #[error("store operation timed out after {0}ms")]
    Timeout(u64),

    /// A persisted document exists but cannot be used.
    #[error("corrupt document {path}: {reason}")]
    CorruptDocument { path: String, reason: String },

    /// The user id cannot be used as a storage key.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// The level result itself was rejected by the merge.
    #[error("rejected level result: {0}")]
    Rejected(#[from] EngineError),
}

impl StoreError {
    /// Returns `true` if a later write may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_) | StoreError::Unavailable(_) | StoreError::Timeout(_)
        )
    }
}

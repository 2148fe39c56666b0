//! Append-only log of trial outcomes for the level in progress.

use crate::error::EngineError;
use crate::model::TrialResponse;

/// Per-level response buffer.
///
/// Responses are kept in insertion order. A question index can be recorded
/// once; a second submission for the same trial is refused.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    responses: Vec<TrialResponse>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response and return a reference to the stored copy.
    pub fn record(&mut self, response: TrialResponse) -> Result<&TrialResponse, EngineError> {
        if self
            .responses
            .iter()
            .any(|r| r.question_index == response.question_index)
        {
            return Err(EngineError::DuplicateTrial(response.question_index));
        }
        self.responses.push(response);
        Ok(&self.responses[self.responses.len() - 1])
    }

    pub fn responses(&self) -> &[TrialResponse] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Correct answers so far.
    pub fn score(&self) -> usize {
        self.responses.iter().filter(|r| r.is_correct).count()
    }

    pub fn last(&self) -> Option<&TrialResponse> {
        self.responses.last()
    }

    pub fn into_responses(self) -> Vec<TrialResponse> {
        self.responses
    }
}

//! The per-level session state machine.
//!
//! ```text
//! Idle -> Running{Presenting -> AwaitingInput -> Resolved}* -> LevelComplete -> ...
//!                                                           -> GameComplete (after level 3)
//! ```
//!
//! Every method takes the current instant explicitly and runs to completion.
//! Nothing here sleeps: the async driver in [`crate::engine`] decides when to
//! call [`Session::poll`], and tests can step through time by hand.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::aggregate::GameSummary;
use crate::classifier::classify_level;
use crate::clock::{ClockToken, TrialClock};
use crate::engine::EngineConfig;
use crate::error::EngineError;
use crate::model::{
    check_level, Answer, Domain, LevelResult, Question, RiskTier, TrialResponse, MAX_LEVEL,
};
use crate::recorder::ResponseRecorder;
use crate::traits::{LevelSink, QuestionBank};

/// Externally visible state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Presenting,
    AwaitingInput,
    Resolved,
    LevelComplete,
    GameComplete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Presenting => "presenting",
            Phase::AwaitingInput => "awaiting input",
            Phase::Resolved => "resolved",
            Phase::LevelComplete => "level complete",
            Phase::GameComplete => "game complete",
        };
        f.write_str(s)
    }
}

/// Something that happened while the session was polled.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The clock ran out on a trial.
    TrialTimedOut { index: usize },
    /// The next question is being presented.
    Advanced { index: usize },
    /// A level finished and was classified.
    LevelCompleted { level: u8, tier: RiskTier },
    /// The third level finished.
    GameCompleted { tier: RiskTier },
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub domain: Domain,
    pub level: u8,
    pub phase: Phase,
    pub question_index: Option<usize>,
    pub question_count: usize,
    pub current_question: Option<Question>,
    pub time_left_ms: Option<u64>,
    /// Correct answers in the current level.
    pub score: usize,
    /// The most recent response, for answer feedback.
    pub last_response: Option<TrialResponse>,
    /// Tier of the level just completed.
    pub risk_tier: Option<RiskTier>,
    /// Overall tier of the game so far.
    pub game_tier: Option<RiskTier>,
}

#[derive(Debug)]
enum Trial {
    Presenting,
    AwaitingInput,
    Resolved { advance_at: Instant },
}

#[derive(Debug)]
struct LevelRun {
    level: u8,
    questions: Vec<Question>,
    index: usize,
    trial: Trial,
    recorder: ResponseRecorder,
}

impl LevelRun {
    fn question(&self) -> &Question {
        &self.questions[self.index]
    }

    fn is_last(&self) -> bool {
        self.index + 1 >= self.questions.len()
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Running(LevelRun),
    LevelComplete(LevelResult),
    GameComplete(LevelResult),
}

/// One child playing one domain.
///
/// Owns its trial clock and response buffer; nothing is shared with other
/// sessions.
pub struct Session {
    user_id: String,
    domain: Domain,
    level: u8,
    bank: Arc<dyn QuestionBank>,
    sink: Arc<dyn LevelSink>,
    feedback_delay: Duration,
    time_limit: Option<Duration>,
    clock: TrialClock,
    state: State,
    summary: GameSummary,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        domain: Domain,
        bank: Arc<dyn QuestionBank>,
        sink: Arc<dyn LevelSink>,
        config: &EngineConfig,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            summary: GameSummary::new(user_id.clone(), domain),
            user_id,
            domain,
            level: 1,
            bank,
            sink,
            feedback_delay: config.feedback_delay(),
            time_limit: config.time_limit(domain),
            clock: TrialClock::new(),
            state: State::Idle,
        }
    }

    /// Seed the local game summary with what was already persisted, so the
    /// game tier shown after a level reflects earlier levels too.
    pub fn with_summary(mut self, summary: GameSummary) -> Self {
        if summary.domain == self.domain {
            self.summary = summary;
        } else {
            tracing::warn!(
                "ignoring {} summary for a {} session",
                summary.domain,
                self.domain
            );
        }
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// The level being played, or the one most recently finished.
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn summary(&self) -> &GameSummary {
        &self.summary
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            State::Idle => Phase::Idle,
            State::Running(run) => match run.trial {
                Trial::Presenting => Phase::Presenting,
                Trial::AwaitingInput => Phase::AwaitingInput,
                Trial::Resolved { .. } => Phase::Resolved,
            },
            State::LevelComplete(_) => Phase::LevelComplete,
            State::GameComplete(_) => Phase::GameComplete,
        }
    }

    /// Responses recorded so far in the running level.
    pub fn responses(&self) -> &[TrialResponse] {
        match &self.state {
            State::Running(run) => run.recorder.responses(),
            _ => &[],
        }
    }

    /// The result of the level that just finished.
    pub fn last_result(&self) -> Option<&LevelResult> {
        match &self.state {
            State::LevelComplete(r) | State::GameComplete(r) => Some(r),
            _ => None,
        }
    }

    /// Token of the armed trial clock, for timer services that call back
    /// into [`Session::expire`].
    pub fn clock_token(&self) -> Option<ClockToken> {
        self.clock.token()
    }

    /// Start (or restart) the current level from its first question.
    pub fn start(&mut self, now: Instant) -> Result<(), EngineError> {
        self.start_level(self.level, now)
    }

    /// Start a specific level from its first question.
    ///
    /// Anything in progress is discarded without being recorded. Fails before
    /// touching the session if the bank has no questions for the level.
    pub fn start_level(&mut self, level: u8, now: Instant) -> Result<(), EngineError> {
        let level = check_level(level)?;
        let questions = self.bank.questions(self.domain, level);
        if questions.is_empty() {
            return Err(EngineError::EmptyQuestionSet {
                domain: self.domain,
                level,
            });
        }

        self.clock.cancel();
        self.level = level;
        tracing::debug!(
            "{}: starting {} level {} ({} questions)",
            self.user_id,
            self.domain,
            level,
            questions.len()
        );
        self.state = State::Running(LevelRun {
            level,
            questions,
            index: 0,
            trial: Trial::Presenting,
            recorder: ResponseRecorder::new(),
        });
        self.arm(now);
        Ok(())
    }

    /// Move from a completed level to the next one.
    pub fn next_level(&mut self, now: Instant) -> Result<(), EngineError> {
        match &self.state {
            State::LevelComplete(result) => {
                let next = result.level + 1;
                self.start_level(next, now)
            }
            _ => Err(EngineError::NoActiveLevel),
        }
    }

    /// The presentation layer has shown the current question; accept input.
    pub fn presented(&mut self) -> bool {
        match &mut self.state {
            State::Running(run) if matches!(run.trial, Trial::Presenting) => {
                run.trial = Trial::AwaitingInput;
                true
            }
            _ => false,
        }
    }

    /// Submit an answer to the current trial.
    ///
    /// Only valid while awaiting input. An answer that arrives after the clock
    /// has run out resolves the trial as a timeout and is itself refused.
    pub fn answer(&mut self, answer: Answer, now: Instant) -> Result<TrialResponse, EngineError> {
        let phase = self.phase();
        let State::Running(run) = &self.state else {
            return Err(EngineError::NotAwaitingInput {
                phase: phase.to_string(),
            });
        };
        if !matches!(run.trial, Trial::AwaitingInput) {
            return Err(EngineError::NotAwaitingInput {
                phase: phase.to_string(),
            });
        }

        let index = run.index;
        if self.clock.is_expired(now) {
            self.resolve_timeout(now)?;
            return Err(EngineError::TrialExpired { index });
        }

        let is_correct = run.question().check(&answer)?;
        let elapsed = self.clock.elapsed(now).unwrap_or_default();
        let response = TrialResponse::answered(index, answer, is_correct, elapsed);
        self.record(response.clone(), now)?;
        Ok(response)
    }

    /// Timer-service callback: the countdown identified by `token` fired.
    ///
    /// Stale tokens (from a clock that was cancelled or re-armed) are ignored.
    pub fn expire(
        &mut self,
        token: ClockToken,
        now: Instant,
    ) -> Result<Option<SessionEvent>, EngineError> {
        if !self.clock.is_current(token) {
            return Ok(None);
        }
        self.resolve_timeout(now).map(Some)
    }

    /// Advance time: expire an overdue trial, or move past answer feedback.
    pub fn poll(&mut self, now: Instant) -> Result<Option<SessionEvent>, EngineError> {
        let State::Running(run) = &mut self.state else {
            return Ok(None);
        };
        match run.trial {
            Trial::Presenting | Trial::AwaitingInput if self.clock.is_expired(now) => {
                self.resolve_timeout(now).map(Some)
            }
            Trial::Resolved { advance_at } if now >= advance_at => {
                run.index += 1;
                run.trial = Trial::Presenting;
                let index = run.index;
                self.arm(now);
                Ok(Some(SessionEvent::Advanced { index }))
            }
            _ => Ok(None),
        }
    }

    /// Leave the game. The pending clock is cancelled and any unresolved
    /// trial in the running level is discarded.
    pub fn abandon(&mut self) {
        self.clock.cancel();
        if let State::Running(run) = &self.state {
            tracing::debug!(
                "{}: abandoned {} level {} after {} trials",
                self.user_id,
                self.domain,
                run.level,
                run.recorder.len()
            );
        }
        self.state = State::Idle;
    }

    /// When the session next needs [`Session::poll`]: the clock deadline or
    /// the end of answer feedback.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Running(run) => match run.trial {
                Trial::Presenting | Trial::AwaitingInput => self.clock.deadline(),
                Trial::Resolved { advance_at } => Some(advance_at),
            },
            _ => None,
        }
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let game_tier =
            (!self.summary.levels.is_empty()).then_some(self.summary.overall.overall_risk_tier);
        let mut snapshot = Snapshot {
            domain: self.domain,
            level: self.level,
            phase: self.phase(),
            question_index: None,
            question_count: 0,
            current_question: None,
            time_left_ms: None,
            score: 0,
            last_response: None,
            risk_tier: None,
            game_tier,
        };
        match &self.state {
            State::Idle => {}
            State::Running(run) => {
                snapshot.question_index = Some(run.index);
                snapshot.question_count = run.questions.len();
                snapshot.current_question = Some(run.question().clone());
                snapshot.time_left_ms = self.clock.remaining(now).map(|d| d.as_millis() as u64);
                snapshot.score = run.recorder.score();
                snapshot.last_response = run.recorder.last().cloned();
            }
            State::LevelComplete(result) | State::GameComplete(result) => {
                snapshot.question_count = result.responses.len();
                snapshot.score = result.score();
                snapshot.last_response = result.responses.last().cloned();
                snapshot.risk_tier = Some(result.risk_tier());
            }
        }
        snapshot
    }

    fn arm(&mut self, now: Instant) {
        if let State::Running(run) = &self.state {
            let limit = self.time_limit.unwrap_or_else(|| run.question().time_limit());
            self.clock.arm(now, limit);
        }
    }

    fn resolve_timeout(&mut self, now: Instant) -> Result<SessionEvent, EngineError> {
        let limit = self.clock.limit().unwrap_or_default();
        let index = match &self.state {
            State::Running(run) => run.index,
            _ => {
                return Err(EngineError::NotAwaitingInput {
                    phase: self.phase().to_string(),
                })
            }
        };
        tracing::debug!(
            "{}: {} level {} trial {} timed out",
            self.user_id,
            self.domain,
            self.level,
            index
        );
        let completed = self.record(TrialResponse::timed_out(index, limit), now)?;
        Ok(completed.unwrap_or(SessionEvent::TrialTimedOut { index }))
    }

    /// Store a resolved trial. Returns the completion event when it was the
    /// level's last trial.
    fn record(
        &mut self,
        response: TrialResponse,
        now: Instant,
    ) -> Result<Option<SessionEvent>, EngineError> {
        let State::Running(run) = &mut self.state else {
            return Err(EngineError::NoActiveLevel);
        };
        run.recorder.record(response)?;
        self.clock.cancel();

        if run.is_last() {
            return self.complete_level().map(Some);
        }
        run.trial = Trial::Resolved {
            advance_at: now + self.feedback_delay,
        };
        Ok(None)
    }

    fn complete_level(&mut self) -> Result<SessionEvent, EngineError> {
        let State::Running(run) = std::mem::replace(&mut self.state, State::Idle) else {
            return Err(EngineError::NoActiveLevel);
        };
        let responses = run.recorder.into_responses();
        let stats = classify_level(self.domain, run.level, &responses)?;
        let result = LevelResult {
            domain: self.domain,
            level: run.level,
            responses,
            stats,
            completed_at: Utc::now(),
        };

        self.summary.merge_level(result.clone())?;
        self.sink.level_completed(&self.user_id, &result);

        let tier = result.risk_tier();
        tracing::info!(
            "{}: {} level {} complete, accuracy {:.1}% ({})",
            self.user_id,
            self.domain,
            result.level,
            result.accuracy(),
            tier.label()
        );

        if result.level >= MAX_LEVEL {
            let game_tier = self.summary.overall.overall_risk_tier;
            self.state = State::GameComplete(result);
            Ok(SessionEvent::GameCompleted { tier: game_tier })
        } else {
            let level = result.level;
            self.state = State::LevelComplete(result);
            Ok(SessionEvent::LevelCompleted { level, tier })
        }
    }
}

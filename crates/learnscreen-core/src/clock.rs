//! Cancellable per-question countdown.
//!
//! The clock never sleeps on its own. It records when it was armed and for
//! how long, so the session can ask whether it has expired at any instant and
//! the async driver can sleep until [`TrialClock::deadline`]. Each arming
//! hands out a fresh [`ClockToken`]; expiry notices carrying a stale token are
//! ignored, which is how a cancelled timer that still fires becomes harmless.

use std::time::Duration;

use tokio::time::Instant;

/// Identifies one arming of a [`TrialClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockToken(u64);

#[derive(Debug, Clone, Copy)]
struct Armed {
    token: ClockToken,
    started_at: Instant,
    limit: Duration,
}

/// A single-slot countdown owned by one session.
#[derive(Debug, Default)]
pub struct TrialClock {
    next_token: u64,
    armed: Option<Armed>,
}

impl TrialClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down `limit` from `now`, replacing any pending countdown.
    pub fn arm(&mut self, now: Instant, limit: Duration) -> ClockToken {
        self.next_token += 1;
        let token = ClockToken(self.next_token);
        self.armed = Some(Armed {
            token,
            started_at: now,
            limit,
        });
        token
    }

    /// Stop the pending countdown. Returns `false` if nothing was armed.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Whether `token` names the countdown that is currently armed.
    pub fn is_current(&self, token: ClockToken) -> bool {
        self.armed.is_some_and(|a| a.token == token)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn token(&self) -> Option<ClockToken> {
        self.armed.map(|a| a.token)
    }

    pub fn limit(&self) -> Option<Duration> {
        self.armed.map(|a| a.limit)
    }

    /// When the armed countdown reaches zero.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.started_at + a.limit)
    }

    /// Time since arming.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.armed
            .map(|a| now.saturating_duration_since(a.started_at))
    }

    /// Time left before expiry, saturating at zero.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.armed
            .map(|a| a.limit.saturating_sub(now.saturating_duration_since(a.started_at)))
    }

    /// Whether the armed countdown has reached zero at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.remaining(now).is_some_and(|r| r.is_zero())
    }
}
